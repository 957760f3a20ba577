//! Stata .dta (release 118) reader/writer — pure Rust, no C FFI.
//!
//! Implements the tagged binary layout introduced with Stata 13/14 and used
//! by survey exports such as the microcredit experiment files this crate
//! analyzes: an XML-like tag skeleton around fixed-width binary sections.
//!
//! Spec: <https://www.stata.com/help.cgi?dta>
//!
//! Key format details:
//! - ASCII tags (`<stata_dta>`, `<header>`, ...) delimit binary sections
//! - Little-endian ("LSF") payloads; "MSF" files are not supported
//! - Variable names are 129-byte NUL-padded UTF-8 fields, labels 321 bytes
//! - Numeric missing values are type-specific sentinels (e.g. byte > 100)
//! - Value labels map integer codes to level names per labeled variable
//!
//! strL (long string) columns are not supported and produce
//! [`Error::NotImplemented`].

use std::collections::HashMap;

use hs_core::{Column, ColumnData, DataFrame, Error, Result};

// ── Public types ──────────────────────────────────────────────────────────

/// A Stata dataset: variables, rows, and value-label tables.
#[derive(Debug, Clone)]
pub struct DtaDataset {
    /// Dataset label (max 80 characters, stored as up to 320 UTF-8 bytes).
    pub label: String,
    /// Variable descriptors, in column order.
    pub variables: Vec<DtaVariable>,
    /// Row-major data: `data[row][col]`.
    pub data: Vec<Vec<DtaValue>>,
    /// Value-label tables, keyed by table name.
    pub value_labels: Vec<DtaValueLabel>,
}

/// A variable (column) descriptor in a .dta file.
#[derive(Debug, Clone)]
pub struct DtaVariable {
    /// Variable name (max 32 chars).
    pub name: String,
    /// Variable label (max 80 chars; empty if unlabeled).
    pub label: String,
    /// Storage type.
    pub var_type: DtaVarType,
    /// Display format (e.g. "%10.0g", "%12s").
    pub format: String,
    /// Name of the value-label table attached to this variable, if any.
    pub value_label: Option<String>,
}

/// Storage type of a .dta variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtaVarType {
    /// 1-byte signed integer (missing above 100).
    Byte,
    /// 2-byte signed integer (missing above 32740).
    Int,
    /// 4-byte signed integer (missing above 2147483620).
    Long,
    /// IEEE 754 single precision (missing at/above 2^127).
    Float,
    /// IEEE 754 double precision (missing at/above 2^1023).
    Double,
    /// Fixed-width string of the given byte length (1..=2045).
    Str(u16),
}

impl DtaVarType {
    /// Storage width of one cell, in bytes.
    pub fn width(self) -> usize {
        match self {
            DtaVarType::Byte => 1,
            DtaVarType::Int => 2,
            DtaVarType::Long => 4,
            DtaVarType::Float => 4,
            DtaVarType::Double => 8,
            DtaVarType::Str(n) => n as usize,
        }
    }

    fn code(self) -> u16 {
        match self {
            DtaVarType::Str(n) => n,
            DtaVarType::Double => 65526,
            DtaVarType::Float => 65527,
            DtaVarType::Long => 65528,
            DtaVarType::Int => 65529,
            DtaVarType::Byte => 65530,
        }
    }

    fn from_code(code: u16, var_index: usize) -> Result<Self> {
        match code {
            1..=2045 => Ok(DtaVarType::Str(code)),
            32768 => Err(Error::NotImplemented(format!(
                "variable {var_index}: strL columns are not supported"
            ))),
            65526 => Ok(DtaVarType::Double),
            65527 => Ok(DtaVarType::Float),
            65528 => Ok(DtaVarType::Long),
            65529 => Ok(DtaVarType::Int),
            65530 => Ok(DtaVarType::Byte),
            _ => Err(Error::Read(format!("variable {var_index}: unknown type code {code}"))),
        }
    }
}

/// A single cell value in a .dta dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DtaValue {
    /// Numeric value (all integer storage types widen to f64).
    Numeric(f64),
    /// Stata missing value (any of ., .a-.z).
    Missing,
    /// Fixed-width string value (NUL padding stripped).
    Str(String),
}

/// A value-label table: integer code → level name.
#[derive(Debug, Clone)]
pub struct DtaValueLabel {
    /// Table name (referenced by [`DtaVariable::value_label`]).
    pub name: String,
    /// `(code, label)` pairs, sorted by code.
    pub mapping: Vec<(i32, String)>,
}

// ── Missing-value sentinels ──────────────────────────────────────────────

const BYTE_MISSING: i8 = 101;
const INT_MISSING: i16 = 32741;
const LONG_MISSING: i32 = 2_147_483_621;
/// Smallest float missing value (".") — bit pattern 0x7F00_0000.
const FLOAT_MISSING: f32 = f32::from_bits(0x7F00_0000);
/// Smallest double missing value (".") — bit pattern 0x7FE0_0000_0000_0000.
const DOUBLE_MISSING: f64 = f64::from_bits(0x7FE0_0000_0000_0000);

const VARNAME_LEN: usize = 129;
const FORMAT_LEN: usize = 57;
const VLBLNAME_LEN: usize = 129;
const VARLABEL_LEN: usize = 321;

// ── Reader ───────────────────────────────────────────────────────────────

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::Read(format!(
                "truncated file: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.data.len() - self.pos
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn expect(&mut self, tag: &str) -> Result<()> {
        let at = self.pos;
        let got = self.bytes(tag.len())?;
        if got != tag.as_bytes() {
            return Err(Error::Read(format!(
                "expected {tag} at offset {at}, got {:?}",
                String::from_utf8_lossy(got)
            )));
        }
        Ok(())
    }

    fn peek(&self, tag: &str) -> bool {
        self.data[self.pos..].starts_with(tag.as_bytes())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    /// Read an `n`-byte NUL-padded UTF-8 field.
    fn padded_str(&mut self, n: usize) -> Result<String> {
        let b = self.bytes(n)?;
        let end = b.iter().position(|&c| c == 0).unwrap_or(n);
        Ok(String::from_utf8_lossy(&b[..end]).to_string())
    }
}

/// Read a Stata .dta (release 118) file.
pub fn read_dta(path: &str) -> Result<DtaDataset> {
    let data = std::fs::read(path)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{path}: {e}"))))?;
    read_dta_bytes(&data)
}

/// Read a Stata .dta dataset from in-memory bytes.
pub fn read_dta_bytes(data: &[u8]) -> Result<DtaDataset> {
    let mut cur = Cursor::new(data);

    // ── Header ──
    cur.expect("<stata_dta>")?;
    cur.expect("<header>")?;

    cur.expect("<release>")?;
    let release = cur.padded_str(3)?;
    cur.expect("</release>")?;
    if release != "118" {
        return Err(Error::NotImplemented(format!(
            "only .dta release 118 is supported, got {release:?}"
        )));
    }

    cur.expect("<byteorder>")?;
    let byteorder = cur.padded_str(3)?;
    cur.expect("</byteorder>")?;
    if byteorder != "LSF" {
        return Err(Error::NotImplemented(format!(
            "only little-endian (LSF) files are supported, got {byteorder:?}"
        )));
    }

    cur.expect("<K>")?;
    let k = cur.u16()? as usize;
    cur.expect("</K>")?;

    cur.expect("<N>")?;
    let n = cur.u64()? as usize;
    cur.expect("</N>")?;

    cur.expect("<label>")?;
    let label_len = cur.u16()? as usize;
    let label = cur.padded_str(label_len)?;
    cur.expect("</label>")?;

    cur.expect("<timestamp>")?;
    let ts_len = cur.u8()? as usize;
    let _timestamp = cur.padded_str(ts_len)?;
    cur.expect("</timestamp>")?;

    cur.expect("</header>")?;

    // ── Map (14 file offsets; sections are parsed sequentially instead) ──
    cur.expect("<map>")?;
    for _ in 0..14 {
        cur.u64()?;
    }
    cur.expect("</map>")?;

    // ── Variable descriptors ──
    cur.expect("<variable_types>")?;
    let mut types = Vec::with_capacity(k);
    for i in 0..k {
        types.push(DtaVarType::from_code(cur.u16()?, i)?);
    }
    cur.expect("</variable_types>")?;

    cur.expect("<varnames>")?;
    let mut names = Vec::with_capacity(k);
    for _ in 0..k {
        names.push(cur.padded_str(VARNAME_LEN)?);
    }
    cur.expect("</varnames>")?;

    cur.expect("<sortlist>")?;
    for _ in 0..k + 1 {
        cur.u16()?;
    }
    cur.expect("</sortlist>")?;

    cur.expect("<formats>")?;
    let mut formats = Vec::with_capacity(k);
    for _ in 0..k {
        formats.push(cur.padded_str(FORMAT_LEN)?);
    }
    cur.expect("</formats>")?;

    cur.expect("<value_label_names>")?;
    let mut vlbl_names = Vec::with_capacity(k);
    for _ in 0..k {
        let s = cur.padded_str(VLBLNAME_LEN)?;
        vlbl_names.push(if s.is_empty() { None } else { Some(s) });
    }
    cur.expect("</value_label_names>")?;

    cur.expect("<variable_labels>")?;
    let mut var_labels = Vec::with_capacity(k);
    for _ in 0..k {
        var_labels.push(cur.padded_str(VARLABEL_LEN)?);
    }
    cur.expect("</variable_labels>")?;

    // ── Characteristics (skipped) ──
    cur.expect("<characteristics>")?;
    while cur.peek("<ch>") {
        cur.expect("<ch>")?;
        let len = cur.u32()? as usize;
        cur.bytes(len)?;
        cur.expect("</ch>")?;
    }
    cur.expect("</characteristics>")?;

    let variables: Vec<DtaVariable> = (0..k)
        .map(|i| DtaVariable {
            name: names[i].clone(),
            label: var_labels[i].clone(),
            var_type: types[i],
            format: formats[i].clone(),
            value_label: vlbl_names[i].clone(),
        })
        .collect();

    // ── Data ──
    cur.expect("<data>")?;
    let mut rows = Vec::with_capacity(n);
    for _ in 0..n {
        let mut row = Vec::with_capacity(k);
        for var in &variables {
            row.push(read_cell(&mut cur, var.var_type)?);
        }
        rows.push(row);
    }
    cur.expect("</data>")?;

    // ── strLs (must be empty: strL variables were rejected above) ──
    cur.expect("<strls>")?;
    cur.expect("</strls>")?;

    // ── Value labels ──
    cur.expect("<value_labels>")?;
    let mut value_labels = Vec::new();
    while cur.peek("<lbl>") {
        value_labels.push(read_value_label(&mut cur)?);
    }
    cur.expect("</value_labels>")?;
    cur.expect("</stata_dta>")?;

    Ok(DtaDataset { label, variables, data: rows, value_labels })
}

fn read_cell(cur: &mut Cursor<'_>, var_type: DtaVarType) -> Result<DtaValue> {
    Ok(match var_type {
        DtaVarType::Byte => {
            let v = cur.u8()? as i8;
            if v >= BYTE_MISSING { DtaValue::Missing } else { DtaValue::Numeric(v as f64) }
        }
        DtaVarType::Int => {
            let b = cur.bytes(2)?;
            let v = i16::from_le_bytes([b[0], b[1]]);
            if v >= INT_MISSING { DtaValue::Missing } else { DtaValue::Numeric(v as f64) }
        }
        DtaVarType::Long => {
            let v = cur.i32()?;
            if v >= LONG_MISSING { DtaValue::Missing } else { DtaValue::Numeric(v as f64) }
        }
        DtaVarType::Float => {
            let v = f32::from_bits(cur.u32()?);
            if v.is_nan() || v >= FLOAT_MISSING {
                DtaValue::Missing
            } else {
                DtaValue::Numeric(v as f64)
            }
        }
        DtaVarType::Double => {
            let v = f64::from_bits(cur.u64()?);
            if v.is_nan() || v >= DOUBLE_MISSING { DtaValue::Missing } else { DtaValue::Numeric(v) }
        }
        DtaVarType::Str(width) => {
            let s = cur.padded_str(width as usize)?;
            if s.is_empty() { DtaValue::Missing } else { DtaValue::Str(s) }
        }
    })
}

fn read_value_label(cur: &mut Cursor<'_>) -> Result<DtaValueLabel> {
    cur.expect("<lbl>")?;
    let _table_len = cur.u32()?;
    let name = cur.padded_str(VLBLNAME_LEN)?;
    cur.bytes(3)?; // padding
    let n_entries = cur.u32()? as usize;
    let txt_len = cur.u32()? as usize;

    let mut offsets = Vec::with_capacity(n_entries);
    for _ in 0..n_entries {
        offsets.push(cur.u32()? as usize);
    }
    let mut values = Vec::with_capacity(n_entries);
    for _ in 0..n_entries {
        values.push(cur.i32()?);
    }
    let txt = cur.bytes(txt_len)?;

    let mut mapping = Vec::with_capacity(n_entries);
    for (i, &off) in offsets.iter().enumerate() {
        if off >= txt_len {
            return Err(Error::Read(format!(
                "value label '{name}': text offset {off} out of bounds ({txt_len})"
            )));
        }
        let rest = &txt[off..];
        let end = rest.iter().position(|&c| c == 0).unwrap_or(rest.len());
        mapping.push((values[i], String::from_utf8_lossy(&rest[..end]).to_string()));
    }
    mapping.sort_by_key(|&(code, _)| code);

    cur.expect("</lbl>")?;
    Ok(DtaValueLabel { name, mapping })
}

// ── Writer ───────────────────────────────────────────────────────────────

/// Write a dataset to a Stata .dta (release 118) file.
pub fn write_dta(path: &str, dataset: &DtaDataset) -> Result<()> {
    let bytes = write_dta_bytes(dataset)?;
    std::fs::write(path, &bytes)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{path}: {e}"))))
}

/// Write a dataset to in-memory .dta bytes.
pub fn write_dta_bytes(dataset: &DtaDataset) -> Result<Vec<u8>> {
    let k = dataset.variables.len();
    if k > u16::MAX as usize {
        return Err(Error::Validation(format!("too many variables: {k}")));
    }

    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut map = [0u64; 14];

    buf.extend_from_slice(b"<stata_dta>");
    buf.extend_from_slice(b"<header>");
    buf.extend_from_slice(b"<release>118</release>");
    buf.extend_from_slice(b"<byteorder>LSF</byteorder>");
    buf.extend_from_slice(b"<K>");
    buf.extend_from_slice(&(k as u16).to_le_bytes());
    buf.extend_from_slice(b"</K>");
    buf.extend_from_slice(b"<N>");
    buf.extend_from_slice(&(dataset.data.len() as u64).to_le_bytes());
    buf.extend_from_slice(b"</N>");

    buf.extend_from_slice(b"<label>");
    // Release 118 allows 80 characters; the byte budget is 80 * 4 (UTF-8).
    let label = truncate_utf8(&dataset.label, 320);
    buf.extend_from_slice(&(label.len() as u16).to_le_bytes());
    buf.extend_from_slice(label.as_bytes());
    buf.extend_from_slice(b"</label>");

    // Empty timestamp (length 0) is valid.
    buf.extend_from_slice(b"<timestamp>");
    buf.push(0u8);
    buf.extend_from_slice(b"</timestamp>");
    buf.extend_from_slice(b"</header>");

    // Map is patched in place once all section offsets are known.
    map[1] = buf.len() as u64;
    buf.extend_from_slice(b"<map>");
    let map_patch_at = buf.len();
    buf.extend_from_slice(&[0u8; 14 * 8]);
    buf.extend_from_slice(b"</map>");

    map[2] = buf.len() as u64;
    buf.extend_from_slice(b"<variable_types>");
    for var in &dataset.variables {
        buf.extend_from_slice(&var.var_type.code().to_le_bytes());
    }
    buf.extend_from_slice(b"</variable_types>");

    map[3] = buf.len() as u64;
    buf.extend_from_slice(b"<varnames>");
    for var in &dataset.variables {
        push_padded(&mut buf, &var.name, VARNAME_LEN);
    }
    buf.extend_from_slice(b"</varnames>");

    map[4] = buf.len() as u64;
    buf.extend_from_slice(b"<sortlist>");
    for _ in 0..k + 1 {
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
    buf.extend_from_slice(b"</sortlist>");

    map[5] = buf.len() as u64;
    buf.extend_from_slice(b"<formats>");
    for var in &dataset.variables {
        let fmt = if var.format.is_empty() { default_format(var.var_type) } else { var.format.clone() };
        push_padded(&mut buf, &fmt, FORMAT_LEN);
    }
    buf.extend_from_slice(b"</formats>");

    map[6] = buf.len() as u64;
    buf.extend_from_slice(b"<value_label_names>");
    for var in &dataset.variables {
        push_padded(&mut buf, var.value_label.as_deref().unwrap_or(""), VLBLNAME_LEN);
    }
    buf.extend_from_slice(b"</value_label_names>");

    map[7] = buf.len() as u64;
    buf.extend_from_slice(b"<variable_labels>");
    for var in &dataset.variables {
        push_padded(&mut buf, &var.label, VARLABEL_LEN);
    }
    buf.extend_from_slice(b"</variable_labels>");

    map[8] = buf.len() as u64;
    buf.extend_from_slice(b"<characteristics></characteristics>");

    map[9] = buf.len() as u64;
    buf.extend_from_slice(b"<data>");
    for (row_idx, row) in dataset.data.iter().enumerate() {
        if row.len() != k {
            return Err(Error::Validation(format!(
                "row {row_idx} has {} values but {k} variables defined",
                row.len()
            )));
        }
        for (val, var) in row.iter().zip(&dataset.variables) {
            write_cell(&mut buf, val, var, row_idx)?;
        }
    }
    buf.extend_from_slice(b"</data>");

    map[10] = buf.len() as u64;
    buf.extend_from_slice(b"<strls></strls>");

    map[11] = buf.len() as u64;
    buf.extend_from_slice(b"<value_labels>");
    for vl in &dataset.value_labels {
        write_value_label(&mut buf, vl);
    }
    buf.extend_from_slice(b"</value_labels>");

    map[12] = buf.len() as u64;
    buf.extend_from_slice(b"</stata_dta>");
    map[13] = buf.len() as u64;

    for (i, off) in map.iter().enumerate() {
        let at = map_patch_at + i * 8;
        buf[at..at + 8].copy_from_slice(&off.to_le_bytes());
    }

    Ok(buf)
}

fn write_cell(buf: &mut Vec<u8>, val: &DtaValue, var: &DtaVariable, row_idx: usize) -> Result<()> {
    match (val, var.var_type) {
        (DtaValue::Numeric(v), DtaVarType::Byte) => buf.push(*v as i8 as u8),
        (DtaValue::Numeric(v), DtaVarType::Int) => {
            buf.extend_from_slice(&(*v as i16).to_le_bytes())
        }
        (DtaValue::Numeric(v), DtaVarType::Long) => {
            buf.extend_from_slice(&(*v as i32).to_le_bytes())
        }
        (DtaValue::Numeric(v), DtaVarType::Float) => {
            buf.extend_from_slice(&(*v as f32).to_bits().to_le_bytes())
        }
        (DtaValue::Numeric(v), DtaVarType::Double) => {
            buf.extend_from_slice(&v.to_bits().to_le_bytes())
        }
        (DtaValue::Missing, DtaVarType::Byte) => buf.push(BYTE_MISSING as u8),
        (DtaValue::Missing, DtaVarType::Int) => buf.extend_from_slice(&INT_MISSING.to_le_bytes()),
        (DtaValue::Missing, DtaVarType::Long) => buf.extend_from_slice(&LONG_MISSING.to_le_bytes()),
        (DtaValue::Missing, DtaVarType::Float) => {
            buf.extend_from_slice(&FLOAT_MISSING.to_bits().to_le_bytes())
        }
        (DtaValue::Missing, DtaVarType::Double) => {
            buf.extend_from_slice(&DOUBLE_MISSING.to_bits().to_le_bytes())
        }
        (DtaValue::Str(s), DtaVarType::Str(width)) => push_padded(buf, s, width as usize),
        (DtaValue::Missing, DtaVarType::Str(width)) => push_padded(buf, "", width as usize),
        (val, var_type) => {
            return Err(Error::Validation(format!(
                "type mismatch at row {row_idx}: value is {val:?} but variable '{}' is {var_type:?}",
                var.name
            )));
        }
    }
    Ok(())
}

fn write_value_label(buf: &mut Vec<u8>, vl: &DtaValueLabel) {
    let n = vl.mapping.len();
    let mut offsets = Vec::with_capacity(n);
    let mut txt = Vec::new();
    for (_, label) in &vl.mapping {
        offsets.push(txt.len() as u32);
        txt.extend_from_slice(label.as_bytes());
        txt.push(0);
    }

    let table_len = 8 + n * 8 + txt.len();
    buf.extend_from_slice(b"<lbl>");
    buf.extend_from_slice(&(table_len as u32).to_le_bytes());
    push_padded(buf, &vl.name, VLBLNAME_LEN);
    buf.extend_from_slice(&[0u8; 3]);
    buf.extend_from_slice(&(n as u32).to_le_bytes());
    buf.extend_from_slice(&(txt.len() as u32).to_le_bytes());
    for off in offsets {
        buf.extend_from_slice(&off.to_le_bytes());
    }
    for (code, _) in &vl.mapping {
        buf.extend_from_slice(&code.to_le_bytes());
    }
    buf.extend_from_slice(&txt);
    buf.extend_from_slice(b"</lbl>");
}

fn push_padded(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let copy_len = if bytes.len() >= width { width.saturating_sub(1) } else { bytes.len() };
    buf.extend_from_slice(&bytes[..copy_len]);
    buf.resize(buf.len() + (width - copy_len), 0);
}

fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn default_format(var_type: DtaVarType) -> String {
    match var_type {
        DtaVarType::Byte => "%8.0g".to_string(),
        DtaVarType::Int => "%8.0g".to_string(),
        DtaVarType::Long => "%12.0g".to_string(),
        DtaVarType::Float => "%9.0g".to_string(),
        DtaVarType::Double => "%10.0g".to_string(),
        DtaVarType::Str(n) => format!("%{n}s"),
    }
}

// ── Converter ────────────────────────────────────────────────────────────

/// Convert a loaded .dta dataset to a [`DataFrame`].
///
/// Numeric columns become `f64` columns with `NaN` for missing. String
/// columns and value-labeled integer columns become categorical columns;
/// labeled values outside the label table keep their numeric text as the
/// level name.
pub fn dta_to_frame(dataset: &DtaDataset) -> Result<DataFrame> {
    let label_tables: HashMap<&str, &DtaValueLabel> =
        dataset.value_labels.iter().map(|vl| (vl.name.as_str(), vl)).collect();

    let n = dataset.data.len();
    let mut columns = Vec::with_capacity(dataset.variables.len());

    for (j, var) in dataset.variables.iter().enumerate() {
        let label = if var.label.is_empty() { None } else { Some(var.label.clone()) };
        let table = var.value_label.as_deref().and_then(|name| label_tables.get(name).copied());

        let data = match (var.var_type, table) {
            (DtaVarType::Str(_), _) => {
                let mut levels: Vec<String> = Vec::new();
                let mut codes = Vec::with_capacity(n);
                for row in &dataset.data {
                    codes.push(match &row[j] {
                        DtaValue::Str(s) => Some(intern_level(&mut levels, s)),
                        DtaValue::Missing => None,
                        DtaValue::Numeric(v) => {
                            return Err(Error::Read(format!(
                                "string column '{}' holds numeric value {v}",
                                var.name
                            )));
                        }
                    });
                }
                ColumnData::Categorical { codes, levels }
            }
            (_, Some(vl)) => {
                let mut levels: Vec<String> = vl.mapping.iter().map(|(_, s)| s.clone()).collect();
                let code_index: HashMap<i64, usize> = vl
                    .mapping
                    .iter()
                    .enumerate()
                    .map(|(i, &(code, _))| (code as i64, i))
                    .collect();
                let mut codes = Vec::with_capacity(n);
                for row in &dataset.data {
                    codes.push(match &row[j] {
                        DtaValue::Numeric(v) => Some(match code_index.get(&(*v as i64)) {
                            Some(&i) => i,
                            None => intern_level(&mut levels, &format!("{v}")),
                        }),
                        DtaValue::Missing => None,
                        DtaValue::Str(s) => {
                            return Err(Error::Read(format!(
                                "numeric column '{}' holds string value {s:?}",
                                var.name
                            )));
                        }
                    });
                }
                ColumnData::Categorical { codes, levels }
            }
            (_, None) => {
                let mut values = Vec::with_capacity(n);
                for row in &dataset.data {
                    values.push(match &row[j] {
                        DtaValue::Numeric(v) => *v,
                        DtaValue::Missing => f64::NAN,
                        DtaValue::Str(s) => {
                            return Err(Error::Read(format!(
                                "numeric column '{}' holds string value {s:?}",
                                var.name
                            )));
                        }
                    });
                }
                ColumnData::Numeric(values)
            }
        };

        columns.push(Column { name: var.name.clone(), label, data });
    }

    DataFrame::from_columns(columns)
}

fn intern_level(levels: &mut Vec<String>, s: &str) -> usize {
    match levels.iter().position(|l| l == s) {
        Some(i) => i,
        None => {
            levels.push(s.to_string());
            levels.len() - 1
        }
    }
}

/// Variable-name → variable-label mapping for human-readable reporting.
pub fn variable_labels(dataset: &DtaDataset) -> Vec<(String, String)> {
    dataset
        .variables
        .iter()
        .filter(|v| !v.label.is_empty())
        .map(|v| (v.name.clone(), v.label.clone()))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────
