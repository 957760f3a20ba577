//! Column-oriented tabular data.
//!
//! A [`DataFrame`] is the unit of exchange between pipeline stages:
//! named columns of equal length, each either numeric (`f64`, with `NaN`
//! marking a missing value) or categorical (integer codes into a level
//! list, with `None` marking a missing value). Columns carry the optional
//! human-readable label embedded in the source file.

use crate::{Error, Result};

/// Cell storage for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Numeric values; `NaN` encodes missing.
    Numeric(Vec<f64>),
    /// Categorical values: per-row code into `levels`; `None` encodes missing.
    Categorical {
        /// Per-row level index.
        codes: Vec<Option<usize>>,
        /// Distinct level names, in code order.
        levels: Vec<String>,
    },
}

impl ColumnData {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    /// True if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the value at `row` is missing.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => v[row].is_nan(),
            ColumnData::Categorical { codes, .. } => codes[row].is_none(),
        }
    }

    fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical { codes, levels } => ColumnData::Categorical {
                codes: rows.iter().map(|&i| codes[i]).collect(),
                levels: levels.clone(),
            },
        }
    }
}

/// A named column with an optional variable label.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Human-readable label from the source file, if any.
    pub label: Option<String>,
    /// Cell storage.
    pub data: ColumnData,
}

impl Column {
    /// Create a numeric column without a label.
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self { name: name.into(), label: None, data: ColumnData::Numeric(values) }
    }
}

/// Column-oriented table with equal-length columns.
#[derive(Debug, Clone, Default)]
pub struct DataFrame {
    columns: Vec<Column>,
}

impl DataFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from columns, validating equal lengths and unique names.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut frame = Self::new();
        for col in columns {
            frame.push_column(col)?;
        }
        Ok(frame)
    }

    /// Number of rows (0 for an empty frame).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names, in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// All columns, in insertion order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a numeric column by name.
    ///
    /// Returns `Error::Schema` if the column is absent or categorical.
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column { data: ColumnData::Numeric(v), .. }) => Ok(v),
            Some(_) => Err(Error::Schema(format!("column '{name}' is not numeric"))),
            None => Err(Error::Schema(format!("column '{name}' not found"))),
        }
    }

    /// Append a column, validating length against existing columns.
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.data.len() != self.n_rows() {
            return Err(Error::Validation(format!(
                "column '{}' has {} rows, frame has {}",
                column.name,
                column.data.len(),
                self.n_rows()
            )));
        }
        if self.column(&column.name).is_some() {
            return Err(Error::Validation(format!("duplicate column '{}'", column.name)));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Project onto the named columns, in the given order.
    ///
    /// Returns `Error::Schema` naming the first absent column.
    pub fn select(&self, names: &[&str]) -> Result<DataFrame> {
        let mut out = Vec::with_capacity(names.len());
        for &name in names {
            let col = self
                .column(name)
                .ok_or_else(|| Error::Schema(format!("column '{name}' not found")))?;
            out.push(col.clone());
        }
        DataFrame::from_columns(out)
    }

    /// Keep rows where `mask` is true. `mask` must have one entry per row.
    pub fn filter(&self, mask: &[bool]) -> Result<DataFrame> {
        if mask.len() != self.n_rows() {
            return Err(Error::Validation(format!(
                "mask has {} entries, frame has {} rows",
                mask.len(),
                self.n_rows()
            )));
        }
        let rows: Vec<usize> =
            mask.iter().enumerate().filter_map(|(i, &keep)| keep.then_some(i)).collect();
        self.take(&rows)
    }

    /// Select rows by index, preserving the given order.
    pub fn take(&self, rows: &[usize]) -> Result<DataFrame> {
        let n = self.n_rows();
        if let Some(&bad) = rows.iter().find(|&&i| i >= n) {
            return Err(Error::Validation(format!("row index {bad} out of bounds (n={n})")));
        }
        let columns = self
            .columns
            .iter()
            .map(|c| Column { name: c.name.clone(), label: c.label.clone(), data: c.data.take(rows) })
            .collect();
        Ok(DataFrame { columns })
    }
}
