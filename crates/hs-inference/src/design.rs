//! Model-matrix expansion.
//!
//! The forest and tree fitters consume a dense numeric matrix; categorical
//! columns are expanded into one indicator column per non-reference level
//! before any fit, and a missing value anywhere in the covariate slice is a
//! fit error rather than a silent NaN.

use hs_core::{ColumnData, DataFrame, Error, Result};

/// Dense row-major design matrix with expanded column names.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// Expanded column names (`col` or `col=level`).
    pub names: Vec<String>,
    /// Row-major data, length `n * p`.
    pub data: Vec<f64>,
    /// Number of rows.
    pub n: usize,
    /// Number of expanded columns.
    pub p: usize,
}

impl DesignMatrix {
    /// Borrow row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.p..(i + 1) * self.p]
    }

    /// Copy column `j` out as a vector.
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n).map(|i| self.data[i * self.p + j]).collect()
    }
}

/// Expand the named frame columns into a design matrix.
///
/// Numeric columns pass through unchanged; a categorical column with
/// levels `l0..lk` contributes indicator columns `name=l1 .. name=lk`
/// (first level is the reference). Missing values are rejected with
/// [`Error::Fit`] naming the offending column.
pub fn design_matrix(frame: &DataFrame, columns: &[&str]) -> Result<DesignMatrix> {
    let n = frame.n_rows();

    // Expanded (name, per-row value closure) pairs, materialized per column.
    let mut names: Vec<String> = Vec::new();
    let mut cols: Vec<Vec<f64>> = Vec::new();

    for &name in columns {
        let col = frame
            .column(name)
            .ok_or_else(|| Error::Schema(format!("column '{name}' not found")))?;
        match &col.data {
            ColumnData::Numeric(values) => {
                if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                    return Err(Error::Fit(format!(
                        "covariate '{name}' has a missing or non-finite value at row {row}"
                    )));
                }
                names.push(name.to_string());
                cols.push(values.clone());
            }
            ColumnData::Categorical { codes, levels } => {
                if let Some(row) = codes.iter().position(|c| c.is_none()) {
                    return Err(Error::Fit(format!(
                        "covariate '{name}' has a missing level at row {row}"
                    )));
                }
                for (lvl_idx, level) in levels.iter().enumerate().skip(1) {
                    names.push(format!("{name}={level}"));
                    cols.push(
                        codes
                            .iter()
                            .map(|c| if *c == Some(lvl_idx) { 1.0 } else { 0.0 })
                            .collect(),
                    );
                }
            }
        }
    }

    let p = cols.len();
    let mut data = Vec::with_capacity(n * p);
    for i in 0..n {
        for col in &cols {
            data.push(col[i]);
        }
    }

    Ok(DesignMatrix { names, data, n, p })
}
