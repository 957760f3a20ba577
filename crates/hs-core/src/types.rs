//! Common result types for hetstat

use serde::{Deserialize, Serialize};

/// One term of a regression coefficient table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coefficient {
    /// Term name (e.g. "intercept", "treatment").
    pub term: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error.
    pub std_error: f64,
    /// t-statistic (estimate / std_error).
    pub t_value: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Regression coefficient table plus fit summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoefficientTable {
    /// Per-term estimates.
    pub coefficients: Vec<Coefficient>,
    /// Number of observations.
    pub n_obs: usize,
    /// Coefficient of determination.
    pub r_squared: f64,
}

impl CoefficientTable {
    /// Look up a coefficient by term name.
    pub fn term(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.term == name)
    }
}

/// Mean of a value within one group of a grouping variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Grouping value (e.g. treatment = 0.0 or 1.0).
    pub group: f64,
    /// Group mean of the summarized value.
    pub mean: f64,
    /// Number of rows in the group.
    pub n: usize,
}

/// Per-unit treatment-effect prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EffectPrediction {
    /// Estimated conditional average treatment effect.
    pub effect: f64,
    /// Estimated variance of the effect, if requested.
    pub variance: Option<f64>,
}
