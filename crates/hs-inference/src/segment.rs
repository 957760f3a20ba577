//! Segment evaluation over the test partition.
//!
//! Recomputes the average predicted effect by treatment group, overall and
//! restricted to rows above an analyst-chosen covariate threshold. The
//! threshold is read off the scatter panels by a human and passed in; this
//! module never searches for one.

use hs_core::{CoefficientTable, DataFrame, Error, GroupSummary, Result};
use serde::{Deserialize, Serialize};

use crate::ols::{grouped_mean, ols};

/// Segment summaries of predicted effects on the test partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentReport {
    /// OLS of predicted effect on treatment (diagnostic).
    pub effect_on_treatment: CoefficientTable,
    /// Mean predicted effect by treatment group.
    pub by_treatment: Vec<GroupSummary>,
    /// The same, restricted to the analyst-chosen segment, if requested.
    pub segment: Option<SegmentSlice>,
}

/// Summaries restricted to `covariate > threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSlice {
    /// Filter covariate name.
    pub covariate: String,
    /// Filter threshold (rows strictly above are kept).
    pub threshold: f64,
    /// Rows kept by the filter.
    pub n_kept: usize,
    /// Mean predicted effect by treatment group within the segment.
    pub by_treatment: Vec<GroupSummary>,
}

/// Evaluate predicted effects by treatment group.
///
/// `effects` must align with the rows of `test` (same order, same length)
/// — the caller joins predictions back by row identity.
pub fn evaluate_segments(
    test: &DataFrame,
    effects: &[f64],
    treatment: &str,
    filter: Option<(&str, f64)>,
) -> Result<SegmentReport> {
    if effects.len() != test.n_rows() {
        return Err(Error::Validation(format!(
            "{} predictions for {} test rows",
            effects.len(),
            test.n_rows()
        )));
    }

    let w = test.numeric(treatment)?;
    let effect_on_treatment = ols(effects, &[(treatment, w)])?;
    let by_treatment = grouped_mean(w, effects)?;

    let segment = match filter {
        None => None,
        Some((covariate, threshold)) => {
            let values = test.numeric(covariate)?;
            let mut kept_w = Vec::new();
            let mut kept_effects = Vec::new();
            for ((&v, &wi), &e) in values.iter().zip(w).zip(effects) {
                if v > threshold {
                    kept_w.push(wi);
                    kept_effects.push(e);
                }
            }
            Some(SegmentSlice {
                covariate: covariate.to_string(),
                threshold,
                n_kept: kept_w.len(),
                by_treatment: grouped_mean(&kept_w, &kept_effects)?,
            })
        }
    };

    Ok(SegmentReport { effect_on_treatment, by_treatment, segment })
}
