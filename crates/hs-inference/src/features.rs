//! Outcome derivation and covariate selection.
//!
//! Turns the raw survey frame into the clean analysis frame: derives
//! `profit_change` (endline minus baseline profit), projects onto the
//! configured allow-list, and drops rows missing the key covariate.

use hs_core::{Column, ColumnData, DataFrame, Error, Result};

/// Column configuration for the analysis frame.
///
/// The defaults name the microcredit survey columns; every name is
/// overridable so the pipeline is not tied to one export.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// Binary treatment-assignment column.
    pub treatment: String,
    /// Name given to the derived outcome column.
    pub outcome: String,
    /// Endline profit column (used to derive the outcome, then dropped).
    pub post_profit: String,
    /// Baseline profit column (used to derive the outcome).
    pub baseline_profit: String,
    /// Covariate whose missing rows are dropped.
    pub key_covariate: String,
    /// Candidate covariates for effect-heterogeneity modeling.
    pub covariates: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            treatment: "treatment".to_string(),
            outcome: "profit_change".to_string(),
            post_profit: "profit_total".to_string(),
            baseline_profit: "profit_total_bl".to_string(),
            key_covariate: "n_children".to_string(),
            covariates: [
                "profit_total_bl",
                "assets_total_bl",
                "loans_total_bl",
                "savings_total_bl",
                "income_total_bl",
                "expenses_total_bl",
                "borrowed_formal_bl",
                "borrowed_informal_bl",
                "has_business_bl",
                "business_age_bl",
                "livestock_count_bl",
                "land_area_bl",
                "n_children",
                "n_adults",
                "hh_size_bl",
                "head_age_bl",
                "head_edu_bl",
                "head_female_bl",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl FeatureConfig {
    /// The full allow-list of the clean frame: treatment, outcome, covariates.
    pub fn allow_list(&self) -> Vec<&str> {
        let mut names = vec![self.treatment.as_str(), self.outcome.as_str()];
        names.extend(self.covariates.iter().map(|s| s.as_str()));
        names
    }
}

/// Build the clean analysis frame from the raw survey frame.
///
/// 1. Derives `outcome = post_profit - baseline_profit` row-wise (missing
///    if either input is missing).
/// 2. Projects onto [`FeatureConfig::allow_list`]; an absent column is an
///    [`Error::Schema`] naming the column.
/// 3. Drops rows where the key covariate is missing.
pub fn select_features(frame: &DataFrame, config: &FeatureConfig) -> Result<DataFrame> {
    if !config.covariates.iter().any(|c| c == &config.key_covariate) {
        return Err(Error::Validation(format!(
            "key covariate '{}' is not in the covariate list",
            config.key_covariate
        )));
    }

    let post = frame.numeric(&config.post_profit)?;
    let baseline = frame.numeric(&config.baseline_profit)?;
    let change: Vec<f64> = post.iter().zip(baseline).map(|(&p, &b)| p - b).collect();

    let mut with_outcome = frame.clone();
    with_outcome.push_column(Column {
        name: config.outcome.clone(),
        label: Some("Profit change (endline - baseline)".to_string()),
        data: ColumnData::Numeric(change),
    })?;

    let projected = with_outcome.select(&config.allow_list())?;

    let key = projected
        .column(&config.key_covariate)
        .ok_or_else(|| Error::Schema(format!("column '{}' not found", config.key_covariate)))?;
    let mask: Vec<bool> = (0..projected.n_rows()).map(|i| !key.data.is_missing(i)).collect();
    projected.filter(&mask)
}
