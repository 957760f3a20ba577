//! Core traits for hetstat
//!
//! This module isolates the one nontrivial algorithm (the causal forest)
//! behind a fit/predict/importances seam, so pipeline glue depends on the
//! interface rather than on a concrete ensemble implementation.

use crate::Result;
use crate::types::EffectPrediction;

/// A fitted heterogeneous-treatment-effect model.
pub trait EffectModel: Send + Sync {
    /// Predict the conditional treatment effect for each row of `x`
    /// (row-major, `n * p`). Output order matches input row order exactly.
    fn predict(&self, x: &[f64], n: usize, estimate_variance: bool) -> Result<Vec<EffectPrediction>>;

    /// Per-covariate importance scores: non-negative, one per covariate
    /// column fed to fit, normalized to sum to 1.
    fn importances(&self) -> Vec<f64>;

    /// Number of covariate columns the model was fitted on.
    fn n_covariates(&self) -> usize;
}

/// An algorithm that fits an [`EffectModel`] from outcome, treatment, and
/// covariates.
pub trait EffectEstimator {
    /// The fitted model type.
    type Model: EffectModel;

    /// Fit on row-major covariates `x` (`n * p`), outcome `y` (length n),
    /// and binary treatment `w` (length n).
    fn fit(&self, x: &[f64], y: &[f64], w: &[u8], p: usize) -> Result<Self::Model>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantModel {
        effect: f64,
        p: usize,
    }

    impl EffectModel for ConstantModel {
        fn predict(
            &self,
            _x: &[f64],
            n: usize,
            estimate_variance: bool,
        ) -> Result<Vec<EffectPrediction>> {
            Ok(vec![
                EffectPrediction {
                    effect: self.effect,
                    variance: estimate_variance.then_some(0.0),
                };
                n
            ])
        }

        fn importances(&self) -> Vec<f64> {
            vec![1.0 / self.p as f64; self.p]
        }

        fn n_covariates(&self) -> usize {
            self.p
        }
    }

    #[test]
    fn test_constant_model_contract() {
        let m = ConstantModel { effect: 3.0, p: 4 };
        let preds = m.predict(&[0.0; 8], 2, true).unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].effect, 3.0);
        let imp = m.importances();
        assert_eq!(imp.len(), 4);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
