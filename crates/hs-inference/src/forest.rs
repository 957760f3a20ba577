//! Causal forest: an ensemble of heterogeneity-maximizing trees.
//!
//! Unlike a predictive forest, each tree splits to separate units by the
//! *treatment effect* rather than the outcome: a candidate split is scored
//! by `(n_L · n_R / n²) · (τ_L − τ_R)²`, where `τ` is the within-child
//! difference between treated and control outcome means (Athey & Imbens
//! 2016; Wager & Athey 2018).
//!
//! Trees are grown on seeded subsamples. With honesty enabled (the
//! default), each subsample is halved: one half chooses the splits, the
//! other half estimates the leaf effects, so leaf estimates are not fitted
//! to the same noise that shaped the partition.
//!
//! The fit is internally parallel over trees (rayon); callers observe a
//! single blocking call.

use hs_core::{EffectEstimator, EffectModel, EffectPrediction, Error, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

/// Causal forest hyperparameters.
///
/// The config doubles as the estimator: it implements
/// [`EffectEstimator`], and `fit` consumes outcome, treatment, and a
/// pre-expanded covariate matrix (see [`crate::design::design_matrix`]).
#[derive(Debug, Clone)]
pub struct CausalForestConfig {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Covariates tried per split; `None` = `ceil(sqrt(p))`.
    pub mtry: Option<usize>,
    /// Minimum treated units in each child of a split.
    pub min_leaf_treated: usize,
    /// Minimum control units in each child of a split.
    pub min_leaf_control: usize,
    /// Fraction of rows subsampled (without replacement) per tree.
    pub sample_fraction: f64,
    /// Halve each subsample into split-choosing and leaf-estimating parts.
    pub honest: bool,
    /// Base seed; tree `t` uses `seed.wrapping_add(t)`.
    pub seed: u64,
}

impl Default for CausalForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 5000,
            mtry: None,
            min_leaf_treated: 5,
            min_leaf_control: 5,
            sample_fraction: 0.5,
            honest: true,
            seed: 0,
        }
    }
}

/// Convert a raw numeric treatment column to 0/1 codes.
///
/// Only exact `0.0` / `1.0` values are accepted; anything else (a NaN
/// missing cell, a negative code, a fractional dose) is an
/// [`Error::Fit`] naming the offending row. Callers must not cast the
/// column themselves: `v as u8` would silently launder NaN and negative
/// values into valid codes.
pub fn treatment_codes(w: &[f64]) -> Result<Vec<u8>> {
    w.iter()
        .enumerate()
        .map(|(row, &v)| {
            if v == 0.0 {
                Ok(0)
            } else if v == 1.0 {
                Ok(1)
            } else {
                Err(Error::Fit(format!(
                    "treatment must be exactly 0 or 1, got {v} at row {row}"
                )))
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
enum TreeNode {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { effect: f64 },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    fn leaf_index(&self, row: &[f64]) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { .. } => return idx,
                TreeNode::Split { feature, threshold, left, right } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn predict(&self, row: &[f64]) -> f64 {
        match &self.nodes[self.leaf_index(row)] {
            TreeNode::Leaf { effect } => *effect,
            TreeNode::Split { .. } => unreachable!("leaf_index returns a leaf"),
        }
    }
}

/// A fitted causal forest.
#[derive(Debug, Clone)]
pub struct CausalForest {
    trees: Vec<Tree>,
    importances: Vec<f64>,
    p: usize,
}

impl EffectModel for CausalForest {
    fn predict(
        &self,
        x: &[f64],
        n: usize,
        estimate_variance: bool,
    ) -> Result<Vec<EffectPrediction>> {
        if x.len() != n * self.p {
            return Err(Error::Validation(format!(
                "x has length {}, expected n*p = {}",
                x.len(),
                n * self.p
            )));
        }
        let n_trees = self.trees.len() as f64;
        let preds: Vec<EffectPrediction> = (0..n)
            .into_par_iter()
            .map(|i| {
                let row = &x[i * self.p..(i + 1) * self.p];
                let mut sum = 0.0;
                for tree in &self.trees {
                    sum += tree.predict(row);
                }
                let mean = sum / n_trees;
                let variance = estimate_variance.then(|| {
                    if self.trees.len() < 2 {
                        return 0.0;
                    }
                    // Between-tree variance of the ensemble mean.
                    let ss: f64 =
                        self.trees.iter().map(|t| (t.predict(row) - mean).powi(2)).sum();
                    ss / (n_trees - 1.0) / n_trees
                });
                EffectPrediction { effect: mean, variance }
            })
            .collect();
        Ok(preds)
    }

    fn importances(&self) -> Vec<f64> {
        self.importances.clone()
    }

    fn n_covariates(&self) -> usize {
        self.p
    }
}

impl EffectEstimator for CausalForestConfig {
    type Model = CausalForest;

    fn fit(&self, x: &[f64], y: &[f64], w: &[u8], p: usize) -> Result<CausalForest> {
        let n = y.len();
        validate_inputs(self, x, y, w, n, p)?;

        let mtry = self.mtry.unwrap_or_else(|| (p as f64).sqrt().ceil() as usize).clamp(1, p);
        let subsample_size = ((n as f64 * self.sample_fraction).round() as usize).clamp(2, n);

        let results: Vec<(Tree, Vec<f64>)> = (0..self.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let mut rows: Vec<usize> = (0..n).collect();
                rows.shuffle(&mut rng);
                rows.truncate(subsample_size);

                let (grow_rows, estimate_rows) = if self.honest {
                    let half = subsample_size / 2;
                    (rows[..half].to_vec(), rows[half..].to_vec())
                } else {
                    (rows.clone(), Vec::new())
                };

                let mut grower = Grower {
                    x,
                    y,
                    w,
                    p,
                    mtry,
                    min_leaf_treated: self.min_leaf_treated,
                    min_leaf_control: self.min_leaf_control,
                    nodes: Vec::new(),
                    split_weights: vec![0.0; p],
                };
                grower.grow(grow_rows, 0, &mut rng);
                let mut tree = Tree { nodes: grower.nodes };
                if self.honest {
                    populate_honest_leaves(&mut tree, x, y, w, p, &estimate_rows);
                }
                (tree, grower.split_weights)
            })
            .collect();

        let mut trees = Vec::with_capacity(self.n_trees);
        let mut importances = vec![0.0; p];
        for (tree, weights) in results {
            trees.push(tree);
            for (acc, w) in importances.iter_mut().zip(&weights) {
                *acc += w;
            }
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for v in &mut importances {
                *v /= total;
            }
        }

        Ok(CausalForest { trees, importances, p })
    }
}

fn validate_inputs(
    config: &CausalForestConfig,
    x: &[f64],
    y: &[f64],
    w: &[u8],
    n: usize,
    p: usize,
) -> Result<()> {
    if n == 0 || p == 0 {
        return Err(Error::Validation("x/y must be non-empty".to_string()));
    }
    if x.len() != n * p {
        return Err(Error::Validation(format!(
            "x has length {}, expected n*p = {}",
            x.len(),
            n * p
        )));
    }
    if w.len() != n {
        return Err(Error::Validation(format!("w has length {}, expected {n}", w.len())));
    }
    if config.n_trees == 0 {
        return Err(Error::Validation("n_trees must be at least 1".to_string()));
    }
    if !(config.sample_fraction > 0.0 && config.sample_fraction <= 1.0) {
        return Err(Error::Validation(format!(
            "sample_fraction must be in (0, 1], got {}",
            config.sample_fraction
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::Fit(
            "covariate matrix contains non-finite values; encode categoricals first".to_string(),
        ));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::Fit("outcome contains non-finite values".to_string()));
    }
    if let Some(&bad) = w.iter().find(|&&v| v > 1) {
        return Err(Error::Fit(format!("treatment must be 0/1, got {bad}")));
    }
    let n_treated = w.iter().filter(|&&v| v == 1).count();
    if n_treated == 0 || n_treated == n {
        return Err(Error::Fit("both treated and control units are required".to_string()));
    }
    Ok(())
}

struct Grower<'a> {
    x: &'a [f64],
    y: &'a [f64],
    w: &'a [u8],
    p: usize,
    mtry: usize,
    min_leaf_treated: usize,
    min_leaf_control: usize,
    nodes: Vec<TreeNode>,
    split_weights: Vec<f64>,
}

struct ArmSums {
    sum_treated: f64,
    n_treated: usize,
    sum_control: f64,
    n_control: usize,
}

impl ArmSums {
    fn zero() -> Self {
        Self { sum_treated: 0.0, n_treated: 0, sum_control: 0.0, n_control: 0 }
    }

    fn add(&mut self, y: f64, w: u8) {
        if w == 1 {
            self.sum_treated += y;
            self.n_treated += 1;
        } else {
            self.sum_control += y;
            self.n_control += 1;
        }
    }

    fn tau(&self) -> Option<f64> {
        if self.n_treated == 0 || self.n_control == 0 {
            return None;
        }
        Some(
            self.sum_treated / self.n_treated as f64 - self.sum_control / self.n_control as f64,
        )
    }

    fn len(&self) -> usize {
        self.n_treated + self.n_control
    }
}

impl Grower<'_> {
    fn value(&self, row: usize, feature: usize) -> f64 {
        self.x[row * self.p + feature]
    }

    fn sums(&self, rows: &[usize]) -> ArmSums {
        let mut s = ArmSums::zero();
        for &i in rows {
            s.add(self.y[i], self.w[i]);
        }
        s
    }

    /// Grow the subtree for `rows`; returns the index of its root node.
    fn grow(&mut self, rows: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let node_tau = self.sums(&rows).tau().unwrap_or(0.0);

        if let Some((feature, threshold)) = self.best_split(&rows, rng) {
            // Shallow splits dominate the importance score (depth-squared decay).
            self.split_weights[feature] += 1.0 / ((depth + 1) as f64).powi(2);

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                rows.into_iter().partition(|&i| self.value(i, feature) <= threshold);

            let idx = self.nodes.len();
            self.nodes.push(TreeNode::Split { feature, threshold, left: 0, right: 0 });
            let left = self.grow(left_rows, depth + 1, rng);
            let right = self.grow(right_rows, depth + 1, rng);
            self.nodes[idx] = TreeNode::Split { feature, threshold, left, right };
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(TreeNode::Leaf { effect: node_tau });
            idx
        }
    }

    /// Best (feature, threshold) over `mtry` random candidates, or `None`
    /// if no split leaves both arms of both children large enough.
    fn best_split(&self, rows: &[usize], rng: &mut StdRng) -> Option<(usize, f64)> {
        if rows.len() < 2 {
            return None;
        }
        let n = rows.len() as f64;
        let mut features: Vec<usize> = (0..self.p).collect();
        features.shuffle(rng);
        features.truncate(self.mtry);

        let totals = self.sums(rows);
        let mut best: Option<(f64, usize, f64)> = None;

        for &feature in &features {
            let mut order = rows.to_vec();
            order.sort_by(|&a, &b| {
                self.value(a, feature)
                    .partial_cmp(&self.value(b, feature))
                    .expect("covariates validated finite")
            });

            let mut left = ArmSums::zero();
            for i in 0..order.len() - 1 {
                let row = order[i];
                left.add(self.y[row], self.w[row]);

                let here = self.value(row, feature);
                let next = self.value(order[i + 1], feature);
                if here == next {
                    continue;
                }

                let right_treated = totals.n_treated - left.n_treated;
                let right_control = totals.n_control - left.n_control;
                if left.n_treated < self.min_leaf_treated
                    || left.n_control < self.min_leaf_control
                    || right_treated < self.min_leaf_treated
                    || right_control < self.min_leaf_control
                {
                    continue;
                }

                let right = ArmSums {
                    sum_treated: totals.sum_treated - left.sum_treated,
                    n_treated: right_treated,
                    sum_control: totals.sum_control - left.sum_control,
                    n_control: right_control,
                };
                let (tau_l, tau_r) = match (left.tau(), right.tau()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => continue,
                };

                let n_l = left.len() as f64;
                let n_r = right.len() as f64;
                let criterion = (n_l * n_r) / (n * n) * (tau_l - tau_r).powi(2);

                if best.map_or(true, |(c, _, _)| criterion > c) {
                    best = Some((criterion, feature, (here + next) / 2.0));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

/// Re-estimate leaf effects from the held-out half of the subsample.
///
/// A leaf that receives no units (or only one arm) keeps its
/// structure-half estimate.
fn populate_honest_leaves(
    tree: &mut Tree,
    x: &[f64],
    y: &[f64],
    w: &[u8],
    p: usize,
    rows: &[usize],
) {
    let mut sums: Vec<ArmSums> = (0..tree.nodes.len()).map(|_| ArmSums::zero()).collect();
    for &i in rows {
        let leaf = tree.leaf_index(&x[i * p..(i + 1) * p]);
        sums[leaf].add(y[i], w[i]);
    }
    for (node, s) in tree.nodes.iter_mut().zip(&sums) {
        if let TreeNode::Leaf { effect } = node {
            if let Some(tau) = s.tau() {
                *effect = tau;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// Zero-noise DGP with a planted heterogeneous effect on covariate 0:
    /// `y = 10·x1 + w·(5 + 2·x0)`.
    fn planted_data(n: usize, p: usize, seed: u64) -> (Vec<f64>, Vec<f64>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Vec::with_capacity(n * p);
        let mut y = Vec::with_capacity(n);
        let mut w = Vec::with_capacity(n);
        for i in 0..n {
            for _ in 0..p {
                x.push(rng.gen_range(0.0..1.0));
            }
            let wi = (i % 2) as u8;
            let x0 = x[i * p];
            let x1 = x[i * p + 1];
            y.push(10.0 * x1 + wi as f64 * (5.0 + 2.0 * x0));
            w.push(wi);
        }
        (x, y, w)
    }

    fn small_config() -> CausalForestConfig {
        CausalForestConfig { n_trees: 100, seed: 7, ..Default::default() }
    }

    #[test]
    fn test_importance_contract() {
        let (x, y, w) = planted_data(400, 4, 1);
        let forest = small_config().fit(&x, &y, &w, 4).unwrap();
        let imp = forest.importances();
        assert_eq!(imp.len(), 4);
        assert!(imp.iter().all(|&v| v >= 0.0));
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_planted_covariate_ranks_first() {
        let (x, y, w) = planted_data(600, 4, 2);
        let forest = small_config().fit(&x, &y, &w, 4).unwrap();
        let imp = forest.importances();
        let top = imp
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(top, 0, "importances: {imp:?}");
    }

    #[test]
    fn test_prediction_count_and_order() {
        let (x, y, w) = planted_data(400, 3, 3);
        let forest = small_config().fit(&x, &y, &w, 3).unwrap();

        let test_x: Vec<f64> = vec![
            0.1, 0.5, 0.5, //
            0.9, 0.5, 0.5,
        ];
        let preds = forest.predict(&test_x, 2, true).unwrap();
        assert_eq!(preds.len(), 2);
        // Effect = 5 + 2·x0: the x0=0.9 unit must exceed the x0=0.1 unit.
        assert!(
            preds[1].effect > preds[0].effect,
            "expected increasing effect: {preds:?}"
        );
        assert!(preds.iter().all(|p| p.variance.is_some()));

        let no_var = forest.predict(&test_x, 2, false).unwrap();
        assert!(no_var.iter().all(|p| p.variance.is_none()));
    }

    #[test]
    fn test_same_seed_reproduces_fit() {
        let (x, y, w) = planted_data(300, 3, 4);
        let a = small_config().fit(&x, &y, &w, 3).unwrap();
        let b = small_config().fit(&x, &y, &w, 3).unwrap();
        let probe: Vec<f64> = vec![0.3, 0.3, 0.3];
        assert_eq!(
            a.predict(&probe, 1, false).unwrap()[0].effect,
            b.predict(&probe, 1, false).unwrap()[0].effect
        );
        assert_eq!(a.importances(), b.importances());
    }

    #[test]
    fn test_non_binary_treatment_rejected() {
        let (x, y, mut w) = planted_data(100, 3, 5);
        w[0] = 2;
        let err = small_config().fit(&x, &y, &w, 3).unwrap_err();
        assert!(matches!(err, Error::Fit(_)));
    }

    #[test]
    fn test_single_arm_rejected() {
        let (x, y, _) = planted_data(100, 3, 6);
        let w = vec![1u8; 100];
        let err = small_config().fit(&x, &y, &w, 3).unwrap_err();
        assert!(matches!(err, Error::Fit(_)));
    }

    #[test]
    fn test_treatment_codes_exact() {
        let raw = vec![0.0, 1.0, 1.0, 0.0];
        assert_eq!(treatment_codes(&raw).unwrap(), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_treatment_codes_reject_invalid_raw_values() {
        // A saturating `as u8` cast would turn every one of these into a
        // valid 0/1 code and let the fit proceed on garbage.
        for bad in [f64::NAN, -1.0, 0.5, 2.0] {
            let mut raw = vec![0.0, 1.0, 0.0, 1.0];
            raw[1] = bad;
            let err = treatment_codes(&raw).unwrap_err();
            assert!(
                matches!(err, Error::Fit(ref msg) if msg.contains("row 1")),
                "value {bad}: {err:?}"
            );
        }
    }

    #[test]
    fn test_nan_covariate_rejected() {
        let (mut x, y, w) = planted_data(100, 3, 7);
        x[10] = f64::NAN;
        let err = small_config().fit(&x, &y, &w, 3).unwrap_err();
        assert!(matches!(err, Error::Fit(_)));
    }
}
