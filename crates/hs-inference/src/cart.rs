//! Illustrative decision tree over the treated units.
//!
//! A single gini classification tree re-fits the (quantile-binned) outcome
//! on a short, analyst-chosen covariate list. It approximates the causal
//! forest's splits in a human-readable form; nothing downstream consumes
//! it, and no accuracy is evaluated against its held-out partition.

use hs_core::{DataFrame, Error, Result};
use serde::{Deserialize, Serialize};

use crate::design::design_matrix;
use crate::forest::treatment_codes;
use crate::split::train_test_indices;

/// Quantile binning of a numeric outcome into ordinal categories.
#[derive(Debug, Clone)]
pub struct QuantileBins {
    /// Per-row category index (0-based, ordered).
    pub categories: Vec<usize>,
    /// Category labels ("Q1".."Qk").
    pub labels: Vec<String>,
    /// Observed value range of each category, for presentation.
    pub ranges: Vec<(f64, f64)>,
}

/// Bin `values` into `n_bins` rank-based quantile categories.
///
/// Rows are ranked (stable on ties) and category `k` receives ranks
/// `[k·n/bins, (k+1)·n/bins)`, so category counts differ by at most one.
pub fn quantile_bins(values: &[f64], n_bins: usize) -> Result<QuantileBins> {
    let n = values.len();
    if n_bins < 2 {
        return Err(Error::Validation(format!("n_bins must be at least 2, got {n_bins}")));
    }
    if n < n_bins {
        return Err(Error::Validation(format!("cannot cut {n} rows into {n_bins} quantile bins")));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation("values must contain only finite values".to_string()));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).expect("finite values"));

    let mut categories = vec![0usize; n];
    let mut ranges = vec![(f64::INFINITY, f64::NEG_INFINITY); n_bins];
    for (rank, &row) in order.iter().enumerate() {
        let bin = (rank * n_bins / n).min(n_bins - 1);
        categories[row] = bin;
        let (lo, hi) = &mut ranges[bin];
        *lo = lo.min(values[row]);
        *hi = hi.max(values[row]);
    }

    let labels = (1..=n_bins).map(|k| format!("Q{k}")).collect();
    Ok(QuantileBins { categories, labels, ranges })
}

/// Stopping and pruning parameters for the classification tree.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Minimum node size to attempt a split.
    pub min_split: usize,
    /// Minimum rows in each child.
    pub min_bucket: usize,
    /// Minimum impurity decrease relative to the root, per split.
    pub cp: f64,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self { max_depth: 5, min_split: 5, min_bucket: 5, cp: 0.003 }
    }
}

/// One node of a fitted tree, flat-indexed for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartNode {
    /// Node index within [`CartTree::nodes`] (root is 0).
    pub id: usize,
    /// Depth (root is 0).
    pub depth: usize,
    /// Rows reaching this node.
    pub n: usize,
    /// Rows per outcome category at this node.
    pub class_counts: Vec<usize>,
    /// Majority category.
    pub predicted_class: usize,
    /// Split description; `None` marks a leaf.
    pub split: Option<CartSplit>,
}

/// A decision-node split: left child takes `feature <= threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSplit {
    /// Splitting covariate name.
    pub feature: String,
    /// Split threshold.
    pub threshold: f64,
    /// Left child node id.
    pub left: usize,
    /// Right child node id.
    pub right: usize,
}

/// A fitted classification tree with its naming context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartTree {
    /// Flat node list; `nodes[0]` is the root.
    pub nodes: Vec<CartNode>,
    /// Covariate names, indexed by split feature.
    pub feature_names: Vec<String>,
    /// Outcome category labels.
    pub class_labels: Vec<String>,
}

impl CartTree {
    /// Fit a gini classification tree on row-major `x` and categories `y`.
    pub fn fit(
        x: &[f64],
        p: usize,
        feature_names: &[String],
        y: &[usize],
        class_labels: &[String],
        config: &CartConfig,
    ) -> Result<CartTree> {
        let n = y.len();
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
        if feature_names.len() != p {
            return Err(Error::Validation("feature_names must have one entry per column".into()));
        }
        let n_classes = class_labels.len();
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(Error::Fit(format!("category {bad} out of range ({n_classes} labels)")));
        }

        let root_counts = class_counts(y, &(0..n).collect::<Vec<_>>(), n_classes);
        let root_impurity = gini(&root_counts) * n as f64;

        let mut builder = CartBuilder {
            x,
            y,
            p,
            n_classes,
            feature_names,
            config,
            // Pure root: cp gate below would divide by zero, so disable it.
            min_improvement: if root_impurity > 0.0 { config.cp * root_impurity } else { f64::INFINITY },
            nodes: Vec::new(),
        };
        builder.grow((0..n).collect(), 0);

        Ok(CartTree {
            nodes: builder.nodes,
            feature_names: feature_names.to_vec(),
            class_labels: class_labels.to_vec(),
        })
    }

    /// Leaf nodes, in node-id order.
    pub fn leaves(&self) -> impl Iterator<Item = &CartNode> {
        self.nodes.iter().filter(|node| node.split.is_none())
    }
}

fn class_counts(y: &[usize], rows: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in rows {
        counts[y[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize]) -> f64 {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

struct CartBuilder<'a> {
    x: &'a [f64],
    y: &'a [usize],
    p: usize,
    n_classes: usize,
    feature_names: &'a [String],
    config: &'a CartConfig,
    min_improvement: f64,
    nodes: Vec<CartNode>,
}

impl CartBuilder<'_> {
    fn value(&self, row: usize, feature: usize) -> f64 {
        self.x[row * self.p + feature]
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let counts = class_counts(self.y, &rows, self.n_classes);
        let predicted_class =
            counts.iter().enumerate().max_by_key(|&(_, &c)| c).map(|(i, _)| i).unwrap_or(0);

        let id = self.nodes.len();
        self.nodes.push(CartNode {
            id,
            depth,
            n: rows.len(),
            class_counts: counts.clone(),
            predicted_class,
            split: None,
        });

        let splittable = depth < self.config.max_depth
            && rows.len() >= self.config.min_split
            && gini(&counts) > 0.0;
        if !splittable {
            return id;
        }

        if let Some((feature, threshold)) = self.best_split(&rows, &counts) {
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                rows.into_iter().partition(|&i| self.value(i, feature) <= threshold);
            let left = self.grow(left_rows, depth + 1);
            let right = self.grow(right_rows, depth + 1);
            self.nodes[id].split = Some(CartSplit {
                feature: self.feature_names[feature].clone(),
                threshold,
                left,
                right,
            });
        }
        id
    }

    fn best_split(&self, rows: &[usize], parent_counts: &[usize]) -> Option<(usize, f64)> {
        let parent_impurity = gini(parent_counts) * rows.len() as f64;
        let mut best: Option<(f64, usize, f64)> = None;

        for feature in 0..self.p {
            let mut order = rows.to_vec();
            order.sort_by(|&a, &b| {
                self.value(a, feature)
                    .partial_cmp(&self.value(b, feature))
                    .expect("finite covariates")
            });

            let mut left_counts = vec![0usize; self.n_classes];
            for i in 0..order.len() - 1 {
                let row = order[i];
                left_counts[self.y[row]] += 1;

                let here = self.value(row, feature);
                let next = self.value(order[i + 1], feature);
                if here == next {
                    continue;
                }

                let n_left = i + 1;
                let n_right = order.len() - n_left;
                if n_left < self.config.min_bucket || n_right < self.config.min_bucket {
                    continue;
                }

                let right_counts: Vec<usize> = parent_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(&total, &left)| total - left)
                    .collect();
                let child_impurity =
                    gini(&left_counts) * n_left as f64 + gini(&right_counts) * n_right as f64;
                let improvement = parent_impurity - child_impurity;
                if improvement < self.min_improvement {
                    continue;
                }

                if best.map_or(true, |(imp, _, _)| improvement > imp) {
                    best = Some((improvement, feature, (here + next) / 2.0));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

/// Configuration for the full illustrative-tree branch.
#[derive(Debug, Clone)]
pub struct IllustrativeTreeConfig {
    /// Treatment column (rows with value 1 are kept).
    pub treatment: String,
    /// Outcome column to bin.
    pub outcome: String,
    /// Covariates to fit on (the analyst's top-3 by importance).
    pub covariates: Vec<String>,
    /// Number of quantile categories.
    pub n_bins: usize,
    /// Train fraction for the independent split.
    pub train_frac: f64,
    /// Split seed.
    pub seed: u64,
    /// Tree stopping parameters.
    pub cart: CartConfig,
}

impl Default for IllustrativeTreeConfig {
    fn default() -> Self {
        Self {
            treatment: "treatment".to_string(),
            outcome: "profit_change".to_string(),
            covariates: Vec::new(),
            n_bins: 5,
            train_frac: 0.6,
            seed: 0,
            cart: CartConfig::default(),
        }
    }
}

/// Result of the illustrative-tree branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IllustrativeTree {
    /// The fitted tree (feature names resolved).
    pub tree: CartTree,
    /// Outcome category value ranges, for reading the leaves.
    pub category_ranges: Vec<(f64, f64)>,
    /// Treated rows used for training.
    pub n_train: usize,
    /// Treated rows held out (not evaluated; kept for reporting).
    pub n_test: usize,
}

/// Fit the illustrative tree: treated units only, outcome binned into
/// quantile categories, independent 60/40 split, single gini tree on the
/// supplied covariates.
pub fn illustrative_tree(
    clean: &DataFrame,
    config: &IllustrativeTreeConfig,
) -> Result<IllustrativeTree> {
    if config.covariates.is_empty() {
        return Err(Error::Validation(
            "illustrative tree needs at least one covariate (the analyst's top picks)".to_string(),
        ));
    }

    let codes = treatment_codes(clean.numeric(&config.treatment)?)?;
    let treated_mask: Vec<bool> = codes.iter().map(|&c| c == 1).collect();
    let treated = clean.filter(&treated_mask)?;
    if treated.n_rows() == 0 {
        return Err(Error::Validation("no treated rows to fit the illustrative tree".to_string()));
    }

    let covariate_names: Vec<&str> = config.covariates.iter().map(|s| s.as_str()).collect();
    let dm = design_matrix(&treated, &covariate_names)?;

    let outcome = treated.numeric(&config.outcome)?;
    let bins = quantile_bins(outcome, config.n_bins)?;

    let split = train_test_indices(treated.n_rows(), config.train_frac, config.seed)?;
    let mut train_x = Vec::with_capacity(split.train.len() * dm.p);
    let mut train_y = Vec::with_capacity(split.train.len());
    for &i in &split.train {
        train_x.extend_from_slice(dm.row(i));
        train_y.push(bins.categories[i]);
    }

    let tree = CartTree::fit(&train_x, dm.p, &dm.names, &train_y, &bins.labels, &config.cart)?;

    Ok(IllustrativeTree {
        tree,
        category_ranges: bins.ranges,
        n_train: split.train.len(),
        n_test: split.test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::Column;

    #[test]
    fn test_quantile_bins_balanced() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 * 3.7).collect();
        let bins = quantile_bins(&values, 5).unwrap();
        let mut counts = vec![0usize; 5];
        for &c in &bins.categories {
            counts[c] += 1;
        }
        assert_eq!(counts, vec![20; 5]);
        // Ordinal: larger values land in higher bins.
        assert_eq!(bins.categories[0], 0);
        assert_eq!(bins.categories[99], 4);
    }

    #[test]
    fn test_quantile_bins_uneven_n() {
        let values: Vec<f64> = (0..103).map(|i| i as f64).collect();
        let bins = quantile_bins(&values, 5).unwrap();
        let mut counts = vec![0usize; 5];
        for &c in &bins.categories {
            counts[c] += 1;
        }
        assert!(counts.iter().all(|&c| c == 20 || c == 21), "{counts:?}");
    }

    #[test]
    fn test_cart_separable_classes() {
        // One feature cleanly separates three classes.
        let n = 60;
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<usize> = (0..n).map(|i| i / 20).collect();
        let names = vec!["x".to_string()];
        let labels = vec!["Q1".into(), "Q2".into(), "Q3".into()];
        let tree = CartTree::fit(&x, 1, &names, &y, &labels, &CartConfig::default()).unwrap();

        // Every leaf should be pure.
        for leaf in tree.leaves() {
            let nonzero = leaf.class_counts.iter().filter(|&&c| c > 0).count();
            assert_eq!(nonzero, 1, "impure leaf: {leaf:?}");
        }
        assert!(tree.nodes.len() >= 5); // 2 splits + 3 leaves
    }

    #[test]
    fn test_cart_respects_max_depth_and_bucket() {
        let n = 200;
        let x: Vec<f64> = (0..n).map(|i| (i % 37) as f64).collect();
        let y: Vec<usize> = (0..n).map(|i| i % 5).collect();
        let names = vec!["x".to_string()];
        let labels: Vec<String> = (1..=5).map(|k| format!("Q{k}")).collect();
        let config = CartConfig { max_depth: 2, min_bucket: 10, ..Default::default() };
        let tree = CartTree::fit(&x, 1, &names, &y, &labels, &config).unwrap();

        for node in &tree.nodes {
            assert!(node.depth <= 2);
            if node.split.is_none() {
                assert!(node.n >= 10 || node.depth == 0);
            }
        }
    }

    #[test]
    fn test_illustrative_tree_uses_treated_only() {
        let n = 120;
        let treatment: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        // Outcome ordered by x within the treated half.
        let outcome: Vec<f64> = x.iter().map(|v| v * 2.0).collect();

        let clean = DataFrame::from_columns(vec![
            Column::numeric("treatment", treatment),
            Column::numeric("profit_change", outcome),
            Column::numeric("assets_total_bl", x),
        ])
        .unwrap();

        let config = IllustrativeTreeConfig {
            covariates: vec!["assets_total_bl".to_string()],
            seed: 11,
            ..Default::default()
        };
        let result = illustrative_tree(&clean, &config).unwrap();
        assert_eq!(result.n_train + result.n_test, 60);
        assert_eq!(result.n_train, 36); // round(60 * 0.6)
        assert_eq!(result.tree.class_labels.len(), 5);
        // Split features carry resolved names.
        for node in &result.tree.nodes {
            if let Some(split) = &node.split {
                assert_eq!(split.feature, "assets_total_bl");
            }
        }
    }

    #[test]
    fn test_illustrative_tree_rejects_missing_treatment() {
        let clean = DataFrame::from_columns(vec![
            Column::numeric("treatment", vec![1.0, f64::NAN, 0.0]),
            Column::numeric("profit_change", vec![1.0, 2.0, 3.0]),
            Column::numeric("assets_total_bl", vec![0.1, 0.2, 0.3]),
        ])
        .unwrap();
        let config = IllustrativeTreeConfig {
            covariates: vec!["assets_total_bl".to_string()],
            ..Default::default()
        };
        let err = illustrative_tree(&clean, &config).unwrap_err();
        assert!(matches!(err, Error::Fit(_)));
    }

    #[test]
    fn test_illustrative_tree_requires_covariates() {
        let clean = DataFrame::from_columns(vec![
            Column::numeric("treatment", vec![1.0, 0.0]),
            Column::numeric("profit_change", vec![1.0, 2.0]),
        ])
        .unwrap();
        let err = illustrative_tree(&clean, &IllustrativeTreeConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
