//! # hs-inference
//!
//! Estimation machinery for hetstat.
//!
//! This crate provides:
//! - Stata `.dta` (release 118) reading and writing
//! - Feature selection and derived-outcome construction
//! - Baseline OLS and grouped-mean summaries
//! - Honest causal forests with per-unit effect predictions
//! - LOESS trend smoothing, segment evaluation, and an illustrative
//!   classification tree
//!
//! ## Architecture
//!
//! Estimators implement the `EffectEstimator`/`EffectModel` traits from
//! hs-core, so reporting code never depends on a concrete forest.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Quantile binning and the illustrative gini classification tree.
pub mod cart;
/// Design-matrix expansion (numeric passthrough, categorical indicators).
pub mod design;
/// Stata `.dta` transport: reader, writer, and DataFrame conversion.
pub mod dta;
/// Analysis-column selection and derived outcomes.
pub mod features;
/// Honest causal forest estimator.
pub mod forest;
/// Local polynomial (LOESS) trend smoothing.
pub mod loess;
/// Ordinary least squares and grouped means.
pub mod ols;
/// Segment evaluation of predicted effects.
pub mod segment;
/// Seeded train/test partitioning.
pub mod split;

pub use cart::{
    CartConfig, CartNode, CartSplit, CartTree, IllustrativeTree, IllustrativeTreeConfig,
    illustrative_tree, quantile_bins,
};
pub use design::{DesignMatrix, design_matrix};
pub use dta::{DtaDataset, DtaValue, DtaVariable, dta_to_frame, read_dta, variable_labels, write_dta};
pub use features::{FeatureConfig, select_features};
pub use forest::{CausalForest, CausalForestConfig, treatment_codes};
pub use loess::{loess, smoothed_trend};
pub use ols::{grouped_mean, ols, ols_on_treatment};
pub use segment::{SegmentReport, SegmentSlice, evaluate_segments};
pub use split::{SplitIndices, train_test_indices, train_test_split};
