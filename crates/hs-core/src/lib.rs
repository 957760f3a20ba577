//! # hs-core
//!
//! Core types for hetstat: the shared error type, the column-oriented
//! data frame exchanged between pipeline stages, regression result
//! tables, and the effect-model trait seam.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types.
pub mod error;
/// Column-oriented tabular data.
pub mod frame;
/// Effect-model fit/predict traits.
pub mod traits;
/// Common result types.
pub mod types;

pub use error::{Error, Result};
pub use frame::{Column, ColumnData, DataFrame};
pub use traits::{EffectEstimator, EffectModel};
pub use types::{Coefficient, CoefficientTable, EffectPrediction, GroupSummary};
