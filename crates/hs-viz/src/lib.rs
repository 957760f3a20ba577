//! # hs-viz
//!
//! Visualization data artifacts for hetstat.
//!
//! This crate is intentionally dependency-light and focuses on emitting
//! plot-friendly JSON structures (arrays instead of nested objects).

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Covariate-importance ranking artifacts.
pub mod ranking;

/// Effect-vs-covariate scatter panels with smoothed trends.
pub mod scatter;

/// Decision-tree diagram artifacts.
pub mod tree;

pub use ranking::ImportanceArtifact;
pub use scatter::{EffectScatterGrid, EffectScatterPanel, scatter_panel};
pub use tree::{TreeDiagramArtifact, TreeDiagramNode};
