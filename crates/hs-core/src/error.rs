//! Error types for hetstat

use thiserror::Error;

/// hetstat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input file could not be read or is malformed
    #[error("Read error: {0}")]
    Read(String),

    /// Expected column missing or mistyped
    #[error("Schema error: {0}")]
    Schema(String),

    /// Model fitting failed
    #[error("Fit error: {0}")]
    Fit(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
