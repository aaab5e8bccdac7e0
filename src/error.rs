//! Error types shared across the library.
//!
//! Every fallible operation returns [`Result`]. Failures are immediate and
//! synchronous: a shape mismatch or invalid configuration aborts the whole
//! batch rather than truncating or padding tensors.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// All error conditions the library can report.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Invalid topology or hyperparameters, detected before any tensor math
    /// runs (e.g. a convolution or pooling step that would produce a
    /// non-positive spatial dimension).
    #[error("configuration error: {0}")]
    Config(String),

    /// A layer was called with tensors whose dimensions do not match its
    /// declared channel/kernel/feature counts.
    #[error("{layer}: shape mismatch, expected {expected}, got {actual}")]
    ShapeMismatch {
        layer: &'static str,
        expected: String,
        actual: String,
    },

    /// `backward` was called without a matching `forward`: the transient
    /// state a backward pass consumes (saved input, activation mask) is
    /// created by the preceding forward call and used exactly once.
    #[error("{layer}: backward called without a stored forward pass")]
    MissingForwardState { layer: &'static str },

    /// Config file could not be read.
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON or does not match the schema.
    #[error("could not parse config file: {0}")]
    Json(#[from] serde_json::Error),
}
