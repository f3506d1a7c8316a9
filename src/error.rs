//! Errors returned by collection, reduction and wire decoding.

use thiserror::Error;

/// Error returned by the histogram engine.
///
/// Errors are always handed back to the caller; the engine never retries or
/// drops a failed contribution on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid facet settings, or merge operands built from different settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed wire payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// A sketch would need more memory than allowed.
    #[error("estimator overflow: sketch needs {requested} bytes, limit is {limit}")]
    EstimatorOverflow { requested: usize, limit: usize },
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub(crate) fn truncated(what: &'static str) -> Self {
        Self::Decode(format!("truncated payload while reading {what}"))
    }

    pub(crate) fn threshold_mismatch(lhs: u32, rhs: u32) -> Self {
        Self::Configuration(format!(
            "cannot merge results built with exact thresholds {lhs} and {rhs}"
        ))
    }
}
