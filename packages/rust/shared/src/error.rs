//! Error types for mystify.
//!
//! Library crates use [`MystifyError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The formatting engine itself never fails on malformed input. Errors only
//! come from configuration, I/O at the host boundary, decoding externally
//! supplied data, and the strict verification wrapper.

use std::path::PathBuf;

/// Top-level error type for all mystify operations.
#[derive(Debug, thiserror::Error)]
pub enum MystifyError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad threshold, unknown feature, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON encoding or decoding error for externally supplied data.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The formatted output failed the preservation check.
    #[error(
        "verification failed: {preservation_percentage:.1}% of words and \
         {sentence_preservation_rate:.1}% of sentences preserved ({issue_count} issues)"
    )]
    Verification {
        preservation_percentage: f64,
        sentence_preservation_rate: f64,
        issue_count: usize,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MystifyError>;

impl MystifyError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a verification error from the verdict statistics.
    pub fn verification(
        preservation_percentage: f64,
        sentence_preservation_rate: f64,
        issue_count: usize,
    ) -> Self {
        Self::Verification {
            preservation_percentage,
            sentence_preservation_rate,
            issue_count,
        }
    }
}

impl From<serde_json::Error> for MystifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
