//! Error types for job validation.

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a job is rejected before it reaches the pipeline.
#[derive(Debug, Error)]
pub enum JobError {
    /// Input file does not exist or is not a regular file.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output path is unusable.
    #[error("{reason}")]
    InvalidOutput { reason: String },

    /// A numeric setting is outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

impl JobError {
    pub(crate) fn invalid_output(reason: impl Into<String>) -> Self {
        Self::InvalidOutput {
            reason: reason.into(),
        }
    }
}
