//! Events and results published by a running job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::step::Step;
use crate::progress::ProgressUpdate;

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Dialog title shown for this outcome.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Succeeded => "Success",
            Self::Failed => "Error",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub title: String,
    pub message: String,
    /// Written file, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Frames rendered, when the render step ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<u64>,
}

impl JobResult {
    pub fn succeeded(message: impl Into<String>, output_path: PathBuf, frames: u64) -> Self {
        Self {
            status: JobStatus::Succeeded,
            title: JobStatus::Succeeded.title().to_string(),
            message: message.into(),
            output_path: Some(output_path),
            frames: Some(frames),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::without_output(JobStatus::Failed, message.into())
    }

    pub fn cancelled() -> Self {
        Self::without_output(
            JobStatus::Cancelled,
            "Operation was cancelled by user.".to_string(),
        )
    }

    fn without_output(status: JobStatus, message: String) -> Self {
        Self {
            status,
            title: status.title().to_string(),
            message,
            output_path: None,
            frames: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }

    /// Only failures count as errors; cancellation does not.
    pub fn is_error(&self) -> bool {
        self.status == JobStatus::Failed
    }
}

/// Everything a job reports to its caller, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Plain log line from a step.
    Log { step: Step, message: String },
    /// Preformatted completion line (HTML-like markup).
    RichLog { html: String },
    /// New progress value.
    Progress(ProgressUpdate),
    /// Always the last event of a job.
    Finished(JobResult),
}
