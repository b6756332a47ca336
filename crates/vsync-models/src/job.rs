//! Export job definitions.
//!
//! An [`ExportJob`] is the server-side state of one synchronization export.
//! It is created in [`JobStatus::Initializing`] when the upload is accepted,
//! mutated by exactly one worker while running, and removed once the
//! finished file has been downloaded (or the retention window expires).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an export job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Export job lifecycle status.
///
/// Statuses are ordered; a job only ever moves forward, except that any
/// non-terminal status may jump straight to [`JobStatus::Error`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job accepted, worker not started yet
    #[default]
    Initializing,
    /// Uploaded payloads are being written to scratch space
    Uploading,
    /// Probing the video for duration and audio streams
    Analyzing,
    /// FFmpeg is running
    Processing,
    /// Output is ready for download
    Complete,
    /// Job failed
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Initializing => "initializing",
            JobStatus::Uploading => "uploading",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Initializing => 0,
            JobStatus::Uploading => 1,
            JobStatus::Analyzing => 2,
            JobStatus::Processing => 3,
            JobStatus::Complete => 4,
            JobStatus::Error => 5,
        }
    }

    /// Whether a job in `self` may move to `next`.
    ///
    /// Staying in the same non-terminal status is allowed so that
    /// progress/message-only updates can carry the current status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Error || next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised when an update would violate the job lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStateError {
    #[error("job is already {0} and cannot be updated")]
    Terminal(JobStatus),

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Server-side state of one export.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExportJob {
    /// Unique job ID
    pub id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable current activity
    pub message: String,
    /// Failure cause, only set when `status == error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Finished artifact, only set when `status == complete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Media seconds encoded so far, once FFmpeg reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    /// Expected output duration in seconds, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    /// Original uploaded video filename
    pub filename: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ExportJob {
    /// Create a new job in the `initializing` state.
    pub fn new(id: JobId, filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Initializing,
            progress: 0,
            message: "Starting export...".to_string(),
            error: None,
            output_path: None,
            current_time: None,
            total_time: None,
            filename: filename.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Name the downloaded artifact is served under.
    pub fn download_filename(&self) -> String {
        format!("synced_{}", self.filename)
    }

    /// Merge a partial update into this job.
    ///
    /// Progress and encoding times never decrease and are frozen once the
    /// job fails. `error` is kept only for failed jobs and `output_path`
    /// only for completed ones.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), JobStateError> {
        if self.is_terminal() {
            return Err(JobStateError::Terminal(self.status));
        }

        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(JobStateError::InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
        }

        if let Some(progress) = update.progress {
            if self.status != JobStatus::Error {
                self.progress = self.progress.max(progress.min(100));
            }
        }

        if self.status != JobStatus::Error {
            if let Some(current) = update.current_time {
                self.current_time = Some(self.current_time.map_or(current, |c| c.max(current)));
            }
            if let Some(total) = update.total_time {
                self.total_time = Some(total);
            }
        }

        if let Some(message) = update.message {
            self.message = message;
        }

        if self.status == JobStatus::Error {
            if let Some(error) = update.error {
                self.error = Some(error);
            }
        }

        if self.status == JobStatus::Complete {
            if let Some(path) = update.output_path {
                self.output_path = Some(path);
            }
        }

        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial job state merged by the job store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub output_path: Option<PathBuf>,
    pub current_time: Option<f64>,
    pub total_time: Option<f64>,
}

impl JobUpdate {
    /// Move to a new stage with a progress floor and message.
    pub fn stage(status: JobStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Progress/message update that keeps the current status.
    pub fn progress(progress: Option<u8>, message: impl Into<String>) -> Self {
        Self {
            progress,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Attach encoding position and expected duration.
    pub fn with_times(mut self, current_time: f64, total_time: Option<f64>) -> Self {
        self.current_time = Some(current_time);
        self.total_time = total_time;
        self
    }

    /// Terminal success with the durable output location.
    pub fn complete(output_path: PathBuf) -> Self {
        Self {
            status: Some(JobStatus::Complete),
            progress: Some(100),
            message: Some("Export complete! Ready for download.".to_string()),
            output_path: Some(output_path),
            ..Default::default()
        }
    }

    /// Terminal failure.
    pub fn failed(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(error.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }
}
