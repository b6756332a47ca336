//! Worker error types.
//!
//! Every failure a running export can hit maps to one of these variants,
//! and every variant maps to the `error`/`message` pair the client sees.

use std::time::Duration;

use thiserror::Error;
use vsync_media::MediaError;
use vsync_models::JobUpdate;
use vsync_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to save uploaded files: {0}")]
    SaveUploads(#[source] std::io::Error),

    #[error("FFmpeg exited with code {exit_code:?}")]
    FfmpegFailed {
        exit_code: Option<i32>,
        stderr_tail: Option<String>,
    },

    #[error("FFmpeg timed out after {0:?}")]
    Timeout(Duration),

    #[error("FFmpeg exited successfully but no output was written")]
    OutputMissing,

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task aborted")]
    Aborted,
}

impl WorkerError {
    pub fn save_uploads(err: std::io::Error) -> Self {
        Self::SaveUploads(err)
    }

    /// Convert an FFmpeg runner failure, keeping exit status and timeouts distinct.
    pub fn from_ffmpeg(err: MediaError, timeout: Duration) -> Self {
        match err {
            MediaError::Timeout(_) => Self::Timeout(timeout),
            MediaError::FfmpegFailed {
                exit_code, stderr, ..
            } => Self::FfmpegFailed {
                exit_code,
                stderr_tail: stderr,
            },
            other => Self::Media(other),
        }
    }

    /// Text stored in the job's `error` field.
    pub fn job_error(&self) -> String {
        match self {
            Self::SaveUploads(e) => format!("Failed to save uploaded files: {}", e),
            Self::FfmpegFailed { .. } => "FFmpeg processing failed".to_string(),
            Self::Timeout(limit) => format!("Processing timeout ({})", human_duration(*limit)),
            Self::OutputMissing => "Output file was not created".to_string(),
            other => format!("Export failed: {}", other),
        }
    }

    /// Short status line stored in the job's `message` field.
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::SaveUploads(_) => "File upload error",
            Self::FfmpegFailed { .. } => "Processing failed",
            Self::Timeout(_) => "Export timed out",
            Self::OutputMissing => "Export failed",
            _ => "Unexpected error",
        }
    }

    /// Label used for the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SaveUploads(_) => "upload",
            Self::FfmpegFailed { .. } => "ffmpeg",
            Self::Timeout(_) => "timeout",
            Self::OutputMissing => "no_output",
            Self::Media(_) => "media",
            Self::Store(_) => "store",
            Self::Io(_) => "io",
            Self::Aborted => "aborted",
        }
    }

    /// Terminal update describing this failure.
    pub fn to_update(&self) -> JobUpdate {
        JobUpdate::failed(self.job_error(), self.status_message())
    }
}

fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}
