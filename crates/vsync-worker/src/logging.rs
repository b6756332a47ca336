//! Structured export logging.
//!
//! Every event carries the job id so one export can be followed through
//! the logs of a busy server.

use tracing::{error, info, warn, Span};
use vsync_models::{JobId, JobStatus};

use crate::error::WorkerError;

/// Logger bound to one export job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    filename: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, filename: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
        }
    }

    pub fn log_start(&self, offset: f64, crossfade: f64, clip_video: bool) {
        info!(
            job_id = %self.job_id,
            filename = %self.filename,
            offset,
            crossfade,
            clip_video,
            "Export started"
        );
    }

    pub fn log_stage(&self, status: JobStatus, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %status,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "Export warning: {}", message);
    }

    /// Log a failure with everything the client is not shown.
    pub fn log_failure(&self, err: &WorkerError) {
        match err {
            WorkerError::FfmpegFailed {
                exit_code,
                stderr_tail,
            } => error!(
                job_id = %self.job_id,
                exit_code = ?exit_code,
                stderr = stderr_tail.as_deref().unwrap_or(""),
                "Export failed: FFmpeg error"
            ),
            other => error!(
                job_id = %self.job_id,
                reason = other.reason(),
                "Export failed: {}", other
            ),
        }
    }

    pub fn log_completion(&self, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            filename = %self.filename,
            elapsed_secs,
            "Export completed"
        );
    }

    /// Span wrapping the whole export.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("export", job_id = %self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_log_without_a_subscriber() {
        let logger = JobLogger::new(&JobId::new(), "clip.mp4");
        logger.log_failure(&WorkerError::FfmpegFailed {
            exit_code: Some(1),
            stderr_tail: Some("Conversion failed!".to_string()),
        });
        logger.log_failure(&WorkerError::OutputMissing);
        let _entered = logger.create_span().entered();
        logger.log_stage(JobStatus::Processing, "Processing with FFmpeg...");
    }
}
