//! Publishes FFmpeg progress to the job store while the process runs.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};
use vsync_media::{is_progress_field, LineBuffer, ProgressTracker, StderrTail};
use vsync_models::{JobId, JobUpdate};
use vsync_store::JobStore;

const READ_CHUNK: usize = 4096;

/// Reads FFmpeg's stderr to EOF and turns it into job updates.
pub struct ProgressReporter<'a> {
    store: &'a dyn JobStore,
    job_id: &'a JobId,
    tracker: ProgressTracker,
    pacing: Duration,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(store: &'a dyn JobStore, job_id: &'a JobId, total_secs: f64, pacing: Duration) -> Self {
        Self {
            store,
            job_id,
            tracker: ProgressTracker::new(total_secs),
            pacing,
        }
    }

    /// Consume `reader` until EOF.
    ///
    /// Never fails: read and store errors end or skip reporting but are
    /// not propagated. Returns the last diagnostic lines FFmpeg printed.
    pub async fn run<R>(mut self, mut reader: R) -> String
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = LineBuffer::new();
        let mut tail = StderrTail::default();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let read = match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(job_id = %self.job_id, "Stopped reading FFmpeg output: {}", e);
                    break;
                }
            };
            for line in lines.push(&chunk[..read]) {
                self.handle_line(&line, &mut tail).await;
            }
        }
        if let Some(line) = lines.finish() {
            self.handle_line(&line, &mut tail).await;
        }

        tail.into_string()
    }

    async fn handle_line(&mut self, line: &str, tail: &mut StderrTail) {
        if !is_progress_field(line) {
            tail.push(line);
        }

        let Some(update) = self.tracker.observe(line) else {
            return;
        };

        debug!(
            job_id = %self.job_id,
            elapsed_secs = update.elapsed_secs,
            percent = ?update.percent,
            "FFmpeg progress"
        );

        let job_update = JobUpdate::progress(update.percent, update.message)
            .with_times(update.elapsed_secs, self.tracker.total_secs());
        if let Err(e) = self.store.update(self.job_id, job_update).await {
            warn!(job_id = %self.job_id, "Failed to publish progress: {}", e);
        }

        tokio::time::sleep(self.pacing).await;
    }
}
