//! Export worker metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Exports handed to the worker.
    pub const EXPORTS_STARTED: &str = "vsync_exports_started_total";

    /// Exports that produced a downloadable file.
    pub const EXPORTS_COMPLETED: &str = "vsync_exports_completed_total";

    /// Exports that ended in error, by reason.
    pub const EXPORTS_FAILED: &str = "vsync_exports_failed_total";

    /// FFmpeg wall-clock time in seconds.
    pub const FFMPEG_DURATION: &str = "vsync_ffmpeg_duration_seconds";
}

pub fn record_export_started() {
    counter!(names::EXPORTS_STARTED).increment(1);
}

pub fn record_export_completed() {
    counter!(names::EXPORTS_COMPLETED).increment(1);
}

pub fn record_export_failed(reason: &'static str) {
    counter!(names::EXPORTS_FAILED, "reason" => reason).increment(1);
}

pub fn record_ffmpeg_duration(secs: f64, succeeded: bool) {
    histogram!(
        names::FFMPEG_DURATION,
        "outcome" => if succeeded { "success" } else { "failure" }
    )
    .record(secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::EXPORTS_STARTED.ends_with("_total"));
        assert!(names::EXPORTS_FAILED.ends_with("_total"));
        assert!(names::FFMPEG_DURATION.ends_with("_seconds"));
    }
}
