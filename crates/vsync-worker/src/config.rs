//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent of the per-job scratch directories
    pub work_dir: PathBuf,
    /// Parent of the per-job durable output directories
    pub output_dir: PathBuf,
    /// FFmpeg program name or path
    pub ffmpeg_path: PathBuf,
    /// FFprobe program name or path
    pub ffprobe_path: PathBuf,
    /// Wall-clock limit for one FFmpeg run
    pub ffmpeg_timeout: Duration,
    /// Limit for each FFprobe query
    pub probe_timeout: Duration,
    /// Pause after each published progress update
    pub progress_pacing: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("vsync");
        Self {
            work_dir: base.join("work"),
            output_dir: base.join("exports"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_timeout: Duration::from_secs(300), // 5 minutes
            probe_timeout: Duration::from_secs(30),
            progress_pacing: Duration::from_millis(100),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("EXPORT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("EXPORT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: std::env::var("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_path),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            probe_timeout: Duration::from_secs(
                std::env::var("FFPROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            progress_pacing: Duration::from_millis(
                std::env::var("PROGRESS_PACING_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            ),
        }
    }

    /// Use `root` for both scratch and output directories.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.work_dir = root.join("work");
        self.output_dir = root.join("exports");
        self
    }
}
