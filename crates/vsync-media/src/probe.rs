//! FFprobe media information.
//!
//! Probing is best-effort: a failed probe only costs progress estimation
//! and crossfade mixing, so [`probe_media`] never returns an error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What the sync pipeline needs to know about a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// Duration in seconds, 0.0 when unknown
    pub duration_secs: f64,
    /// Whether the file has at least one audio stream
    pub has_audio: bool,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[allow(dead_code)]
    codec_type: Option<String>,
}

/// Probe duration and audio presence, degrading to defaults on any failure.
pub async fn probe_media(
    ffprobe: impl AsRef<Path>,
    path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaProbe {
    let ffprobe = ffprobe.as_ref();
    let path = path.as_ref();

    let (duration, has_audio) = tokio::join!(
        probe_duration(ffprobe, path, timeout),
        probe_has_audio(ffprobe, path, timeout),
    );

    let duration_secs = duration.unwrap_or_else(|e| {
        warn!("Could not get video duration for {}: {}", path.display(), e);
        0.0
    });
    let has_audio = has_audio.unwrap_or_else(|e| {
        warn!("Could not check audio streams for {}: {}", path.display(), e);
        false
    });

    debug!(
        duration_secs,
        has_audio,
        "Probed {}",
        path.display()
    );

    MediaProbe {
        duration_secs,
        has_audio,
    }
}

/// Container duration in seconds.
pub async fn probe_duration(
    ffprobe: &Path,
    path: &Path,
    timeout: Duration,
) -> MediaResult<f64> {
    let probe = run_ffprobe(ffprobe, path, &["-show_format"], timeout).await?;
    probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::InvalidProbeOutput("missing format duration".to_string()))
}

/// Whether the file contains an audio stream.
pub async fn probe_has_audio(ffprobe: &Path, path: &Path, timeout: Duration) -> MediaResult<bool> {
    let probe = run_ffprobe(ffprobe, path, &["-show_streams", "-select_streams", "a"], timeout).await?;
    Ok(!probe.streams.is_empty())
}

async fn run_ffprobe(
    ffprobe: &Path,
    path: &Path,
    query: &[&str],
    timeout: Duration,
) -> MediaResult<FfprobeOutput> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let binary = check_ffprobe(ffprobe)?;

    let output = Command::new(binary)
        .args(["-v", "quiet", "-print_format", "json"])
        .args(query)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, output)
        .await
        .map_err(|_| MediaError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            format!("FFprobe exited with {}", output.status),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}
