//! Health check handlers.

use std::path::Path;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use vsync_media::{check_ffmpeg, check_ffprobe};

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    pub active_exports: usize,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
    pub export_dir: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

fn timed<T, E: ToString>(check: impl FnOnce() -> Result<T, E>) -> CheckStatus {
    let start = Instant::now();
    match check() {
        Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
        Err(e) => CheckStatus::error(e.to_string()),
    }
}

/// Create the directory if needed and prove a file can be written in it.
fn check_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    tempfile::tempfile_in(dir).map(|_| ())
}

/// Readiness check endpoint (readiness probe).
/// Checks that FFmpeg and FFprobe resolve and the export directory is writable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let worker_config = state.worker.config().clone();

    // PATH lookups and the write test touch the filesystem
    let checks = tokio::task::spawn_blocking(move || ReadinessChecks {
        ffmpeg: timed(|| check_ffmpeg(&worker_config.ffmpeg_path)),
        ffprobe: timed(|| check_ffprobe(&worker_config.ffprobe_path)),
        export_dir: timed(|| check_writable(&worker_config.output_dir)),
    })
    .await
    .unwrap_or_else(|e| ReadinessChecks {
        ffmpeg: CheckStatus::error(e.to_string()),
        ffprobe: CheckStatus::error(e.to_string()),
        export_dir: CheckStatus::error(e.to_string()),
    });

    let active_exports = state
        .store
        .list()
        .await
        .map(|jobs| jobs.iter().filter(|j| !j.is_terminal()).count())
        .unwrap_or(0);

    let all_ok = checks.ffmpeg.is_ok() && checks.ffprobe.is_ok() && checks.export_dir.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks,
        active_exports,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
