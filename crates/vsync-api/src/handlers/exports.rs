//! Export handlers: submit, follow progress, download.

use std::convert::Infallible;
use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use vsync_media::{remove_dir_quietly, remove_file_quietly};
use vsync_models::{ExportJob, ExportParams, JobId, JobStatus, UploadedFile};
use vsync_store::JobStore;
use vsync_worker::ExportRequest;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Response to an accepted export.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartExportResponse {
    pub job_id: String,
}

/// One progress snapshot pushed over SSE.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ExportJob> for ProgressSnapshot {
    fn from(job: &ExportJob) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            error: job.error.clone(),
            filename: job.filename.clone(),
            current_time: job.current_time,
            total_time: job.total_time,
            download_url: (job.status == JobStatus::Complete)
                .then(|| format!("/api/exports/{}/download", job.id)),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Default)]
struct ExportForm {
    video: Option<UploadedFile>,
    audio: Option<UploadedFile>,
    offset: Option<String>,
    crossfade: Option<String>,
    clip_video: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<ExportForm> {
    let mut form = ExportForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video_file" | "audio_file" => {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await?;
                let file = UploadedFile::new(filename.as_deref(), data.to_vec());
                if name == "video_file" {
                    form.video = Some(file);
                } else {
                    form.audio = Some(file);
                }
            }
            "offset" => form.offset = Some(field.text().await?),
            "crossfade" => form.crossfade = Some(field.text().await?),
            "clip_video" => form.clip_video = Some(field.text().await?),
            other => debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    Ok(form)
}

fn require_file(file: Option<UploadedFile>, field: &str) -> ApiResult<UploadedFile> {
    match file {
        Some(file) if !file.is_empty() => Ok(file),
        Some(_) => Err(ApiError::bad_request(format!("{} is empty", field))),
        None => Err(ApiError::bad_request(format!("{} is required", field))),
    }
}

/// Accept an upload and start exporting it in the background.
pub async fn start_export(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<StartExportResponse>> {
    let form = read_form(multipart).await?;

    let video = require_file(form.video, "video_file")?;
    let audio = require_file(form.audio, "audio_file")?;
    let params = ExportParams::from_form_fields(
        form.offset.as_deref(),
        form.crossfade.as_deref(),
        form.clip_video.as_deref(),
    )?;

    let job = ExportJob::new(JobId::new(), video.filename());
    let job_id = job.id.clone();
    state.store.create(job).await?;

    info!(
        job_id = %job_id,
        video = %video.filename(),
        audio = %audio.filename(),
        video_bytes = video.len(),
        audio_bytes = audio.len(),
        "Export accepted"
    );
    metrics::record_export_submitted(video.len(), audio.len());

    // The supervisor owns the task; its handle is not needed here
    drop(state.worker.spawn(ExportRequest {
        job_id: job_id.clone(),
        video,
        audio,
        params,
    }));

    Ok(Json(StartExportResponse {
        job_id: job_id.to_string(),
    }))
}

enum Poll {
    First,
    Again,
    Done,
}

/// Stream job snapshots until the job reaches a terminal state.
pub async fn export_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let job_id = JobId::from_string(job_id);
    let interval = state.config.progress_poll_interval;

    let events = stream::unfold(Poll::First, move |poll| {
        let store = state.store.clone();
        let job_id = job_id.clone();
        async move {
            match poll {
                Poll::Done => None,
                Poll::First => Some(next_snapshot(store.as_ref(), &job_id).await),
                Poll::Again => {
                    tokio::time::sleep(interval).await;
                    Some(next_snapshot(store.as_ref(), &job_id).await)
                }
            }
        }
    });

    Sse::new(events.map(Ok)).keep_alive(KeepAlive::default())
}

async fn next_snapshot(store: &dyn JobStore, job_id: &JobId) -> (Event, Poll) {
    match store.get(job_id).await {
        Ok(job) => {
            let next = if job.is_terminal() { Poll::Done } else { Poll::Again };
            (json_event(&ProgressSnapshot::from(&job)), next)
        }
        Err(e) => {
            if !e.is_not_found() {
                warn!(job_id = %job_id, "Progress lookup failed: {}", e);
            }
            (json_event(&serde_json::json!({ "error": "Job not found" })), Poll::Done)
        }
    }
}

fn json_event<T: Serialize>(value: &T) -> Event {
    match serde_json::to_string(value) {
        Ok(data) => Event::default().data(data),
        Err(e) => Event::default().data(format!(r#"{{"error":"{}"}}"#, e)),
    }
}

/// Removes a downloaded export once its response body is dropped.
struct DownloadCleanup {
    file: PathBuf,
    dir: Option<PathBuf>,
}

impl Drop for DownloadCleanup {
    fn drop(&mut self) {
        let file = std::mem::take(&mut self.file);
        let dir = self.dir.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    remove_file_quietly(&file).await;
                    if let Some(dir) = dir {
                        remove_dir_quietly(&dir).await;
                    }
                });
            }
            Err(_) => {
                let _ = std::fs::remove_file(&file);
                if let Some(dir) = dir {
                    let _ = std::fs::remove_dir_all(&dir);
                }
            }
        }
    }
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987 name.
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    )
}

/// Serve a finished export once, then forget it and delete its files.
pub async fn download_export(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = JobId::from_string(job_id);

    let job = state
        .store
        .get(&job_id)
        .await
        .map_err(|_| ApiError::not_found("Job not found"))?;
    if job.status != JobStatus::Complete {
        return Err(ApiError::bad_request("Export not complete"));
    }

    // Only one request can take the job; concurrent downloads see "not found"
    let job = state
        .store
        .take(&job_id)
        .await
        .map_err(|_| ApiError::not_found("Job not found"))?;

    let Some(path) = job.output_path.clone() else {
        return Err(ApiError::not_found("Output file not found"));
    };
    let cleanup = DownloadCleanup {
        dir: export_dir_of(&path, &state.worker.config().output_dir),
        file: path.clone(),
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(job_id = %job_id, "Export file missing at {}: {}", path.display(), e);
            return Err(ApiError::not_found("Output file not found"));
        }
    };
    let length = file.metadata().await.ok().map(|m| m.len());

    info!(job_id = %job_id, "Serving export download");
    metrics::record_export_downloaded();

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _ = &cleanup;
        chunk
    });

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("video/mp4"));
    if let Ok(value) = content_disposition(&job.download_filename()).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, length.into());
    }

    Ok(response)
}

/// The per-export directory holding `path`, if it sits inside the output root.
pub(crate) fn export_dir_of(path: &FsPath, output_root: &FsPath) -> Option<PathBuf> {
    let parent = path.parent()?;
    (parent != output_root && parent.starts_with(output_root)).then(|| parent.to_path_buf())
}
