//! API integration tests.

#![cfg(unix)]

#[path = "../../vsync-worker/tests/common/mod.rs"]
mod common;

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{FakeTools, FfmpegBehavior, FfprobeBehavior};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use vsync_api::{create_router, ApiConfig, AppState};
use vsync_models::{ExportJob, JobId, JobStatus};
use vsync_worker::WorkerConfig;

const BOUNDARY: &str = "vsync-test-boundary";

enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let body = multipart_body(parts);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn full_upload<'a>() -> Vec<Part<'a>> {
    vec![
        Part::File {
            name: "video_file",
            filename: "clip.mp4",
            data: b"video bytes",
        },
        Part::File {
            name: "audio_file",
            filename: "take2.wav",
            data: b"audio bytes",
        },
        Part::Text {
            name: "offset",
            value: "1.5",
        },
        Part::Text {
            name: "crossfade",
            value: "100",
        },
    ]
}

struct TestApp {
    _root: TempDir,
    state: AppState,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(ApiConfig::default())
    }

    fn with_config(config: ApiConfig) -> Self {
        Self::with_tools(
            config,
            FfmpegBehavior::Succeed { secs: 20 },
            FfprobeBehavior::Report {
                duration: 20.0,
                has_audio: true,
            },
        )
    }

    fn with_tools(config: ApiConfig, ffmpeg: FfmpegBehavior, ffprobe: FfprobeBehavior) -> Self {
        let root = tempfile::tempdir().unwrap();
        let tools = FakeTools::install(root.path(), ffmpeg, ffprobe);
        let worker_config = WorkerConfig {
            ffmpeg_path: tools.ffmpeg.clone(),
            ffprobe_path: tools.ffprobe.clone(),
            progress_pacing: Duration::ZERO,
            ..WorkerConfig::default().with_root(root.path())
        };
        let config = ApiConfig {
            progress_poll_interval: Duration::from_millis(10),
            ..config
        };

        let state = AppState::new(config, worker_config);
        let router = create_router(state.clone(), None);
        Self {
            _root: root,
            state,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn wait_for_terminal(&self, job_id: &JobId) -> ExportJob {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let job = self.state.store.get(job_id).await.unwrap();
                if job.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("export did not finish")
    }
}

/// SSE `data:` payloads in arrival order.
fn sse_events(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.send_json(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_tools_and_export_dir() {
    let app = TestApp::new();
    let (status, body) = app.send_json(get("/ready")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["ffmpeg"]["status"], "ok");
    assert_eq!(body["checks"]["export_dir"]["status"], "ok");
    assert_eq!(body["active_exports"], 0);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::new();
    let (_, headers, _) = app.send(get("/health")).await;

    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_missing_audio_is_rejected() {
    let app = TestApp::new();
    let request = upload_request(
        "/api/exports",
        &[Part::File {
            name: "video_file",
            filename: "clip.mp4",
            data: b"video bytes",
        }],
    );
    let (status, body) = app.send_json(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "audio_file is required");
    assert!(app.state.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_video_is_rejected() {
    let app = TestApp::new();
    let request = upload_request(
        "/api/exports",
        &[
            Part::File {
                name: "video_file",
                filename: "clip.mp4",
                data: b"",
            },
            Part::File {
                name: "audio_file",
                filename: "take2.wav",
                data: b"audio bytes",
            },
        ],
    );
    let (status, body) = app.send_json(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "video_file is empty");
}

#[tokio::test]
async fn test_out_of_range_crossfade_is_rejected() {
    let app = TestApp::new();
    let mut parts = full_upload();
    parts[3] = Part::Text {
        name: "crossfade",
        value: "150",
    };
    let (status, body) = app.send_json(upload_request("/api/exports", &parts)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("crossfade"));
    assert!(app.state.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::with_config(ApiConfig {
        max_upload_size: 64,
        ..ApiConfig::default()
    });
    let (status, _, _) = app.send(upload_request("/api/exports", &full_upload())).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_uploads_are_rate_limited_per_client() {
    let app = TestApp::with_config(ApiConfig {
        rate_limit_rps: 1,
        ..ApiConfig::default()
    });

    let from = |ip: &str| {
        let mut request = upload_request("/api/exports", &[]);
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    let (first, _, _) = app.send(from("192.168.1.100")).await;
    assert_ne!(first, StatusCode::TOO_MANY_REQUESTS);

    let (second, headers, _) = app.send(from("192.168.1.100")).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "1");

    let (other, _, _) = app.send(from("192.168.1.101")).await;
    assert_ne!(other, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_progress_for_unknown_job() {
    let app = TestApp::new();
    let (status, headers, body) = app.send(get("/api/exports/nope/progress")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let events = sse_events(&body);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["error"], "Job not found");
}

#[tokio::test]
async fn test_download_unknown_job() {
    let app = TestApp::new();
    let (status, body) = app.send_json(get("/api/exports/nope/download")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Job not found");
}

#[tokio::test]
async fn test_download_before_complete() {
    let app = TestApp::new();
    let job_id = JobId::from_string("pending");
    app.state
        .store
        .create(ExportJob::new(job_id.clone(), "clip.mp4"))
        .await
        .unwrap();

    let (status, body) = app.send_json(get("/api/exports/pending/download")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Export not complete");
    // The job is untouched and still downloadable later
    assert!(app.state.store.get(&job_id).await.is_ok());
}

#[tokio::test]
async fn test_export_flow_end_to_end() {
    let app = TestApp::new();

    let (status, body) = app
        .send_json(upload_request("/api/exports", &full_upload()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = JobId::from_string(body["job_id"].as_str().unwrap());

    let job = app.wait_for_terminal(&job_id).await;
    assert_eq!(job.status, JobStatus::Complete, "job failed: {:?}", job.error);
    let output = job.output_path.clone().unwrap();
    let export_dir = output.parent().unwrap().to_path_buf();
    assert!(output.exists());

    // The stream ends on the terminal snapshot
    let (_, _, body) = app
        .send(get(&format!("/api/exports/{}/progress", job_id)))
        .await;
    let events = sse_events(&body);
    let last = events.last().unwrap();
    assert_eq!(last["status"], "complete");
    assert_eq!(last["progress"], 100);
    assert_eq!(
        last["download_url"],
        format!("/api/exports/{}/download", job_id)
    );
    assert!(last.get("output_path").is_none());

    let (status, headers, body) = app
        .send(get(&format!("/api/exports/{}/download", job_id)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"fake mp4");
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
    assert!(headers
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("filename=\"synced_clip.mp4\""));

    // Files go away once the body is done, and the job is forgotten
    tokio::time::timeout(Duration::from_secs(5), async {
        while export_dir.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("export directory was not cleaned up");

    let (status, _) = app
        .send_json(get(&format!("/api/exports/{}/download", job_id)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_legacy_routes() {
    let app = TestApp::new();

    let (status, body) = app
        .send_json(upload_request("/export-video-server", &full_upload()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = JobId::from_string(body["job_id"].as_str().unwrap());
    app.wait_for_terminal(&job_id).await;

    let (_, _, body) = app.send(get(&format!("/export-progress/{}", job_id))).await;
    assert_eq!(sse_events(&body).last().unwrap()["status"], "complete");

    let (status, _, body) = app.send(get(&format!("/export-download/{}", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"fake mp4");
}

#[tokio::test]
async fn test_progress_stream_follows_a_running_export() {
    let app = TestApp::with_tools(
        ApiConfig::default(),
        FfmpegBehavior::Slow {
            secs: 40,
            pause_ms: 200,
        },
        FfprobeBehavior::Report {
            duration: 40.0,
            has_audio: true,
        },
    );

    let (status, body) = app
        .send_json(upload_request("/api/exports", &full_upload()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    // Opened while the export is still running; ends on its own at the terminal snapshot
    let (status, _, body) = tokio::time::timeout(
        Duration::from_secs(10),
        app.send(get(&format!("/api/exports/{}/progress", job_id))),
    )
    .await
    .expect("progress stream did not end");
    assert_eq!(status, StatusCode::OK);

    let events = sse_events(&body);
    assert!(events.len() > 2, "expected several snapshots, got {:?}", events);
    assert_ne!(events[0]["status"], "complete");

    let progress: Vec<u64> = events
        .iter()
        .map(|e| e["progress"].as_u64().unwrap())
        .collect();
    assert!(
        progress.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {:?}",
        progress
    );

    let processing: Vec<&Value> = events
        .iter()
        .filter(|e| e["status"] == "processing")
        .collect();
    assert!(processing
        .iter()
        .all(|e| (50..=95).contains(&e["progress"].as_u64().unwrap())));
    assert!(
        processing.iter().any(|e| e["progress"].as_u64().unwrap() > 50),
        "no encoding progress observed: {:?}",
        progress
    );
    assert!(processing.iter().any(|e| e["current_time"].as_f64().is_some()));

    for event in &events[..events.len() - 1] {
        assert_ne!(event["progress"], 100);
    }
    let last = events.last().unwrap();
    assert_eq!(last["status"], "complete");
    assert_eq!(last["progress"], 100);
}
