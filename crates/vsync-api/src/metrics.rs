//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid regex")
});
static EXPORT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/exports/[^/]+/").expect("valid regex"));

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vsync_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vsync_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vsync_http_requests_in_flight";

    // Export lifecycle
    pub const EXPORTS_SUBMITTED_TOTAL: &str = "vsync_exports_submitted_total";
    pub const EXPORTS_DOWNLOADED_TOTAL: &str = "vsync_exports_downloaded_total";
    pub const EXPORTS_REAPED_TOTAL: &str = "vsync_exports_reaped_total";
    pub const UPLOAD_BYTES: &str = "vsync_upload_bytes";

    // Rate limiting
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vsync_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted export and its upload sizes.
pub fn record_export_submitted(video_bytes: usize, audio_bytes: usize) {
    counter!(names::EXPORTS_SUBMITTED_TOTAL).increment(1);
    histogram!(names::UPLOAD_BYTES, "kind" => "video").record(video_bytes as f64);
    histogram!(names::UPLOAD_BYTES, "kind" => "audio").record(audio_bytes as f64);
}

pub fn record_export_downloaded() {
    counter!(names::EXPORTS_DOWNLOADED_TOTAL).increment(1);
}

pub fn record_exports_reaped(count: usize) {
    counter!(names::EXPORTS_REAPED_TOTAL).increment(count as u64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse job ids so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let path = UUID_RE.replace_all(path, ":job_id");
    EXPORT_ID_RE
        .replace_all(&path, "/exports/:job_id/")
        .into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/exports/550e8400-e29b-41d4-a716-446655440000/progress"),
            "/api/exports/:job_id/progress"
        );
        assert_eq!(
            sanitize_path("/api/exports/not-a-uuid/download"),
            "/api/exports/:job_id/download"
        );
        assert_eq!(sanitize_path("/api/exports"), "/api/exports");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
