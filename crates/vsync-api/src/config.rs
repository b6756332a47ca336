//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Export submissions per second per client IP
    pub rate_limit_rps: u32,
    /// Max multipart upload size in bytes
    pub max_upload_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// Delay between progress snapshots on the SSE stream
    pub progress_poll_interval: Duration,
    /// How long a finished export waits for its download
    pub export_retention: Duration,
    /// Interval between reaper sweeps
    pub reaper_interval: Duration,
    /// Run the expired-export reaper
    pub reaper_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_upload_size: 1024 * 1024 * 1024, // 1GB
            environment: "development".to_string(),
            metrics_enabled: true,
            progress_poll_interval: Duration::from_secs(1),
            export_retention: Duration::from_secs(3600),
            reaper_interval: Duration::from_secs(60),
            reaper_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_upload_size: env_parse("MAX_UPLOAD_SIZE").unwrap_or(defaults.max_upload_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: env_flag("METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
            progress_poll_interval: env_parse("PROGRESS_POLL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_poll_interval),
            export_retention: env_parse("EXPORT_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.export_retention),
            reaper_interval: env_parse("EXPORT_REAPER_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reaper_interval),
            reaper_enabled: env_flag("ENABLE_EXPORT_REAPER").unwrap_or(defaults.reaper_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}
