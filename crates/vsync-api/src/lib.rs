//! Axum HTTP API server for video/audio sync exports.
//!
//! This crate provides:
//! - Multipart export submission with per-IP rate limiting
//! - Server-sent progress snapshots
//! - One-shot streaming downloads
//! - Prometheus metrics and health probes

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::ExportReaper;
pub use state::AppState;
