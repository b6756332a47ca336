//! Background export worker.
//!
//! This crate provides:
//! - The export pipeline (save uploads, probe, FFmpeg, finalize)
//! - Progress publishing from FFmpeg output to the job store
//! - Task supervision so a crashed export still ends in `error`

pub mod config;
pub mod error;
pub mod export_job;
pub mod logging;
pub mod metrics;
pub mod progress_reporter;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use export_job::{ExportRequest, ExportWorker};
pub use logging::JobLogger;
pub use progress_reporter::ProgressReporter;
