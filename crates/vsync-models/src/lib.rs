//! Shared data models for the video sync export service.
//!
//! This crate provides Serde-serializable types for:
//! - Export jobs and their lifecycle status
//! - Partial job updates merged by the job store
//! - Validated export request parameters
//! - Uploaded files with sanitized names

pub mod job;
pub mod params;
pub mod upload;

// Re-export common types
pub use job::{ExportJob, JobId, JobStateError, JobStatus, JobUpdate};
pub use params::{ExportParams, ParamsError, MAX_OFFSET_SECS};
pub use upload::{sanitize_filename, UploadedFile};
