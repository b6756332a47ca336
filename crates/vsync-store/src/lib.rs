//! Export job state store.
//!
//! This crate provides:
//! - The [`JobStore`] trait the worker and API share
//! - A process-local [`InMemoryJobStore`]
//!
//! Jobs live only as long as the process; a restart forgets them.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{InMemoryJobStore, JobStore};
