//! Application state.

use std::sync::Arc;

use vsync_store::{InMemoryJobStore, JobStore};
use vsync_worker::{ExportWorker, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobStore>,
    pub worker: ExportWorker,
}

impl AppState {
    /// Create state backed by a fresh in-memory job store.
    pub fn new(config: ApiConfig, worker_config: WorkerConfig) -> Self {
        Self::with_store(config, worker_config, Arc::new(InMemoryJobStore::new()))
    }

    /// Create state around an existing job store.
    pub fn with_store(config: ApiConfig, worker_config: WorkerConfig, store: Arc<dyn JobStore>) -> Self {
        let worker = ExportWorker::new(worker_config, Arc::clone(&store));
        Self {
            config,
            store,
            worker,
        }
    }
}
