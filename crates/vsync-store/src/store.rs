//! Job store trait and the in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use vsync_models::{ExportJob, JobId, JobUpdate};

use crate::error::{StoreError, StoreResult};

/// Shared registry of export jobs.
///
/// Every method is atomic with respect to the others: readers never
/// observe a partially merged update.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails if the id is already present.
    async fn create(&self, job: ExportJob) -> StoreResult<()>;

    /// Merge an update into a job and return the result.
    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<ExportJob>;

    /// Snapshot of a job.
    async fn get(&self, id: &JobId) -> StoreResult<ExportJob>;

    /// Remove a job. Removing an absent job is not an error.
    async fn delete(&self, id: &JobId) -> StoreResult<()>;

    /// Remove a job and return it, so exactly one caller wins.
    async fn take(&self, id: &JobId) -> StoreResult<ExportJob>;

    /// Snapshot of every job.
    async fn list(&self) -> StoreResult<Vec<ExportJob>>;
}

/// Process-local job store.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, ExportJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: ExportJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        debug!(job_id = %job.id, "Created job");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<ExportJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        // Merge into a copy so a rejected update leaves the stored job untouched
        let mut next = job.clone();
        next.apply(update)?;
        *job = next.clone();
        Ok(next)
    }

    async fn get(&self, id: &JobId) -> StoreResult<ExportJob> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &JobId) -> StoreResult<()> {
        if self.jobs.write().await.remove(id).is_some() {
            debug!(job_id = %id, "Deleted job");
        }
        Ok(())
    }

    async fn take(&self, id: &JobId) -> StoreResult<ExportJob> {
        self.jobs
            .write()
            .await
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list(&self) -> StoreResult<Vec<ExportJob>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }
}
