//! Background service that forgets exports nobody downloaded.
//!
//! Each sweep:
//! - drops terminal jobs older than the retention window and deletes their output
//! - deletes export directories that no live job refers to
//! - deletes scratch directories once no job is running and they have
//!   outlived the longest an export can take

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use vsync_media::remove_dir_quietly;
use vsync_store::JobStore;
use vsync_worker::WorkerConfig;

use crate::config::ApiConfig;
use crate::handlers::exports::export_dir_of;
use crate::metrics;

/// Directory prefixes the worker creates under its scratch and output roots.
const SCRATCH_PREFIX: &str = "videosync_";
const EXPORT_PREFIX: &str = "export_";

/// Expired export reaper.
pub struct ExportReaper {
    store: Arc<dyn JobStore>,
    retention: Duration,
    scratch_min_age: Duration,
    interval: Duration,
    enabled: bool,
    work_dir: PathBuf,
    output_dir: PathBuf,
}

impl ExportReaper {
    pub fn new(store: Arc<dyn JobStore>, config: &ApiConfig, worker_config: &WorkerConfig) -> Self {
        Self {
            store,
            retention: config.export_retention,
            scratch_min_age: config
                .export_retention
                .max(
                    worker_config
                        .ffmpeg_timeout
                        .saturating_add(worker_config.probe_timeout.saturating_mul(2)),
                ),
            interval: config.reaper_interval,
            enabled: config.reaper_enabled,
            work_dir: worker_config.work_dir.clone(),
            output_dir: worker_config.output_dir.clone(),
        }
    }

    /// Start the background sweep loop.
    ///
    /// Runs until the task is dropped.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Export reaper is disabled");
            return;
        }

        info!(
            "Starting export reaper (interval: {:?}, retention: {:?})",
            self.interval, self.retention
        );

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;

            match self.reap_once().await {
                Ok(0) => {}
                Ok(n) => info!("Export reaper removed {} expired exports", n),
                Err(e) => error!("Export reaper error: {}", e),
            }
        }
    }

    /// Run a single sweep, returning how many jobs were dropped.
    pub async fn reap_once(&self) -> anyhow::Result<usize> {
        let jobs = self.store.list().await?;
        // A retention too large to subtract means nothing ever expires
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention));

        let mut reaped = 0;
        let mut live_dirs = HashSet::new();
        let mut any_running = false;

        for job in jobs {
            any_running |= !job.is_terminal();
            let expired = cutoff.is_some_and(|cutoff| job.updated_at <= cutoff);
            if !job.is_terminal() || !expired {
                if let Some(dir) = job.output_path.as_deref().and_then(|p| self.export_dir(p)) {
                    live_dirs.insert(dir);
                }
                continue;
            }

            // A download may have taken the job since the listing
            let Ok(job) = self.store.take(&job.id).await else {
                continue;
            };
            debug!(job_id = %job.id, status = %job.status.as_str(), "Reaping expired export");
            if let Some(dir) = job.output_path.as_deref().and_then(|p| self.export_dir(p)) {
                remove_dir_quietly(&dir).await;
            }
            reaped += 1;
        }

        let mut orphans = self
            .sweep_orphans(&self.output_dir, EXPORT_PREFIX, &live_dirs, self.retention)
            .await;
        // Scratch directories are not tied to a job record
        if !any_running {
            orphans += self
                .sweep_orphans(&self.work_dir, SCRATCH_PREFIX, &live_dirs, self.scratch_min_age)
                .await;
        }
        if orphans > 0 {
            info!("Removed {} orphaned export directories", orphans);
        }

        if reaped > 0 {
            metrics::record_exports_reaped(reaped);
        }
        Ok(reaped)
    }

    fn export_dir(&self, output_path: &Path) -> Option<PathBuf> {
        export_dir_of(output_path, &self.output_dir)
    }

    /// Remove `prefix*` directories under `root` older than `min_age`.
    async fn sweep_orphans(
        &self,
        root: &Path,
        prefix: &str,
        live: &HashSet<PathBuf>,
        min_age: Duration,
    ) -> usize {
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Cannot scan {}: {}", root.display(), e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let matches_prefix = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix));
            if !matches_prefix || live.contains(&path) {
                continue;
            }

            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if meta.is_dir() && age > min_age {
                remove_dir_quietly(&path).await;
                removed += 1;
            }
        }
        removed
    }
}
