//! Export job execution.
//!
//! One export runs through `uploading → analyzing → processing → complete`,
//! publishing each stage to the job store. Any failure ends the job in
//! `error` with a user-facing message; scratch files are removed either way.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempDir;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{error, warn, Instrument};
use vsync_media::{build_sync_command, move_file, probe_media, remove_dir_quietly, FfmpegRunner, SyncOptions};
use vsync_models::{ExportParams, JobId, JobStatus, JobUpdate, UploadedFile};
use vsync_store::JobStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress_reporter::ProgressReporter;

/// Everything needed to run one export.
#[derive(Debug)]
pub struct ExportRequest {
    pub job_id: JobId,
    pub video: UploadedFile,
    pub audio: UploadedFile,
    pub params: ExportParams,
}

/// Uploads written to a per-job scratch directory.
struct Scratch {
    dir: TempDir,
    video: PathBuf,
    audio: PathBuf,
}

/// Runs export jobs in the background.
#[derive(Clone)]
pub struct ExportWorker {
    config: Arc<WorkerConfig>,
    store: Arc<dyn JobStore>,
}

impl ExportWorker {
    pub fn new(config: WorkerConfig, store: Arc<dyn JobStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run an export in a background task.
    ///
    /// The returned handle belongs to a supervisor that waits on the export
    /// task and records a panic as a terminal job error.
    pub fn spawn(&self, request: ExportRequest) -> JoinHandle<()> {
        let job_id = request.job_id.clone();
        let worker = self.clone();
        let task = tokio::spawn(async move { worker.execute(request).await });

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let Err(join_err) = task.await else {
                return;
            };
            error!(job_id = %job_id, "Export task aborted: {}", join_err);

            let err = WorkerError::Aborted;
            metrics::record_export_failed(err.reason());
            if let Err(e) = store.update(&job_id, err.to_update()).await {
                warn!(job_id = %job_id, "Could not record aborted export: {}", e);
            }
        })
    }

    /// Run an export to a terminal state.
    ///
    /// Failures are recorded on the job rather than returned.
    pub async fn execute(&self, request: ExportRequest) {
        let logger = JobLogger::new(&request.job_id, request.video.filename());
        let span = logger.create_span();

        async move {
            let job_id = request.job_id.clone();
            let started = Instant::now();
            metrics::record_export_started();
            logger.log_start(
                request.params.offset,
                request.params.crossfade,
                request.params.clip_video,
            );

            let err = match self.run(request, &logger).await {
                Ok(output_path) => match self.store.update(&job_id, JobUpdate::complete(output_path.clone())).await {
                    Ok(_) => {
                        metrics::record_export_completed();
                        logger.log_completion(started.elapsed().as_secs_f64());
                        return;
                    }
                    Err(e) => {
                        // Nobody can download an export whose job is gone
                        if let Some(dir) = output_path.parent() {
                            remove_dir_quietly(dir).await;
                        }
                        WorkerError::from(e)
                    }
                },
                Err(e) => e,
            };

            logger.log_failure(&err);
            metrics::record_export_failed(err.reason());
            if let Err(e) = self.store.update(&job_id, err.to_update()).await {
                warn!(job_id = %job_id, "Could not record export failure: {}", e);
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: ExportRequest, logger: &JobLogger) -> WorkerResult<PathBuf> {
        let ExportRequest {
            job_id,
            video,
            audio,
            params,
        } = request;
        let filename = video.filename().to_string();

        self.advance(&job_id, logger, JobStatus::Uploading, 10, "Saving uploaded files...")
            .await?;
        let scratch = self.save_uploads(video, audio).await?;

        self.advance(&job_id, logger, JobStatus::Analyzing, 20, "Analyzing video metadata...")
            .await?;
        let probe = probe_media(
            &self.config.ffprobe_path,
            &scratch.video,
            self.config.probe_timeout,
        )
        .await;
        if probe.duration_secs <= 0.0 {
            logger.log_warning("video duration unknown, progress will not be estimated");
        }

        self.advance(&job_id, logger, JobStatus::Processing, 50, "Processing with FFmpeg...")
            .await?;
        let options = SyncOptions {
            offset: params.offset,
            crossfade: params.crossfade,
            clip_video: params.clip_video,
            video_has_audio: probe.has_audio,
        };
        let expected_secs = if options.trims_video() {
            (probe.duration_secs - options.offset).max(0.0)
        } else {
            probe.duration_secs
        };

        let output = scratch.dir.path().join("output.mp4");
        self.transcode(&job_id, &scratch, &output, &options, expected_secs)
            .await?;

        if !fs::try_exists(&output).await.unwrap_or(false) {
            return Err(WorkerError::OutputMissing);
        }

        self.finalize(&output, &filename).await
    }

    async fn advance(
        &self,
        job_id: &JobId,
        logger: &JobLogger,
        status: JobStatus,
        progress: u8,
        message: &str,
    ) -> WorkerResult<()> {
        logger.log_stage(status, message);
        self.store
            .update(job_id, JobUpdate::stage(status, progress, message))
            .await?;
        Ok(())
    }

    async fn save_uploads(&self, video: UploadedFile, audio: UploadedFile) -> WorkerResult<Scratch> {
        fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(WorkerError::save_uploads)?;
        let dir = tempfile::Builder::new()
            .prefix("videosync_")
            .tempdir_in(&self.config.work_dir)
            .map_err(WorkerError::save_uploads)?;

        let video_path = dir.path().join(format!("input_video{}", video.extension()));
        let audio_path = dir.path().join(format!("input_audio{}", audio.extension()));

        fs::write(&video_path, video.data())
            .await
            .map_err(WorkerError::save_uploads)?;
        fs::write(&audio_path, audio.data())
            .await
            .map_err(WorkerError::save_uploads)?;

        Ok(Scratch {
            dir,
            video: video_path,
            audio: audio_path,
        })
    }

    async fn transcode(
        &self,
        job_id: &JobId,
        scratch: &Scratch,
        output: &Path,
        options: &SyncOptions,
        expected_secs: f64,
    ) -> WorkerResult<()> {
        let command = build_sync_command(&scratch.video, &scratch.audio, output, options);
        let runner = FfmpegRunner::new()
            .with_binary(&self.config.ffmpeg_path)
            .with_timeout(self.config.ffmpeg_timeout.as_secs());

        let store = self.store.as_ref();
        let pacing = self.config.progress_pacing;
        let started = Instant::now();

        let result = runner
            .run_with_stderr(&command, |stderr| {
                ProgressReporter::new(store, job_id, expected_secs, pacing).run(stderr)
            })
            .await;

        metrics::record_ffmpeg_duration(started.elapsed().as_secs_f64(), result.is_ok());
        result
            .map(|_| ())
            .map_err(|e| WorkerError::from_ffmpeg(e, self.config.ffmpeg_timeout))
    }

    /// Move the finished file into its own directory under the output root.
    async fn finalize(&self, output: &Path, filename: &str) -> WorkerResult<PathBuf> {
        fs::create_dir_all(&self.config.output_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix("export_")
            .tempdir_in(&self.config.output_dir)?
            .keep();

        let destination = dir.join(format!("synced_{}", filename));
        if let Err(e) = move_file(output, &destination).await {
            remove_dir_quietly(&dir).await;
            return Err(e.into());
        }
        Ok(destination)
    }
}
