//! End-to-end export pipeline tests against fake FFmpeg/FFprobe scripts.

#![cfg(unix)]

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{arg_after, args_after, FakeTools, FfmpegBehavior, FfprobeBehavior};
use tempfile::TempDir;
use vsync_models::{ExportJob, ExportParams, JobId, JobStatus, JobUpdate, UploadedFile};
use vsync_store::{InMemoryJobStore, JobStore, StoreResult};
use vsync_worker::{ExportRequest, ExportWorker, WorkerConfig};

/// Job store that remembers every update it was asked to apply.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryJobStore,
    updates: Mutex<Vec<JobUpdate>>,
}

impl RecordingStore {
    fn updates(&self) -> Vec<JobUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn create(&self, job: ExportJob) -> StoreResult<()> {
        self.inner.create(job).await
    }

    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<ExportJob> {
        self.updates.lock().unwrap().push(update.clone());
        self.inner.update(id, update).await
    }

    async fn get(&self, id: &JobId) -> StoreResult<ExportJob> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &JobId) -> StoreResult<()> {
        self.inner.delete(id).await
    }

    async fn take(&self, id: &JobId) -> StoreResult<ExportJob> {
        self.inner.take(id).await
    }

    async fn list(&self) -> StoreResult<Vec<ExportJob>> {
        self.inner.list().await
    }
}

struct Harness {
    root: TempDir,
    tools: FakeTools,
    store: Arc<RecordingStore>,
    worker: ExportWorker,
}

impl Harness {
    fn new(ffmpeg: FfmpegBehavior, ffprobe: FfprobeBehavior) -> Self {
        Self::with_timeout(ffmpeg, ffprobe, Duration::from_secs(30))
    }

    fn with_timeout(ffmpeg: FfmpegBehavior, ffprobe: FfprobeBehavior, timeout: Duration) -> Self {
        let root = tempfile::tempdir().unwrap();
        let tools = FakeTools::install(root.path(), ffmpeg, ffprobe);
        let config = WorkerConfig {
            ffmpeg_path: tools.ffmpeg.clone(),
            ffprobe_path: tools.ffprobe.clone(),
            ffmpeg_timeout: timeout,
            progress_pacing: Duration::ZERO,
            ..WorkerConfig::default().with_root(root.path())
        };
        let store = Arc::new(RecordingStore::default());
        let worker = ExportWorker::new(config, store.clone());
        Self {
            root,
            tools,
            store,
            worker,
        }
    }

    async fn run(&self, params: ExportParams) -> ExportJob {
        let job = ExportJob::new(JobId::new(), "clip.mp4");
        let id = job.id.clone();
        self.store.create(job).await.unwrap();

        let request = ExportRequest {
            job_id: id.clone(),
            video: UploadedFile::new(Some("clip.mp4"), b"video bytes".to_vec()),
            audio: UploadedFile::new(Some("voice.wav"), b"audio bytes".to_vec()),
            params,
        };
        self.worker.spawn(request).await.unwrap();
        self.store.get(&id).await.unwrap()
    }

    fn scratch_entries(&self) -> usize {
        count_entries(&self.root.path().join("work"))
    }

    fn output_entries(&self) -> usize {
        count_entries(&self.root.path().join("exports"))
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

fn params(offset: f64, crossfade: f64, clip_video: bool) -> ExportParams {
    ExportParams {
        offset,
        crossfade,
        clip_video,
    }
}

#[tokio::test]
async fn test_passthrough_export_completes() {
    let h = Harness::new(
        FfmpegBehavior::Succeed { secs: 60 },
        FfprobeBehavior::Report {
            duration: 60.0,
            has_audio: true,
        },
    );

    let job = h.run(params(0.0, 100.0, false)).await;

    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.progress, 100);
    assert_eq!(job.message, "Export complete! Ready for download.");

    let output = job.output_path.unwrap();
    assert_eq!(output.file_name().unwrap(), "synced_clip.mp4");
    assert!(output.starts_with(h.root.path().join("exports")));
    assert_eq!(std::fs::read(&output).unwrap(), b"fake mp4");
    assert_eq!(h.scratch_entries(), 0);

    let args = h.tools.ffmpeg_args();
    assert!(!args.contains(&"-filter_complex".to_string()));
    assert_eq!(args_after(&args, "-map"), vec!["0:v", "1:a"]);
    assert_eq!(arg_after(&args, "-c:v"), Some("copy"));

    let statuses: Vec<_> = h.store.updates().iter().filter_map(|u| u.status).collect();
    assert_eq!(
        statuses,
        vec![
            JobStatus::Uploading,
            JobStatus::Analyzing,
            JobStatus::Processing,
            JobStatus::Complete
        ]
    );
}

#[tokio::test]
async fn test_clip_mode_mix_reencodes_video() {
    let h = Harness::new(
        FfmpegBehavior::Succeed { secs: 58 },
        FfprobeBehavior::Report {
            duration: 60.0,
            has_audio: true,
        },
    );

    let job = h.run(params(2.0, 50.0, true)).await;
    assert_eq!(job.status, JobStatus::Complete);

    let args = h.tools.ffmpeg_args();
    assert_eq!(
        arg_after(&args, "-filter_complex"),
        Some(
            "[0:v]trim=start=2[video_trimmed];\
             [1:a]adelay=2000|2000[audio_delayed];\
             [0:a]atrim=start=2,volume=0.5[orig_audio];\
             [audio_delayed]volume=0.5[clean_audio];\
             [orig_audio][clean_audio]amix=inputs=2[final_audio]"
        )
    );
    assert_eq!(args_after(&args, "-map"), vec!["[video_trimmed]", "[final_audio]"]);
    assert_eq!(arg_after(&args, "-c:v"), Some("libx264"));
}

#[tokio::test]
async fn test_ffmpeg_failure_freezes_progress() {
    let h = Harness::new(
        FfmpegBehavior::Fail { secs: 30 },
        FfprobeBehavior::Report {
            duration: 60.0,
            has_audio: true,
        },
    );

    let job = h.run(params(0.0, 100.0, false)).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("FFmpeg processing failed"));
    assert_eq!(job.message, "Processing failed");
    // 30s of 60s lands at 50 + 22.5
    assert_eq!(job.progress, 72);
    assert!(job.output_path.is_none());
    assert_eq!(h.scratch_entries(), 0);
    assert_eq!(h.output_entries(), 0);
}

#[tokio::test]
async fn test_probe_crash_still_completes_without_estimates() {
    let h = Harness::new(
        FfmpegBehavior::Succeed { secs: 40 },
        FfprobeBehavior::Crash,
    );

    let job = h.run(params(0.0, 50.0, false)).await;
    assert_eq!(job.status, JobStatus::Complete);

    let processing: Vec<_> = h
        .store
        .updates()
        .into_iter()
        .filter(|u| u.status.is_none())
        .collect();
    assert!(!processing.is_empty());
    for update in processing {
        assert_eq!(update.progress, None);
        let message = update.message.unwrap();
        assert!(message.contains("s encoded"), "{}", message);
        assert!(!message.contains(" / "), "{}", message);
    }

    // Without a detected audio track the replacement audio is used as-is
    let args = h.tools.ffmpeg_args();
    assert!(!args.contains(&"-filter_complex".to_string()));
}

#[tokio::test]
async fn test_missing_output_is_an_error() {
    let h = Harness::new(
        FfmpegBehavior::NoOutput,
        FfprobeBehavior::Report {
            duration: 10.0,
            has_audio: false,
        },
    );

    let job = h.run(ExportParams::default()).await;
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("Output file was not created"));
    assert_eq!(job.message, "Export failed");
    assert_eq!(h.output_entries(), 0);
}

#[tokio::test]
async fn test_hung_ffmpeg_times_out() {
    let h = Harness::with_timeout(
        FfmpegBehavior::Hang,
        FfprobeBehavior::Report {
            duration: 10.0,
            has_audio: true,
        },
        Duration::from_secs(1),
    );

    let job = h.run(ExportParams::default()).await;
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("Processing timeout (1 second)"));
    assert_eq!(job.message, "Export timed out");
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_progress_never_decreases() {
    let h = Harness::new(
        FfmpegBehavior::Succeed { secs: 60 },
        FfprobeBehavior::Report {
            duration: 60.0,
            has_audio: true,
        },
    );

    let job = h.run(params(0.0, 100.0, false)).await;
    assert_eq!(job.status, JobStatus::Complete);

    let percents: Vec<u8> = h.store.updates().iter().filter_map(|u| u.progress).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    assert!(percents.iter().all(|p| *p <= 100));
    assert_eq!(percents.last(), Some(&100));
}
