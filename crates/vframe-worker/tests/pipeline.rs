//! Pipeline behaviour against in-memory collaborators.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vframe_clients::{ClientError, ClientResult, VideoService};
use vframe_db::MemoryStore;
use vframe_media::{FrameExtractor, MediaError, MediaResult};
use vframe_models::{JobStatus, NotificationKind, Video, VideoProcessingMessage, VideoStatus};
use vframe_queue::{
    Disposition, FailureClass, InMemoryBroker, JobHandler, PoolConfig, Settled, WorkerPool,
};
use vframe_storage::{ObjectStore, StorageError, StorageResult};
use vframe_worker::{PipelineDeps, PipelineStage, ProcessingError, VideoProcessor, WorkerConfig};

#[derive(Default)]
struct FakeVideos {
    missing: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeVideos {
    fn missing() -> Self {
        Self {
            missing: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VideoService for FakeVideos {
    async fn get_video(&self, video_id: &str) -> ClientResult<Video> {
        self.record(format!("get:{}", video_id));
        if self.missing {
            return Err(ClientError::not_found("video", video_id));
        }
        Ok(Video::new(video_id, "u1"))
    }

    async fn update_status(
        &self,
        video_id: &str,
        status: VideoStatus,
        _error_message: Option<&str>,
    ) -> ClientResult<()> {
        self.record(format!("status:{}:{}", video_id, status.as_str()));
        Ok(())
    }

    async fn complete_video(
        &self,
        video_id: &str,
        _zip_path: &str,
        _zip_size_bytes: u64,
        frame_count: usize,
    ) -> ClientResult<()> {
        self.record(format!("complete:{}:{}", video_id, frame_count));
        Ok(())
    }

    async fn fail_video(&self, video_id: &str, error_message: &str) -> ClientResult<()> {
        self.record(format!("fail:{}:{}", video_id, error_message));
        Ok(())
    }
}

/// Serves a fixed body for every key and keeps uploaded archives in memory.
#[derive(Default)]
struct FakeStorage {
    failing_downloads: AtomicUsize,
    failing_uploads: AtomicBool,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeStorage {
    fn failing_first(n: usize) -> Self {
        Self {
            failing_downloads: AtomicUsize::new(n),
            ..Default::default()
        }
    }

    fn rejecting_uploads() -> Self {
        Self {
            failing_uploads: AtomicBool::new(true),
            ..Default::default()
        }
    }

    fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStorage {
    async fn download_raw(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        let remaining = self.failing_downloads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_downloads.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::download_failed(format!("{}: connection reset", key)));
        }
        let body = b"not really a video";
        tokio::fs::write(dest, body).await?;
        Ok(body.len() as u64)
    }

    async fn upload_processed(&self, path: &Path, name: &str, _size: u64) -> StorageResult<String> {
        if self.failing_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed(format!("{}: access denied", name)));
        }
        let bytes = tokio::fs::read(path).await?;
        let key = format!("2024/01/02/{}", name);
        self.uploads.lock().unwrap().push((key.clone(), bytes));
        Ok(key)
    }
}

enum Extraction {
    Frames(usize),
    ToolFailure,
    Empty,
}

struct FakeExtractor {
    behaviour: Extraction,
}

impl FakeExtractor {
    fn frames(n: usize) -> Self {
        Self {
            behaviour: Extraction::Frames(n),
        }
    }
}

#[async_trait]
impl FrameExtractor for FakeExtractor {
    async fn extract_frames(
        &self,
        input: &Path,
        output_dir: &Path,
        _fps: f64,
    ) -> MediaResult<Vec<PathBuf>> {
        assert!(input.exists(), "input should be downloaded before extraction");
        match self.behaviour {
            Extraction::Frames(n) => {
                tokio::fs::create_dir_all(output_dir).await?;
                let mut frames = Vec::new();
                for i in 1..=n {
                    let path = output_dir.join(format!("frame_{:04}.png", i));
                    tokio::fs::write(&path, format!("png-{}", i)).await?;
                    frames.push(path);
                }
                Ok(frames)
            }
            Extraction::ToolFailure => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with exit status: 1",
                Some("moov atom not found".to_string()),
                Some(1),
            )),
            Extraction::Empty => Err(MediaError::NoFrames),
        }
    }
}

struct Harness {
    processor: Arc<VideoProcessor>,
    videos: Arc<FakeVideos>,
    storage: Arc<FakeStorage>,
    db: MemoryStore,
    broker: InMemoryBroker,
    work_dir: tempfile::TempDir,
}

fn harness(videos: FakeVideos, storage: FakeStorage, extractor: FakeExtractor) -> Harness {
    let work_dir = tempfile::tempdir().unwrap();
    let videos = Arc::new(videos);
    let storage = Arc::new(storage);
    let db = MemoryStore::new();
    let broker = InMemoryBroker::new();

    let config = WorkerConfig {
        work_dir: work_dir.path().to_path_buf(),
        ..WorkerConfig::default()
    };
    let deps = PipelineDeps {
        videos: videos.clone(),
        storage: storage.clone(),
        extractor: Arc::new(extractor),
        jobs: Arc::new(db.clone()),
        notifications: Arc::new(broker.clone()),
    };

    Harness {
        processor: Arc::new(VideoProcessor::new(config, deps)),
        videos,
        storage,
        db,
        broker,
        work_dir,
    }
}

fn message() -> VideoProcessingMessage {
    VideoProcessingMessage::new("v1", "u1", "uploads/clip.mp4", "2024/01/02/clip.mp4")
}

fn payload() -> Vec<u8> {
    serde_json::to_vec(&message()).unwrap()
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test]
async fn test_malformed_payload_is_dropped_without_lookups() {
    let h = harness(FakeVideos::default(), FakeStorage::default(), FakeExtractor::frames(1));

    let result = h.processor.handle(0, b"{not json").await;

    assert!(matches!(result, Err(ProcessingError::MalformedPayload(_))));
    assert_eq!(Disposition::for_result(&result), Disposition::Drop);
    assert!(h.videos.calls().is_empty());
    assert!(h.db.jobs().is_empty());
    assert!(h.broker.published_notifications().is_empty());
}

#[tokio::test]
async fn test_missing_video_is_dropped_without_notification() {
    let h = harness(FakeVideos::missing(), FakeStorage::default(), FakeExtractor::frames(1));

    let result = h.processor.handle(0, &payload()).await;

    let err = result.as_ref().unwrap_err();
    assert!(matches!(err, ProcessingError::VideoNotFound(id) if id == "v1"));
    assert!(err.is_permanent());
    assert_eq!(Disposition::for_result(&result), Disposition::Drop);
    assert_eq!(h.videos.calls(), vec!["get:v1".to_string()]);
    assert!(h.db.jobs().is_empty());
    assert!(h.broker.published_notifications().is_empty());
}

#[tokio::test]
async fn test_success_completes_job_and_notifies_once() {
    let h = harness(FakeVideos::default(), FakeStorage::default(), FakeExtractor::frames(3));

    let outcome = h.processor.process(2, &message()).await.unwrap();

    assert_eq!(outcome.frame_count, 3);
    assert!(outcome.zip_key.starts_with("2024/01/02/frames_v1_"));
    assert!(outcome.zip_key.ends_with(".zip"));

    let jobs = h.db.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, outcome.job_id);
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].worker_id, "worker-2");
    assert!(jobs[0].completed_at.is_some());
    assert!(jobs[0].duration_seconds.is_some());

    let notifications = h.broker.published_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::VideoCompleted);
    assert_eq!(notifications[0].user_id, "u1");
    assert_eq!(notifications[0].video_id, "v1");
    assert!(notifications[0].message.contains("3 frames"));

    assert_eq!(
        h.videos.calls(),
        vec![
            "get:v1".to_string(),
            "status:v1:processing".to_string(),
            "complete:v1:3".to_string(),
        ]
    );

    let uploads = h.storage.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1.len() as u64, outcome.zip_size_bytes);
    let mut archive = zip::ZipArchive::new(Cursor::new(uploads[0].1.clone())).unwrap();
    assert_eq!(archive.len(), 3);
    assert_eq!(archive.by_index(0).unwrap().name(), "frame_0001.png");
    assert_eq!(archive.by_index(2).unwrap().name(), "frame_0003.png");

    assert!(is_empty_dir(h.work_dir.path()), "job directory should be removed");
}

#[tokio::test]
async fn test_extraction_failure_fails_job_and_requeues() {
    let h = harness(
        FakeVideos::default(),
        FakeStorage::default(),
        FakeExtractor {
            behaviour: Extraction::ToolFailure,
        },
    );

    let result = h.processor.handle(0, &payload()).await;

    assert!(matches!(result, Err(ProcessingError::Extraction(_))));
    assert_eq!(Disposition::for_result(&result), Disposition::Requeue);

    let jobs = h.db.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    let stored = jobs[0].error_message.as_deref().unwrap();
    assert!(stored.starts_with("ffmpeg error"));

    let notifications = h.broker.published_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::VideoFailed);
    assert_eq!(
        notifications[0].message,
        "Failed to process your video: failed to extract frames"
    );

    assert!(h
        .videos
        .calls()
        .contains(&"fail:v1:failed to extract frames".to_string()));
    assert!(h.storage.uploads().is_empty());
    assert!(is_empty_dir(h.work_dir.path()));
}

/// The four failure effects every stage failure must produce.
fn assert_failure_reported(h: &Harness, reason: &str) {
    let jobs = h.db.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0].completed_at.is_some());
    let stored = jobs[0].error_message.as_deref().unwrap();
    assert!(stored.starts_with(reason), "job error was {stored:?}");

    assert!(h.videos.calls().contains(&format!("fail:v1:{}", reason)));

    let notifications = h.broker.published_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::VideoFailed);
    assert_eq!(notifications[0].user_id, "u1");
    assert_eq!(
        notifications[0].message,
        format!("Failed to process your video: {}", reason)
    );

    assert!(is_empty_dir(h.work_dir.path()));
}

#[tokio::test]
async fn test_download_failure_fails_job_and_requeues() {
    let h = harness(
        FakeVideos::default(),
        FakeStorage::failing_first(1),
        FakeExtractor::frames(2),
    );

    let result = h.processor.handle(0, &payload()).await;

    let err = result.as_ref().unwrap_err();
    assert!(matches!(err, ProcessingError::Download(_)));
    assert_eq!(err.stage(), PipelineStage::Downloading);
    assert_eq!(Disposition::for_result(&result), Disposition::Requeue);

    assert_failure_reported(&h, "failed to download video");
    let stored = h.db.jobs()[0].error_message.clone().unwrap();
    assert!(stored.contains("connection reset"), "storage detail stays in the job row");
    assert!(h.storage.uploads().is_empty());
}

#[tokio::test]
async fn test_upload_failure_fails_job_and_requeues() {
    let h = harness(
        FakeVideos::default(),
        FakeStorage::rejecting_uploads(),
        FakeExtractor::frames(2),
    );

    let result = h.processor.handle(0, &payload()).await;

    let err = result.as_ref().unwrap_err();
    assert!(matches!(err, ProcessingError::Upload(_)));
    assert_eq!(err.stage(), PipelineStage::Uploading);
    assert_eq!(Disposition::for_result(&result), Disposition::Requeue);

    assert_failure_reported(&h, "failed to upload zip");
    assert!(!h
        .videos
        .calls()
        .iter()
        .any(|call| call.starts_with("complete:")));
}

#[tokio::test]
async fn test_unsafe_video_id_is_dropped_before_touching_disk() {
    let h = harness(FakeVideos::default(), FakeStorage::default(), FakeExtractor::frames(1));
    let msg = VideoProcessingMessage::new("../../escape", "u1", "clip.mp4", "2024/01/02/clip.mp4");

    let result = h
        .processor
        .handle(0, &serde_json::to_vec(&msg).unwrap())
        .await;

    assert!(matches!(result, Err(ProcessingError::InvalidVideoId(ref id)) if id == "../../escape"));
    assert_eq!(Disposition::for_result(&result), Disposition::Drop);
    assert!(h.videos.calls().is_empty());
    assert!(h.db.jobs().is_empty());
    assert!(h.broker.published_notifications().is_empty());
    assert!(is_empty_dir(h.work_dir.path()));
}

#[tokio::test]
async fn test_zero_frames_is_a_requeued_failure() {
    let h = harness(
        FakeVideos::default(),
        FakeStorage::default(),
        FakeExtractor {
            behaviour: Extraction::Empty,
        },
    );

    let result = h.processor.handle(0, &payload()).await;

    assert!(matches!(result, Err(ProcessingError::NoFrames)));
    assert_eq!(Disposition::for_result(&result), Disposition::Requeue);
    assert_eq!(h.db.jobs()[0].status, JobStatus::Failed);

    let notifications = h.broker.published_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0].message,
        "Failed to process your video: no frames extracted"
    );
}

#[tokio::test]
async fn test_side_effect_failures_do_not_change_outcome() {
    let h = harness(FakeVideos::default(), FakeStorage::default(), FakeExtractor::frames(2));
    h.db.set_unavailable(true);
    h.broker.fail_publishes(true);

    let outcome = h.processor.process(0, &message()).await.unwrap();

    assert_eq!(outcome.frame_count, 2);
    assert!(h.db.jobs().is_empty());
    assert!(h.broker.published_notifications().is_empty());
    assert_eq!(h.storage.uploads().len(), 1);
}

#[tokio::test]
async fn test_redelivery_after_transient_failure_completes_once() {
    let h = harness(
        FakeVideos::default(),
        FakeStorage::failing_first(1),
        FakeExtractor::frames(2),
    );
    let source = InMemoryBroker::new();
    let id = source.push(payload());

    let config = PoolConfig::new("video-processing", 1).with_shutdown_timeout(Duration::from_secs(5));
    let pool = WorkerPool::spawn(config, Arc::new(source.clone()), h.processor.clone());

    tokio::time::timeout(Duration::from_secs(10), source.wait_settled(2))
        .await
        .expect("both deliveries should settle");
    pool.shutdown().await;

    assert_eq!(
        source.settlements_for(id),
        vec![Settled::Nacked { requeue: true }, Settled::Acked]
    );

    let jobs = h.db.jobs();
    assert_eq!(jobs.len(), 2, "one row per attempt");
    assert_ne!(jobs[0].id, jobs[1].id);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert_eq!(jobs[1].status, JobStatus::Completed);
    assert_eq!(
        jobs.iter().filter(|j| j.status == JobStatus::Completed).count(),
        1
    );

    let kinds: Vec<_> = h
        .broker
        .published_notifications()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![NotificationKind::VideoFailed, NotificationKind::VideoCompleted]
    );
}
