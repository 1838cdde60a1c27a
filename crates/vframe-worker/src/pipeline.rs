//! Video processing pipeline.
//!
//! Stages run strictly in order:
//! `received -> downloading -> extracting -> archiving -> uploading -> notifying -> done`.
//! Any error after the video lookup moves the job to `failed`, records the
//! error on the job row, reports the failure upstream and publishes a
//! `video_failed` notification before the error is returned for requeue.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tracing::Instrument;

use vframe_clients::VideoService;
use vframe_db::ProcessingJobStore;
use vframe_media::{archive_name, create_archive, FrameExtractor, MediaError};
use vframe_models::{NotificationMessage, ProcessingJob, VideoProcessingMessage, VideoStatus};
use vframe_queue::{metrics, JobHandler, NotificationPublisher};
use vframe_storage::ObjectStore;

use crate::config::WorkerConfig;
use crate::error::{ProcessingError, ProcessingResult};
use crate::logging::JobLogger;

const FRAMES_DIR: &str = "frames";
const FALLBACK_INPUT_NAME: &str = "input";
/// Matches the width of the `video_id` columns.
const MAX_VIDEO_ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Received,
    Downloading,
    Extracting,
    Archiving,
    Uploading,
    Notifying,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Downloading => "downloading",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Archiving => "archiving",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Notifying => "notifying",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators the pipeline talks to.
#[derive(Clone)]
pub struct PipelineDeps {
    pub videos: Arc<dyn VideoService>,
    pub storage: Arc<dyn ObjectStore>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub jobs: Arc<dyn ProcessingJobStore>,
    pub notifications: Arc<dyn NotificationPublisher>,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub job_id: String,
    pub zip_key: String,
    pub zip_size_bytes: u64,
    pub frame_count: usize,
}

struct Artifacts {
    zip_key: String,
    zip_size_bytes: u64,
    frame_count: usize,
}

/// Runs the pipeline for one job at a time per worker.
pub struct VideoProcessor {
    config: WorkerConfig,
    deps: PipelineDeps,
}

impl VideoProcessor {
    pub fn new(config: WorkerConfig, deps: PipelineDeps) -> Self {
        Self { config, deps }
    }

    /// Process one decoded job.
    pub async fn process(
        &self,
        worker_id: usize,
        msg: &VideoProcessingMessage,
    ) -> ProcessingResult<PipelineOutcome> {
        // The id names the job directory and the archive.
        if !is_valid_video_id(&msg.video_id) {
            return Err(ProcessingError::InvalidVideoId(msg.video_id.clone()));
        }

        let logger = JobLogger::new(&msg.video_id, worker_id);
        let span = logger.create_span();
        self.run(&logger, worker_id, msg).instrument(span).await
    }

    async fn run(
        &self,
        logger: &JobLogger,
        worker_id: usize,
        msg: &VideoProcessingMessage,
    ) -> ProcessingResult<PipelineOutcome> {
        let started = Instant::now();
        logger.log_start(&msg.filename);

        let video = self
            .deps
            .videos
            .get_video(&msg.video_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ProcessingError::VideoNotFound(msg.video_id.clone())
                } else {
                    ProcessingError::VideoLookup(e)
                }
            })?;

        if let Err(e) = self
            .deps
            .videos
            .update_status(&video.id, VideoStatus::Processing, None)
            .await
        {
            logger.log_side_effect_failed("update_status", &e);
        }

        let mut job = ProcessingJob::start(&msg.video_id, &msg.user_id, format!("worker-{}", worker_id));
        if let Err(e) = self.deps.jobs.create_job(&job).await {
            logger.log_side_effect_failed("create_job", &e);
        }

        // The directory is removed when `workspace` drops, on every exit path.
        let workspace = self.workspace(&msg.video_id).await;
        let result = match &workspace {
            Ok(dir) => self.run_stages(logger, msg, dir.path()).await,
            Err(e) => Err(ProcessingError::Workspace(std::io::Error::new(
                e.kind(),
                e.to_string(),
            ))),
        };

        logger.log_stage(PipelineStage::Notifying);
        match result {
            Ok(artifacts) => {
                if let Err(e) = self
                    .deps
                    .videos
                    .complete_video(
                        &msg.video_id,
                        &artifacts.zip_key,
                        artifacts.zip_size_bytes,
                        artifacts.frame_count,
                    )
                    .await
                {
                    logger.log_side_effect_failed("complete_video", &e);
                }

                job.complete();
                if let Err(e) = self.deps.jobs.update_job(&job).await {
                    logger.log_side_effect_failed("update_job", &e);
                }

                let notification = NotificationMessage::video_completed(
                    &msg.user_id,
                    &msg.video_id,
                    artifacts.frame_count,
                );
                if let Err(e) = self.deps.notifications.publish_notification(&notification).await {
                    logger.log_side_effect_failed("publish_notification", &e);
                }

                metrics::record_pipeline("completed", started.elapsed(), artifacts.frame_count);
                logger.log_completion(artifacts.frame_count, artifacts.zip_size_bytes);
                logger.log_stage(PipelineStage::Done);

                Ok(PipelineOutcome {
                    job_id: job.id,
                    zip_key: artifacts.zip_key,
                    zip_size_bytes: artifacts.zip_size_bytes,
                    frame_count: artifacts.frame_count,
                })
            }
            Err(err) => {
                logger.log_failure(err.stage(), &err);
                self.report_failure(logger, &mut job, msg, &err).await;
                metrics::record_pipeline("failed", started.elapsed(), 0);
                logger.log_stage(PipelineStage::Failed);
                Err(err)
            }
        }
    }

    async fn workspace(&self, video_id: &str) -> std::io::Result<TempDir> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        tempfile::Builder::new()
            .prefix(&format!("{}-", video_id))
            .tempdir_in(&self.config.work_dir)
    }

    async fn run_stages(
        &self,
        logger: &JobLogger,
        msg: &VideoProcessingMessage,
        dir: &Path,
    ) -> ProcessingResult<Artifacts> {
        logger.log_stage(PipelineStage::Downloading);
        let input = dir.join(local_file_name(&msg.filename));
        self.deps
            .storage
            .download_raw(&msg.storage_path, &input)
            .await
            .map_err(ProcessingError::Download)?;

        logger.log_stage(PipelineStage::Extracting);
        let frames = self
            .deps
            .extractor
            .extract_frames(&input, &dir.join(FRAMES_DIR), self.config.fps)
            .await
            .map_err(|e| match e {
                MediaError::NoFrames => ProcessingError::NoFrames,
                other => ProcessingError::Extraction(other),
            })?;
        if frames.is_empty() {
            return Err(ProcessingError::NoFrames);
        }
        let frame_count = frames.len();

        logger.log_stage(PipelineStage::Archiving);
        let name = archive_name(&msg.video_id, Utc::now());
        let summary = create_archive(frames, dir.join(&name))
            .await
            .map_err(ProcessingError::Archive)?;

        logger.log_stage(PipelineStage::Uploading);
        let zip_key = self
            .deps
            .storage
            .upload_processed(&summary.path, &name, summary.size_bytes)
            .await
            .map_err(ProcessingError::Upload)?;

        Ok(Artifacts {
            zip_key,
            zip_size_bytes: summary.size_bytes,
            frame_count,
        })
    }

    async fn report_failure(
        &self,
        logger: &JobLogger,
        job: &mut ProcessingJob,
        msg: &VideoProcessingMessage,
        err: &ProcessingError,
    ) {
        job.fail(err.to_string());
        if let Err(e) = self.deps.jobs.update_job(job).await {
            logger.log_side_effect_failed("update_job", &e);
        }

        let reason = err.user_message();
        if let Err(e) = self.deps.videos.fail_video(&msg.video_id, reason).await {
            logger.log_side_effect_failed("fail_video", &e);
        }

        let notification = NotificationMessage::video_failed(&msg.user_id, &msg.video_id, reason);
        if let Err(e) = self.deps.notifications.publish_notification(&notification).await {
            logger.log_side_effect_failed("publish_notification", &e);
        }
    }
}

#[async_trait]
impl JobHandler for VideoProcessor {
    type Error = ProcessingError;

    async fn handle(&self, worker_id: usize, payload: &[u8]) -> Result<(), ProcessingError> {
        let msg: VideoProcessingMessage = serde_json::from_slice(payload)?;
        self.process(worker_id, &msg).await?;
        Ok(())
    }
}

/// Ids are limited to ASCII letters, digits, `-` and `_` (UUIDs and the like).
fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Base name of the uploaded file, without any directory components.
fn local_file_name(filename: &str) -> PathBuf {
    Path::new(filename)
        .file_name()
        .filter(|name| !name.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_INPUT_NAME))
}
