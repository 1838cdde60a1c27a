//! Structured job logging utilities.

use tracing::{error, info, warn, Span};

use crate::pipeline::PipelineStage;

/// Logs pipeline lifecycle events with the video and worker attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    video_id: String,
    worker_id: usize,
}

impl JobLogger {
    pub fn new(video_id: &str, worker_id: usize) -> Self {
        Self {
            video_id: video_id.to_string(),
            worker_id,
        }
    }

    pub fn log_start(&self, filename: &str) {
        info!(
            video_id = %self.video_id,
            worker_id = self.worker_id,
            filename,
            "Processing video"
        );
    }

    pub fn log_stage(&self, stage: PipelineStage) {
        info!(
            video_id = %self.video_id,
            worker_id = self.worker_id,
            stage = %stage,
            "Pipeline stage"
        );
    }

    /// A best-effort side call failed; processing continues.
    pub fn log_side_effect_failed(&self, action: &str, error: &dyn std::fmt::Display) {
        warn!(
            video_id = %self.video_id,
            worker_id = self.worker_id,
            action,
            error = %error,
            "Best-effort call failed"
        );
    }

    pub fn log_failure(&self, stage: PipelineStage, error: &dyn std::fmt::Display) {
        error!(
            video_id = %self.video_id,
            worker_id = self.worker_id,
            stage = %stage,
            error = %error,
            "Processing failed"
        );
    }

    pub fn log_completion(&self, frames: usize, zip_size_bytes: u64) {
        info!(
            video_id = %self.video_id,
            worker_id = self.worker_id,
            frames,
            zip_size = %vframe_models::format_bytes(zip_size_bytes),
            "Video processed"
        );
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "video_job",
            video_id = %self.video_id,
            worker_id = self.worker_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let logger = JobLogger::new("video-123", 2);
        assert_eq!(logger.video_id(), "video-123");
        assert_eq!(logger.worker_id, 2);
    }
}
