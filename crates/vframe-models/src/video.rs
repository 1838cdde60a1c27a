//! Video and user records owned by external services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Video processing status.
///
/// Lifecycle: `pending -> queued -> processing -> {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Uploaded, not yet queued
    #[default]
    Pending,
    /// Job published to the broker
    Queued,
    /// A worker picked the job up
    Processing,
    /// Frames extracted and archived
    Completed,
    /// Processing failed
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Queued => "queued",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            VideoStatus::Pending => 0,
            VideoStatus::Queued => 1,
            VideoStatus::Processing => 2,
            VideoStatus::Completed | VideoStatus::Failed => 3,
        }
    }

    /// Only forward transitions are valid; terminal states accept none.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Video record as returned by the video-record service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub size_bytes: i64,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub storage_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: i32,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl Video {
    /// Minimal record, mostly useful for tests and fakes.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            filename: String::new(),
            original_name: String::new(),
            size_bytes: 0,
            status: VideoStatus::Pending,
            storage_path: String::new(),
            zip_path: None,
            zip_size_bytes: None,
            frame_count: None,
            error_message: None,
            retry_count: 0,
            priority: 0,
            created_at: None,
            updated_at: None,
            queued_at: None,
            processing_started_at: None,
            processing_completed_at: None,
        }
    }

    /// Wall-clock processing time, when both timestamps are known.
    pub fn processing_duration(&self) -> Option<std::time::Duration> {
        let started = self.processing_started_at?;
        let completed = self.processing_completed_at?;
        (completed - started).to_std().ok()
    }
}

/// User record as returned by the user-record service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_forward_transitions() {
        assert!(VideoStatus::Pending.can_transition_to(VideoStatus::Queued));
        assert!(VideoStatus::Queued.can_transition_to(VideoStatus::Processing));
        assert!(VideoStatus::Processing.can_transition_to(VideoStatus::Completed));
        assert!(VideoStatus::Processing.can_transition_to(VideoStatus::Failed));
        assert!(VideoStatus::Pending.can_transition_to(VideoStatus::Processing));
    }

    #[test]
    fn test_backward_and_terminal_transitions_rejected() {
        assert!(!VideoStatus::Processing.can_transition_to(VideoStatus::Queued));
        assert!(!VideoStatus::Processing.can_transition_to(VideoStatus::Processing));
        assert!(!VideoStatus::Completed.can_transition_to(VideoStatus::Failed));
        assert!(!VideoStatus::Failed.can_transition_to(VideoStatus::Completed));
        assert!(!VideoStatus::Completed.can_transition_to(VideoStatus::Processing));
    }

    #[test]
    fn test_video_deserializes_from_service_payload() {
        let video: Video = serde_json::from_str(
            r#"{
                "id": "v1",
                "user_id": "u1",
                "filename": "clip.mp4",
                "original_name": "Holiday.mp4",
                "size_bytes": 1024,
                "status": "processing",
                "storage_path": "2024/01/01/clip.mp4",
                "retry_count": 0,
                "priority": 5,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(video.status, VideoStatus::Processing);
        assert_eq!(video.original_name, "Holiday.mp4");
        assert!(video.frame_count.is_none());
    }

    #[test]
    fn test_processing_duration_requires_both_timestamps() {
        let mut video = Video::new("v", "u");
        assert!(video.processing_duration().is_none());

        let start = Utc::now();
        video.processing_started_at = Some(start);
        assert!(video.processing_duration().is_none());

        video.processing_completed_at = Some(start + Duration::seconds(150));
        assert_eq!(
            video.processing_duration(),
            Some(std::time::Duration::from_secs(150))
        );
    }
}
