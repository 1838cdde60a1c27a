//! Broker wire payloads.
//!
//! Field names are part of the wire contract shared with the upload
//! handler and must not be renamed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest broker priority accepted by the video upload queue.
pub const MAX_PRIORITY: u8 = 10;

/// Job descriptor published by the upload handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProcessingMessage {
    /// Video record ID
    pub video_id: String,
    /// Owner of the video
    pub user_id: String,
    /// Original upload filename
    pub filename: String,
    /// Object key in the raw bucket
    pub storage_path: String,
    /// Broker priority (0-10)
    #[serde(default)]
    pub priority: i32,
}

impl VideoProcessingMessage {
    pub fn new(
        video_id: impl Into<String>,
        user_id: impl Into<String>,
        filename: impl Into<String>,
        storage_path: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            user_id: user_id.into(),
            filename: filename.into(),
            storage_path: storage_path.into(),
            priority: 0,
        }
    }

    /// Set the broker priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Priority clamped to the range the queue was declared with.
    pub fn broker_priority(&self) -> u8 {
        self.priority.clamp(0, MAX_PRIORITY as i32) as u8
    }
}

/// Notification event type.
///
/// Unknown types are preserved verbatim so ad-hoc events round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    VideoCompleted,
    VideoFailed,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::VideoCompleted => "video_completed",
            NotificationKind::VideoFailed => "video_failed",
            NotificationKind::Other(kind) => kind,
        }
    }

    /// Whether this kind refers to a pipeline outcome for a specific video.
    pub fn is_pipeline_outcome(&self) -> bool {
        matches!(
            self,
            NotificationKind::VideoCompleted | NotificationKind::VideoFailed
        )
    }
}

impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "video_completed" => NotificationKind::VideoCompleted,
            "video_failed" => NotificationKind::VideoFailed,
            _ => NotificationKind::Other(value),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Other(kind) => kind,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification job published once per terminal pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub user_id: String,
    #[serde(default)]
    pub video_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
}

impl NotificationMessage {
    /// Notification for a successfully processed video.
    pub fn video_completed(
        user_id: impl Into<String>,
        video_id: impl Into<String>,
        frame_count: usize,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            video_id: video_id.into(),
            kind: NotificationKind::VideoCompleted,
            subject: "Video Processing Completed".to_string(),
            message: format!(
                "Your video has been processed successfully. {} frames extracted.",
                frame_count
            ),
        }
    }

    /// Notification for a video whose processing failed.
    pub fn video_failed(
        user_id: impl Into<String>,
        video_id: impl Into<String>,
        reason: &str,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            video_id: video_id.into(),
            kind: NotificationKind::VideoFailed,
            subject: "Video Processing Failed".to_string(),
            message: format!("Failed to process your video: {}", reason),
        }
    }

    /// Whether the message references a video.
    pub fn has_video(&self) -> bool {
        !self.video_id.trim().is_empty()
    }
}
