//! Shared data models for the vframe pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Broker wire payloads (video processing and notification jobs)
//! - Persistent processing-job and notification records
//! - Video and user records owned by external services
//! - Human-readable size/duration formatting used in notification text

pub mod format;
pub mod job;
pub mod message;
pub mod notification;
pub mod video;

// Re-export common types
pub use format::{format_bytes, format_duration};
pub use job::{JobStatus, ProcessingJob};
pub use message::{NotificationKind, NotificationMessage, VideoProcessingMessage, MAX_PRIORITY};
pub use notification::{Notification, NotificationStatus};
pub use video::{User, Video, VideoStatus};
