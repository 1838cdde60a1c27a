//! Notification audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::NotificationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persistent record of one delivery attempt.
///
/// Written `pending` before the send and updated afterwards regardless of
/// outcome. This is a best-effort audit trail, not a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub video_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub status: NotificationStatus,
    pub subject: String,
    pub message: String,
    pub recipient: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn pending(
        user_id: impl Into<String>,
        video_id: Option<String>,
        kind: NotificationKind,
        subject: impl Into<String>,
        message: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            video_id,
            kind,
            status: NotificationStatus::Pending,
            subject: subject.into(),
            message: message.into(),
            recipient: recipient.into(),
            sent_at: None,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn mark_sent(&mut self) {
        self.status = NotificationStatus::Sent;
        self.sent_at = Some(Utc::now());
        self.error_message = None;
    }

    /// Record a failed delivery attempt.
    pub fn mark_send_failed(&mut self, error: impl Into<String>) {
        self.status = NotificationStatus::Failed;
        self.error_message = Some(error.into());
        self.retry_count += 1;
    }

    /// Record a failure that happened before any delivery was attempted.
    pub fn mark_render_failed(&mut self, error: impl Into<String>) {
        self.status = NotificationStatus::Failed;
        self.error_message = Some(error.into());
    }
}
