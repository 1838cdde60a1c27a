//! Notifier error types.

use thiserror::Error;

use vframe_clients::ClientError;
use vframe_db::DbError;
use vframe_models::NotificationKind;
use vframe_queue::FailureClass;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid message payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("{0} notification without video id")]
    MissingVideoId(NotificationKind),

    #[error("failed to get user: {0}")]
    UserLookup(#[source] ClientError),

    #[error("failed to get video: {0}")]
    VideoLookup(#[source] ClientError),

    #[error("failed to create notification record: {0}")]
    Persist(#[source] DbError),

    #[error("failed to render template: {0}")]
    Template(#[from] tera::Error),

    #[error("failed to send email: {0}")]
    Send(#[from] MailError),
}

impl FailureClass for NotifyError {
    fn is_permanent(&self) -> bool {
        match self {
            NotifyError::MalformedPayload(_) | NotifyError::MissingVideoId(_) => true,
            NotifyError::UserLookup(e) | NotifyError::VideoLookup(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// SMTP errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("invalid message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}
