//! Processing error types.

use thiserror::Error;

use vframe_clients::ClientError;
use vframe_media::MediaError;
use vframe_queue::FailureClass;
use vframe_storage::StorageError;

use crate::pipeline::PipelineStage;

pub type ProcessingResult<T> = Result<T, ProcessingError>;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("invalid message payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("invalid video id: {0:?}")]
    InvalidVideoId(String),

    #[error("video not found: {0}")]
    VideoNotFound(String),

    #[error("failed to get video: {0}")]
    VideoLookup(#[source] ClientError),

    #[error("failed to prepare workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to download video: {0}")]
    Download(#[source] StorageError),

    #[error("ffmpeg error: {0}")]
    Extraction(#[source] MediaError),

    #[error("no frames extracted")]
    NoFrames,

    #[error("failed to create zip: {0}")]
    Archive(#[source] MediaError),

    #[error("failed to upload zip: {0}")]
    Upload(#[source] StorageError),
}

impl ProcessingError {
    /// Stage the pipeline was in when the error occurred.
    pub fn stage(&self) -> PipelineStage {
        match self {
            ProcessingError::MalformedPayload(_)
            | ProcessingError::InvalidVideoId(_)
            | ProcessingError::VideoNotFound(_)
            | ProcessingError::VideoLookup(_) => PipelineStage::Received,
            ProcessingError::Workspace(_) | ProcessingError::Download(_) => {
                PipelineStage::Downloading
            }
            ProcessingError::Extraction(_) | ProcessingError::NoFrames => PipelineStage::Extracting,
            ProcessingError::Archive(_) => PipelineStage::Archiving,
            ProcessingError::Upload(_) => PipelineStage::Uploading,
        }
    }

    /// Short reason reported to the video-record service and the user.
    ///
    /// Tool output and infrastructure details stay in the job row.
    pub fn user_message(&self) -> &'static str {
        match self {
            ProcessingError::MalformedPayload(_) | ProcessingError::InvalidVideoId(_) => {
                "invalid job"
            }
            ProcessingError::VideoNotFound(_) => "video not found",
            ProcessingError::VideoLookup(_) => "failed to get video",
            ProcessingError::Workspace(_) | ProcessingError::Download(_) => {
                "failed to download video"
            }
            ProcessingError::Extraction(_) => "failed to extract frames",
            ProcessingError::NoFrames => "no frames extracted",
            ProcessingError::Archive(_) => "failed to create zip",
            ProcessingError::Upload(_) => "failed to upload zip",
        }
    }
}

impl FailureClass for ProcessingError {
    fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProcessingError::MalformedPayload(_)
                | ProcessingError::InvalidVideoId(_)
                | ProcessingError::VideoNotFound(_)
        )
    }
}
