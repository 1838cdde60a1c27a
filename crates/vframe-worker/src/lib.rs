//! Video processing worker.
//!
//! Consumes video processing jobs, extracts frames with FFmpeg, archives
//! them, uploads the archive and reports the outcome to the video-record
//! service and the notification queue.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{ProcessingError, ProcessingResult};
pub use logging::JobLogger;
pub use pipeline::{PipelineDeps, PipelineOutcome, PipelineStage, VideoProcessor};
