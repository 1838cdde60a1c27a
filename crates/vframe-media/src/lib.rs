//! Media operations for the vframe processing worker.
//!
//! This crate provides:
//! - An FFmpeg command builder and runner with captured output
//! - Frame extraction into numbered PNG files
//! - Zip archives of extracted frames

pub mod archive;
pub mod command;
pub mod error;
pub mod frames;

pub use archive::{archive_name, create_archive, ArchiveSummary};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{list_frames, FfmpegFrameExtractor, FrameExtractor, FRAME_PATTERN};
