//! Frame extraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Output pattern for extracted frames: `frame_0001.png`, `frame_0002.png`, ...
pub const FRAME_PATTERN: &str = "frame_%04d.png";

/// Extracts still images from a video.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract frames at `fps` into `output_dir` and return them sorted.
    ///
    /// Returns [`MediaError::NoFrames`] when the tool succeeds but produces
    /// no images.
    async fn extract_frames(
        &self,
        input: &Path,
        output_dir: &Path,
        fps: f64,
    ) -> MediaResult<Vec<PathBuf>>;
}

/// [`FrameExtractor`] backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameExtractor {
    runner: FfmpegRunner,
}

impl FfmpegFrameExtractor {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frames(
        &self,
        input: &Path,
        output_dir: &Path,
        fps: f64,
    ) -> MediaResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(output_dir).await?;

        let cmd = FfmpegCommand::new(input, output_dir.join(FRAME_PATTERN))
            .video_filter(format!("fps={}", fps));
        let output = self.runner.run(&cmd).await?;
        if !output.trim().is_empty() {
            debug!(output = %output.trim(), "FFmpeg output");
        }

        let frames = list_frames(output_dir).await?;
        if frames.is_empty() {
            return Err(MediaError::NoFrames);
        }

        info!(
            input = %input.display(),
            frames = frames.len(),
            "Extracted frames"
        );
        Ok(frames)
    }
}

/// List `*.png` files in `dir`, sorted by path.
pub async fn list_frames(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_png = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if is_png && entry.file_type().await?.is_file() {
            frames.push(path);
        }
    }

    frames.sort();
    Ok(frames)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable shell script standing in for ffmpeg.
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // The output pattern is the last argument.
    const WRITE_THREE: &str = r#"for last; do :; done
dir=$(dirname "$last")
printf c > "$dir/frame_0003.png"
printf a > "$dir/frame_0001.png"
printf b > "$dir/frame_0002.png"
printf x > "$dir/notes.txt""#;

    #[tokio::test]
    async fn test_extracts_sorted_pngs() {
        let temp = TempDir::new().unwrap();
        let program = fake_ffmpeg(temp.path(), WRITE_THREE);
        let extractor = FfmpegFrameExtractor::new(FfmpegRunner::new().with_program(program));

        let out = temp.path().join("frames");
        let frames = extractor
            .extract_frames(&temp.path().join("in.mp4"), &out, 1.0)
            .await
            .unwrap();

        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame_0001.png", "frame_0002.png", "frame_0003.png"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_captures_output() {
        let temp = TempDir::new().unwrap();
        let program = fake_ffmpeg(temp.path(), "echo 'Invalid data found' >&2\nexit 1");
        let extractor = FfmpegFrameExtractor::new(FfmpegRunner::new().with_program(program));

        let err = extractor
            .extract_frames(&temp.path().join("in.mp4"), &temp.path().join("frames"), 1.0)
            .await
            .unwrap_err();

        match err {
            MediaError::FfmpegFailed { output, exit_code, .. } => {
                assert_eq!(exit_code, Some(1));
                assert!(output.unwrap().contains("Invalid data found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_frames_is_an_error() {
        let temp = TempDir::new().unwrap();
        let program = fake_ffmpeg(temp.path(), "exit 0");
        let extractor = FfmpegFrameExtractor::new(FfmpegRunner::new().with_program(program));

        let err = extractor
            .extract_frames(&temp.path().join("in.mp4"), &temp.path().join("frames"), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NoFrames));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let temp = TempDir::new().unwrap();
        let program = fake_ffmpeg(temp.path(), "sleep 5");
        let runner = FfmpegRunner::new()
            .with_program(program)
            .with_timeout(std::time::Duration::from_millis(100));

        let err = runner
            .run(&FfmpegCommand::new("in.mp4", "out.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)));
    }
}
