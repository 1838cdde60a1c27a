//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Frames extracted per second of video
    pub fps: f64,
    /// Parent of the per-job temp directories
    pub work_dir: PathBuf,
    /// Upper bound on a single FFmpeg run
    pub ffmpeg_timeout: Option<Duration>,
    /// Prometheus exporter listen address
    pub metrics_addr: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            fps: 1.0,
            work_dir: std::env::temp_dir().join("vframe"),
            ffmpeg_timeout: None,
            metrics_addr: "0.0.0.0:8090".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fps: std::env::var("FFMPEG_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|fps: &f64| fps.is_finite() && *fps > 0.0)
                .unwrap_or(defaults.fps),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ffmpeg_timeout: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            metrics_addr: std::env::var("METRICS_ADDR").unwrap_or(defaults.metrics_addr),
        }
    }
}
