//! Metrics for the job pipeline.
//!
//! Exported through whichever `metrics` recorder the binary installs.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::disposition::Disposition;

/// Metric names.
pub mod names {
    pub const JOBS_TOTAL: &str = "vframe_jobs_total";
    pub const WORKER_RESTARTS_TOTAL: &str = "vframe_worker_restarts_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "vframe_pipeline_duration_seconds";
    pub const FRAMES_EXTRACTED_TOTAL: &str = "vframe_frames_extracted_total";
    pub const NOTIFICATIONS_TOTAL: &str = "vframe_notifications_total";
}

/// Record a settled delivery.
pub fn record_settled(pool: &str, disposition: Disposition) {
    counter!(
        names::JOBS_TOTAL,
        "pool" => pool.to_string(),
        "disposition" => disposition.as_str()
    )
    .increment(1);
}

pub fn record_worker_restart(pool: &str) {
    counter!(names::WORKER_RESTARTS_TOTAL, "pool" => pool.to_string()).increment(1);
}

/// Record a finished pipeline run.
pub fn record_pipeline(outcome: &'static str, duration: Duration, frames: usize) {
    histogram!(names::PIPELINE_DURATION_SECONDS, "outcome" => outcome)
        .record(duration.as_secs_f64());
    if frames > 0 {
        counter!(names::FRAMES_EXTRACTED_TOTAL).increment(frames as u64);
    }
}

/// Record a notification outcome, `sent` or `failed`.
///
/// A send skipped because SMTP credentials are unset counts as `sent`.
pub fn record_notification(status: &'static str) {
    counter!(names::NOTIFICATIONS_TOTAL, "status" => status).increment(1);
}
