//! Processing job records.
//!
//! One row is written per processing attempt. A requeued message that is
//! picked up again produces a fresh row rather than bumping `retry_count`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing attempt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persistent record of a single processing attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: String,
    pub video_id: String,
    pub user_id: String,
    pub worker_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl ProcessingJob {
    /// Start a new attempt in the `running` state.
    pub fn start(
        video_id: impl Into<String>,
        user_id: impl Into<String>,
        worker_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.into(),
            user_id: user_id.into(),
            worker_id: worker_id.into(),
            status: JobStatus::Running,
            started_at: now,
            completed_at: None,
            duration_seconds: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
        }
    }

    /// Mark the attempt completed and record its duration in whole seconds.
    pub fn complete_at(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.duration_seconds = Some((now - self.started_at).num_seconds().max(0));
    }

    pub fn complete(&mut self) {
        self.complete_at(Utc::now());
    }

    /// Mark the attempt failed with the error text.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_start_is_running() {
        let job = ProcessingJob::start("v1", "u1", "worker-0");
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.is_terminal());
        assert!(job.completed_at.is_none());
        assert_eq!(job.worker_id, "worker-0");
    }

    #[test]
    fn test_complete_records_whole_seconds() {
        let mut job = ProcessingJob::start("v1", "u1", "worker-0");
        let finished = job.started_at + Duration::milliseconds(12_900);
        job.complete_at(finished);

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(finished));
        assert_eq!(job.duration_seconds, Some(12));
    }

    #[test]
    fn test_fail_records_error() {
        let mut job = ProcessingJob::start("v1", "u1", "worker-0");
        job.fail("ffmpeg exited with status 1");

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.is_terminal());
        assert_eq!(job.error_message.as_deref(), Some("ffmpeg exited with status 1"));
        assert!(job.duration_seconds.is_none());
    }
}
