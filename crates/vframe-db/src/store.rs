//! Store traits and the Postgres implementation.

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use vframe_models::{Notification, ProcessingJob};

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Persistence for processing attempts.
#[async_trait]
pub trait ProcessingJobStore: Send + Sync {
    async fn create_job(&self, job: &ProcessingJob) -> DbResult<()>;

    /// Persist status, completion time, duration, error text and retry count.
    async fn update_job(&self, job: &ProcessingJob) -> DbResult<()>;
}

/// Persistence for notification delivery records.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, notification: &Notification) -> DbResult<()>;

    /// Persist status, sent time, error text and retry count.
    async fn update_notification(&self, notification: &Notification) -> DbResult<()>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options.clone())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool };
        if config.run_migrations {
            store.migrate().await?;
        }

        info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(store)
    }

    pub async fn migrate(&self) -> DbResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ProcessingJobStore for PgStore {
    async fn create_job(&self, job: &ProcessingJob) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO processing_jobs
                (id, video_id, user_id, worker_id, status, started_at, retry_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&job.id)
        .bind(&job.video_id)
        .bind(&job.user_id)
        .bind(&job.worker_id)
        .bind(job.status.as_str())
        .bind(job.started_at)
        .bind(job.retry_count)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_job(&self, job: &ProcessingJob) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = $1, completed_at = $2, duration_seconds = $3, error_message = $4, retry_count = $5
            WHERE id = $6
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.completed_at)
        .bind(job.duration_seconds)
        .bind(job.error_message.as_deref())
        .bind(job.retry_count)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("processing_jobs", &job.id));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create_notification(&self, notification: &Notification) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, video_id, type, status, subject, message, recipient, retry_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(notification.video_id.as_deref())
        .bind(notification.kind.as_str())
        .bind(notification.status.as_str())
        .bind(&notification.subject)
        .bind(&notification.message)
        .bind(&notification.recipient)
        .bind(notification.retry_count)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_notification(&self, notification: &Notification) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, sent_at = $2, error_message = $3, retry_count = $4
            WHERE id = $5
            "#,
        )
        .bind(notification.status.as_str())
        .bind(notification.sent_at)
        .bind(notification.error_message.as_deref())
        .bind(notification.retry_count)
        .bind(&notification.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("notifications", &notification.id));
        }
        Ok(())
    }
}
