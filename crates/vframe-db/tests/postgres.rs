//! PostgreSQL integration tests.

use sqlx::postgres::PgPool;
use sqlx::Row;

use vframe_db::{DbConfig, DbError, NotificationStore, PgStore, ProcessingJobStore};
use vframe_models::{Notification, NotificationKind, ProcessingJob};

async fn connect() -> (PgStore, PgPool) {
    dotenvy::dotenv().ok();
    let config = DbConfig::from_env().expect("Invalid database configuration");
    let store = PgStore::connect(&config)
        .await
        .expect("Failed to connect to PostgreSQL");
    store.migrate().await.expect("Failed to run migrations");
    store.ping().await.expect("Ping failed");

    let pool = PgPool::connect_with(config.connect_options.clone())
        .await
        .expect("Failed to open inspection pool");
    (store, pool)
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_processing_job_round_trip() {
    let (store, pool) = connect().await;

    let mut job = ProcessingJob::start("it-video", "it-user", "video-processing-0");
    store.create_job(&job).await.expect("Failed to insert job");

    job.retry_count = 2;
    job.fail("failed to download video: connection reset");
    store.update_job(&job).await.expect("Failed to update job");

    let row = sqlx::query(
        "SELECT status, error_message, retry_count, completed_at IS NOT NULL AS done \
         FROM processing_jobs WHERE id = $1",
    )
    .bind(&job.id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(row.get::<String, _>("status"), "failed");
    assert_eq!(
        row.get::<Option<String>, _>("error_message").as_deref(),
        Some("failed to download video: connection reset")
    );
    assert_eq!(row.get::<i32, _>("retry_count"), 2);
    assert!(row.get::<bool, _>("done"));

    job.complete();
    store.update_job(&job).await.unwrap();
    let row = sqlx::query("SELECT status, duration_seconds FROM processing_jobs WHERE id = $1")
        .bind(&job.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("status"), "completed");
    assert_eq!(row.get::<Option<i64>, _>("duration_seconds"), job.duration_seconds);

    sqlx::query("DELETE FROM processing_jobs WHERE id = $1")
        .bind(&job.id)
        .execute(&pool)
        .await
        .unwrap();
    store.close().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_notification_round_trip() {
    let (store, pool) = connect().await;

    let mut notification = Notification::pending(
        "it-user",
        Some("it-video".to_string()),
        NotificationKind::VideoCompleted,
        "Video Processing Completed",
        "Your video was processed: 12 frames",
        "it-user@example.com",
    );
    store.create_notification(&notification).await.unwrap();

    notification.mark_send_failed("smtp timeout");
    store.update_notification(&notification).await.unwrap();

    let row = sqlx::query(
        "SELECT type, status, error_message, retry_count, sent_at IS NOT NULL AS sent \
         FROM notifications WHERE id = $1",
    )
    .bind(&notification.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.get::<String, _>("type"), "video_completed");
    assert_eq!(row.get::<String, _>("status"), "failed");
    assert_eq!(
        row.get::<Option<String>, _>("error_message").as_deref(),
        Some("smtp timeout")
    );
    assert_eq!(row.get::<i32, _>("retry_count"), 1);
    assert!(!row.get::<bool, _>("sent"));

    notification.mark_sent();
    store.update_notification(&notification).await.unwrap();

    let row = sqlx::query(
        "SELECT status, error_message, retry_count, sent_at IS NOT NULL AS sent \
         FROM notifications WHERE id = $1",
    )
    .bind(&notification.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.get::<String, _>("status"), "sent");
    assert_eq!(row.get::<Option<String>, _>("error_message"), None);
    assert_eq!(row.get::<i32, _>("retry_count"), 1);
    assert!(row.get::<bool, _>("sent"));

    sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(&notification.id)
        .execute(&pool)
        .await
        .unwrap();
    store.close().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_update_of_unknown_row_is_not_found() {
    let (store, _pool) = connect().await;

    let job = ProcessingJob::start("it-video", "it-user", "video-processing-0");
    let err = store.update_job(&job).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { table: "processing_jobs", .. }));

    store.close().await;
}
