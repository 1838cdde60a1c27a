//! Video processing worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vframe_clients::{ClientConfig, HttpVideoServiceClient};
use vframe_db::{DbConfig, PgStore};
use vframe_media::{FfmpegFrameExtractor, FfmpegRunner};
use vframe_queue::{
    shutdown_signal, BrokerConfig, PoolConfig, RabbitBroker, RabbitSource, ShutdownOutcome,
    WorkerPool,
};
use vframe_storage::S3ObjectStore;
use vframe_worker::{PipelineDeps, VideoProcessor, WorkerConfig};

const POOL_NAME: &str = "video-processing";
const DEFAULT_WORKERS: usize = 5;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    info!("Starting vframe-worker");

    if let Err(e) = run().await {
        error!("Worker error: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vframe=info".parse().unwrap())
        .add_directive("lapin=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let metrics_addr: SocketAddr = config
        .metrics_addr
        .parse()
        .with_context(|| format!("invalid METRICS_ADDR {}", config.metrics_addr))?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;

    let broker_config = BrokerConfig::from_env().with_connection_name("vframe-worker");
    let broker = Arc::new(
        RabbitBroker::connect(&broker_config)
            .await
            .context("failed to connect to RabbitMQ")?,
    );

    let storage = S3ObjectStore::from_env().context("failed to configure object storage")?;
    storage
        .ensure_buckets()
        .await
        .context("failed to ensure storage buckets")?;

    let db_config = DbConfig::from_env().context("invalid database configuration")?;
    let db = PgStore::connect(&db_config)
        .await
        .context("failed to connect to PostgreSQL")?;

    let videos = HttpVideoServiceClient::new(&ClientConfig::from_env())
        .context("failed to create video service client")?;

    let mut runner = FfmpegRunner::new();
    if let Some(timeout) = config.ffmpeg_timeout {
        runner = runner.with_timeout(timeout);
    }

    let deps = PipelineDeps {
        videos: Arc::new(videos),
        storage: Arc::new(storage),
        extractor: Arc::new(FfmpegFrameExtractor::new(runner)),
        jobs: Arc::new(db.clone()),
        notifications: broker.clone(),
    };
    let processor = Arc::new(VideoProcessor::new(config, deps));

    let pool_config = PoolConfig::from_env(POOL_NAME, DEFAULT_WORKERS);
    let source = Arc::new(RabbitSource::video_uploads(broker.clone()));
    let mut pool = WorkerPool::spawn(pool_config, source, processor);

    let exhausted = tokio::select! {
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            false
        }
        _ = pool.wait_idle() => true,
    };

    if pool.shutdown().await == ShutdownOutcome::TimedOut {
        warn!("Exiting with jobs still in flight");
    }

    if let Err(e) = broker.close().await {
        warn!("Failed to close broker connection: {}", e);
    }
    db.close().await;

    if exhausted {
        anyhow::bail!("all workers stopped after exhausting restarts");
    }
    Ok(())
}
