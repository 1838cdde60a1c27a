//! Preflight for the processing worker.
//!
//! Runs every check, prints one line per check and exits non-zero if any
//! of them failed.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};

use vframe_db::{DbConfig, PgStore};
use vframe_media::check_ffmpeg;
use vframe_queue::{BrokerConfig, RabbitBroker};
use vframe_storage::S3ObjectStore;
use vframe_worker::WorkerConfig;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    let results = [
        check("work dir", work_dir_writable(&config.work_dir)).await,
        check("ffmpeg", ffmpeg_runs()).await,
        check("rabbitmq", broker_reachable()).await,
        check("object storage", storage_reachable()).await,
        check("postgres", database_reachable()).await,
    ];

    let failed = results.iter().filter(|ok| !**ok).count();
    if failed > 0 {
        bail!("worker-selfcheck: {} of {} checks failed", failed, results.len());
    }
    println!("worker-selfcheck: ok");
    Ok(())
}

async fn check<F>(name: &str, fut: F) -> bool
where
    F: Future<Output = anyhow::Result<()>>,
{
    let outcome = match tokio::time::timeout(CHECK_TIMEOUT, fut).await {
        Ok(outcome) => outcome,
        Err(_) => Err(anyhow::anyhow!("timed out after {}s", CHECK_TIMEOUT.as_secs())),
    };
    match outcome {
        Ok(()) => {
            println!("worker-selfcheck: {:<16} ok", name);
            true
        }
        Err(e) => {
            println!("worker-selfcheck: {:<16} FAILED: {:#}", name, e);
            false
        }
    }
}

async fn work_dir_writable(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("cannot create {}", path.display()))?;
    tempfile::NamedTempFile::new_in(path)
        .with_context(|| format!("{} not writable", path.display()))?;
    Ok(())
}

async fn ffmpeg_runs() -> anyhow::Result<()> {
    let program = check_ffmpeg()?;
    let status = tokio::process::Command::new(&program)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .with_context(|| format!("cannot run {}", program.display()))?;
    if !status.success() {
        bail!("ffmpeg -version exited with {}", status);
    }
    Ok(())
}

async fn broker_reachable() -> anyhow::Result<()> {
    let config = BrokerConfig::from_env().with_connection_name("vframe-worker-selfcheck");
    let broker = RabbitBroker::connect(&config).await?;
    let open = broker.ping().await;
    broker.close().await?;
    if !open {
        bail!("connection closed right after connecting");
    }
    Ok(())
}

async fn storage_reachable() -> anyhow::Result<()> {
    let store = S3ObjectStore::from_env()?;
    store.ping().await?;
    Ok(())
}

async fn database_reachable() -> anyhow::Result<()> {
    let store = PgStore::connect(&DbConfig::from_env()?).await?;
    let pinged = store.ping().await;
    store.close().await;
    pinged?;
    Ok(())
}
