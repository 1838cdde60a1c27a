//! Notification worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vframe_clients::{ClientConfig, HttpUserServiceClient, HttpVideoServiceClient};
use vframe_db::{DbConfig, PgStore};
use vframe_notifier::{
    MailConfig, NotificationDeps, NotificationDispatcher, NotifierConfig, SmtpMailer, Templates,
};
use vframe_queue::{
    shutdown_signal, BrokerConfig, PoolConfig, RabbitBroker, RabbitSource, ShutdownOutcome,
    WorkerPool,
};

const POOL_NAME: &str = "notification";
const DEFAULT_WORKERS: usize = 3;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing();
    info!("Starting vframe-notifier");

    if let Err(e) = run().await {
        error!("Notifier error: {:#}", e);
        std::process::exit(1);
    }

    info!("Notifier shutdown complete");
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
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = NotifierConfig::from_env();
    let mail_config = MailConfig::from_env();
    info!("Notifier config: {:?}, mail: {:?}", config, mail_config);

    let metrics_addr: SocketAddr = config
        .metrics_addr
        .parse()
        .with_context(|| format!("invalid METRICS_ADDR {}", config.metrics_addr))?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;

    let templates =
        Templates::load(config.template_dir.as_deref()).context("failed to load templates")?;
    let mailer = SmtpMailer::new(&mail_config).context("failed to configure SMTP")?;

    let broker_config = BrokerConfig::from_env().with_connection_name("vframe-notifier");
    let broker = Arc::new(
        RabbitBroker::connect(&broker_config)
            .await
            .context("failed to connect to RabbitMQ")?,
    );

    let db_config = DbConfig::from_env().context("invalid database configuration")?;
    let db = PgStore::connect(&db_config)
        .await
        .context("failed to connect to PostgreSQL")?;

    let client_config = ClientConfig::from_env();
    let deps = NotificationDeps {
        users: Arc::new(
            HttpUserServiceClient::new(&client_config)
                .context("failed to create user service client")?,
        ),
        videos: Arc::new(
            HttpVideoServiceClient::new(&client_config)
                .context("failed to create video service client")?,
        ),
        store: Arc::new(db.clone()),
        mailer: Arc::new(mailer),
    };
    let dispatcher = Arc::new(NotificationDispatcher::new(&config, templates, deps));

    let pool_config = PoolConfig::from_env(POOL_NAME, DEFAULT_WORKERS);
    let source = Arc::new(RabbitSource::notifications(broker.clone()));
    let mut pool = WorkerPool::spawn(pool_config, source, dispatcher);

    let exhausted = tokio::select! {
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            false
        }
        _ = pool.wait_idle() => true,
    };

    if pool.shutdown().await == ShutdownOutcome::TimedOut {
        warn!("Exiting with notifications still in flight");
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
