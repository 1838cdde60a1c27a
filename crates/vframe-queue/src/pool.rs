//! Worker pool supervisor.
//!
//! Runs a fixed number of independent consume loops against a
//! [`JobSource`]. Each loop handles one delivery at a time end to end and
//! settles it according to [`Disposition::for_result`]. Shutdown is
//! cooperative: the signal is only observed while a worker waits for its
//! next delivery, never in the middle of a job.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::delivery::{DeliveryStream, JobSource};
use crate::disposition::{Disposition, FailureClass};
use crate::metrics;

/// Processes one message payload.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Error: FailureClass + fmt::Display + Send;

    async fn handle(&self, worker_id: usize, payload: &[u8]) -> Result<(), Self::Error>;
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pool name, used in consumer tags, logs and metrics
    pub name: String,
    pub worker_count: usize,
    /// How long `shutdown` waits for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Consecutive failed subscriptions before a worker gives up
    pub max_restarts: u32,
    pub restart_base_delay: Duration,
    pub restart_max_delay: Duration,
}

impl PoolConfig {
    pub fn new(name: impl Into<String>, worker_count: usize) -> Self {
        Self {
            name: name.into(),
            worker_count: worker_count.max(1),
            shutdown_timeout: Duration::from_secs(30),
            max_restarts: 5,
            restart_base_delay: Duration::from_millis(500),
            restart_max_delay: Duration::from_secs(30),
        }
    }

    /// Read `WORKER_COUNT`, `WORKER_SHUTDOWN_TIMEOUT` and `WORKER_MAX_RESTARTS`.
    pub fn from_env(name: impl Into<String>, default_workers: usize) -> Self {
        let defaults = Self::new(name, default_workers);
        Self {
            worker_count: std::env::var("WORKER_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.worker_count),
            shutdown_timeout: std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            max_restarts: std::env::var("WORKER_MAX_RESTARTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_restarts),
            ..defaults
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_restart_policy(mut self, max_restarts: u32, base_delay: Duration) -> Self {
        self.max_restarts = max_restarts;
        self.restart_base_delay = base_delay;
        self
    }

    /// Backoff before the given restart attempt (0-based).
    fn restart_delay(&self, attempt: u32) -> Duration {
        let delay = self
            .restart_base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.restart_max_delay)
    }
}

/// How `PoolHandle::shutdown` finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every worker exited within the timeout
    Graceful,
    /// Some workers were still busy; they were left running
    TimedOut,
}

pub struct WorkerPool;

impl WorkerPool {
    /// Start `config.worker_count` workers.
    pub fn spawn<H: JobHandler>(
        config: PoolConfig,
        source: Arc<dyn JobSource>,
        handler: Arc<H>,
    ) -> PoolHandle {
        let (shutdown, _) = watch::channel(false);
        let config = Arc::new(config);
        let mut workers = JoinSet::new();

        for worker_id in 0..config.worker_count {
            let worker = Worker {
                id: worker_id,
                config: Arc::clone(&config),
                source: Arc::clone(&source),
                handler: Arc::clone(&handler),
                shutdown: shutdown.subscribe(),
            };
            workers.spawn(worker.run());
        }

        info!(
            pool = %config.name,
            workers = config.worker_count,
            "Worker pool started"
        );

        PoolHandle {
            name: config.name.clone(),
            shutdown_timeout: config.shutdown_timeout,
            shutdown,
            workers,
        }
    }
}

/// Handle to a running pool.
pub struct PoolHandle {
    name: String,
    shutdown_timeout: Duration,
    shutdown: watch::Sender<bool>,
    workers: JoinSet<()>,
}

impl PoolHandle {
    /// Number of workers that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Resolve once every worker has exited.
    ///
    /// Cancel-safe, so it can be raced against a shutdown signal.
    pub async fn wait_idle(&mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!(pool = %self.name, error = %e, "Worker task panicked");
            }
        }
    }

    /// Signal every worker to stop and wait for in-flight jobs.
    pub async fn shutdown(mut self) -> ShutdownOutcome {
        info!(
            pool = %self.name,
            active = self.workers.len(),
            "Shutting down worker pool"
        );
        self.shutdown.send_replace(true);

        let timeout = self.shutdown_timeout;
        let waited = tokio::time::timeout(timeout, self.wait_idle()).await;
        match waited {
            Ok(()) => {
                info!(pool = %self.name, "Worker pool stopped");
                ShutdownOutcome::Graceful
            }
            Err(_) => {
                warn!(
                    pool = %self.name,
                    remaining = self.workers.len(),
                    timeout_secs = timeout.as_secs(),
                    "Timed out waiting for workers, leaving them running"
                );
                self.workers.detach_all();
                ShutdownOutcome::TimedOut
            }
        }
    }
}

enum StreamEnd {
    Shutdown,
    Closed { processed: u64 },
}

struct Worker<H> {
    id: usize,
    config: Arc<PoolConfig>,
    source: Arc<dyn JobSource>,
    handler: Arc<H>,
    shutdown: watch::Receiver<bool>,
}

impl<H: JobHandler> Worker<H> {
    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let tag = format!("{}-{}-{}", self.config.name, self.id, Uuid::new_v4());
            match self.source.subscribe(&tag).await {
                Ok(mut stream) => {
                    info!(pool = %self.config.name, worker_id = self.id, consumer_tag = %tag, "Worker consuming");
                    match self.consume(&mut stream).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Closed { processed } => {
                            if processed > 0 {
                                failures = 0;
                            }
                            warn!(
                                pool = %self.config.name,
                                worker_id = self.id,
                                processed,
                                "Delivery stream closed"
                            );
                        }
                    }
                }
                Err(e) => {
                    error!(pool = %self.config.name, worker_id = self.id, error = %e, "Failed to subscribe");
                }
            }

            if failures >= self.config.max_restarts {
                error!(
                    pool = %self.config.name,
                    worker_id = self.id,
                    restarts = failures,
                    "Worker giving up after repeated failures"
                );
                break;
            }

            let delay = self.config.restart_delay(failures);
            failures += 1;
            metrics::record_worker_restart(&self.config.name);
            debug!(worker_id = self.id, delay_ms = delay.as_millis() as u64, "Restarting worker");

            tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(pool = %self.config.name, worker_id = self.id, "Worker stopped");
    }

    async fn consume(&mut self, stream: &mut DeliveryStream) -> StreamEnd {
        let mut processed = 0;

        loop {
            let delivery = tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown) => return StreamEnd::Shutdown,
                next = stream.next() => match next {
                    Some(delivery) => delivery,
                    None => return StreamEnd::Closed { processed },
                },
            };

            let handled = AssertUnwindSafe(self.handler.handle(self.id, &delivery.payload))
                .catch_unwind()
                .await;

            let disposition = match handled {
                Ok(result) => {
                    let disposition = Disposition::for_result(&result);
                    if let Err(e) = &result {
                        match disposition {
                            Disposition::Drop => {
                                warn!(worker_id = self.id, error = %e, "Dropping message after permanent failure")
                            }
                            _ => warn!(
                                worker_id = self.id,
                                error = %e,
                                redelivered = delivery.redelivered,
                                "Requeueing message after transient failure"
                            ),
                        }
                    }
                    disposition
                }
                Err(panic) => {
                    error!(
                        pool = %self.config.name,
                        worker_id = self.id,
                        panic = panic_message(&*panic),
                        redelivered = delivery.redelivered,
                        "Handler panicked, requeueing message"
                    );
                    Disposition::Requeue
                }
            };

            if let Err(e) = delivery.settle(disposition).await {
                error!(worker_id = self.id, disposition = %disposition, error = %e, "Failed to settle delivery");
            }
            metrics::record_settled(&self.config.name, disposition);
            processed += 1;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Resolve on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
