//! In-process broker.
//!
//! Mirrors the broker semantics the workers rely on (competing consumers,
//! ack/nack with requeue, redelivery flag) without a RabbitMQ server. Used
//! by the pipeline and dispatcher tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use vframe_models::{NotificationMessage, VideoProcessingMessage};

use crate::broker::{NotificationPublisher, VideoJobPublisher};
use crate::delivery::{Acknowledger, Delivery, DeliveryStream, JobSource};
use crate::error::{QueueError, QueueResult};

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Acked,
    Nacked { requeue: bool },
}

#[derive(Debug, Clone)]
struct Queued {
    id: u64,
    payload: Vec<u8>,
    redelivered: bool,
}

struct Inner {
    sender: mpsc::UnboundedSender<Queued>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Queued>>,
    closed: watch::Sender<bool>,
    settled_count: watch::Sender<usize>,
    next_id: AtomicU64,
    fail_publish: AtomicBool,
    settlements: Mutex<Vec<(u64, Settled)>>,
    notifications: Mutex<Vec<NotificationMessage>>,
    video_jobs: Mutex<Vec<(VideoProcessingMessage, u8)>>,
}

impl Inner {
    fn enqueue(&self, queued: Queued) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.sender.send(queued);
    }

    fn record(&self, id: u64, settled: Settled) {
        if let Ok(mut settlements) = self.settlements.lock() {
            settlements.push((id, settled));
        }
        self.settled_count.send_modify(|count| *count += 1);
    }
}

/// Cloneable handle to a shared in-process queue.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let (settled_count, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                sender,
                receiver: tokio::sync::Mutex::new(receiver),
                closed,
                settled_count,
                next_id: AtomicU64::new(1),
                fail_publish: AtomicBool::new(false),
                settlements: Mutex::new(Vec::new()),
                notifications: Mutex::new(Vec::new()),
                video_jobs: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Enqueue a raw payload and return its delivery id.
    pub fn push(&self, payload: impl Into<Vec<u8>>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.enqueue(Queued {
            id,
            payload: payload.into(),
            redelivered: false,
        });
        id
    }

    pub fn push_json<T: Serialize>(&self, body: &T) -> QueueResult<u64> {
        Ok(self.push(serde_json::to_vec(body)?))
    }

    /// End every open delivery stream, as a lost connection would.
    pub fn close(&self) {
        self.inner.closed.send_replace(true);
    }

    /// Make subsequent publishes fail.
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Wait until at least `count` settlements have been recorded.
    pub async fn wait_settled(&self, count: usize) {
        let mut rx = self.inner.settled_count.subscribe();
        let _ = rx.wait_for(|settled| *settled >= count).await;
    }

    pub fn settlements(&self) -> Vec<(u64, Settled)> {
        self.inner
            .settlements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Settlements of one delivery, in order.
    pub fn settlements_for(&self, id: u64) -> Vec<Settled> {
        self.settlements()
            .into_iter()
            .filter(|(delivery_id, _)| *delivery_id == id)
            .map(|(_, settled)| settled)
            .collect()
    }

    pub fn published_notifications(&self) -> Vec<NotificationMessage> {
        self.inner
            .notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn published_video_jobs(&self) -> Vec<(VideoProcessingMessage, u8)> {
        self.inner
            .video_jobs
            .lock()
            .map(|j| j.clone())
            .unwrap_or_default()
    }

    fn check_publish(&self) -> QueueResult<()> {
        if self.inner.fail_publish.load(Ordering::SeqCst) {
            return Err(QueueError::publish_failed("publishing disabled"));
        }
        Ok(())
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    loop {
        if *closed.borrow_and_update() {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl JobSource for InMemoryBroker {
    async fn subscribe(&self, _consumer_tag: &str) -> QueueResult<DeliveryStream> {
        let closed = self.inner.closed.subscribe();
        let stream = futures::stream::unfold(
            (self.inner.clone(), closed),
            |(inner, mut closed)| async move {
                let next = tokio::select! {
                    biased;
                    _ = wait_closed(&mut closed) => None,
                    item = async { inner.receiver.lock().await.recv().await } => item,
                };
                let queued = next?;
                let delivery = Delivery::new(
                    queued.payload.clone(),
                    queued.redelivered,
                    Box::new(MemoryAcker {
                        inner: inner.clone(),
                        queued,
                    }),
                );
                Some((delivery, (inner, closed)))
            },
        )
        .boxed();
        Ok(stream)
    }
}

struct MemoryAcker {
    inner: Arc<Inner>,
    queued: Queued,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> QueueResult<()> {
        self.inner.record(self.queued.id, Settled::Acked);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> QueueResult<()> {
        if requeue {
            self.inner.enqueue(Queued {
                redelivered: true,
                ..self.queued.clone()
            });
        }
        self.inner.record(self.queued.id, Settled::Nacked { requeue });
        Ok(())
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryBroker {
    async fn publish_notification(&self, msg: &NotificationMessage) -> QueueResult<()> {
        self.check_publish()?;
        if let Ok(mut notifications) = self.inner.notifications.lock() {
            notifications.push(msg.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl VideoJobPublisher for InMemoryBroker {
    async fn publish_video_upload(
        &self,
        msg: &VideoProcessingMessage,
        priority: u8,
    ) -> QueueResult<()> {
        self.check_publish()?;
        if let Ok(mut jobs) = self.inner.video_jobs.lock() {
            jobs.push((msg.clone(), priority));
        }
        self.push_json(msg)?;
        Ok(())
    }
}
