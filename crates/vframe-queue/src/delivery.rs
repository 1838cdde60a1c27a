//! Received messages and their acknowledgment handles.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::disposition::Disposition;
use crate::error::QueueResult;

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> QueueResult<()>;

    async fn nack(&self, requeue: bool) -> QueueResult<()>;
}

/// A received payload plus its acknowledgment handle.
///
/// Settling consumes the delivery, so it can be acked or nacked at most once.
pub struct Delivery {
    pub payload: Vec<u8>,
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    pub async fn ack(self) -> QueueResult<()> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> QueueResult<()> {
        self.acker.nack(requeue).await
    }

    /// Apply a disposition. `Drop` acknowledges so the message is discarded.
    pub async fn settle(self, disposition: Disposition) -> QueueResult<()> {
        match disposition {
            Disposition::Ack | Disposition::Drop => self.ack().await,
            Disposition::Requeue => self.nack(true).await,
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Lazy stream of deliveries. Ends when the consumer is cancelled or the
/// connection is lost.
pub type DeliveryStream = BoxStream<'static, Delivery>;

/// Something workers can subscribe to.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Register a new consumer with the given tag.
    async fn subscribe(&self, consumer_tag: &str) -> QueueResult<DeliveryStream>;
}
