//! Exchange/queue topology.
//!
//! The topology is plain data so it can be inspected and tested without a
//! broker; [`crate::RabbitBroker`] declares it on connect.

use std::time::Duration;

use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::ExchangeKind;

pub const VIDEO_EXCHANGE: &str = "video.exchange";
pub const NOTIFICATION_EXCHANGE: &str = "notification.exchange";
pub const VIDEO_DLX: &str = "video.dlx";
pub const NOTIFICATION_DLX: &str = "notification.dlx";

pub const VIDEO_UPLOAD_QUEUE: &str = "video.upload.queue";
pub const NOTIFICATION_QUEUE: &str = "notification.queue";
pub const VIDEO_UPLOAD_DLQ: &str = "video.upload.dlq";
pub const NOTIFICATION_DLQ: &str = "notification.dlq";

pub const VIDEO_UPLOAD_ROUTING_KEY: &str = "video.upload";
pub const NOTIFICATION_ROUTING_KEY: &str = "notification.email";
pub const NOTIFICATION_BINDING_KEY: &str = "notification.#";

/// Unacknowledged deliveries allowed per consumer.
pub const DEFAULT_PREFETCH: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeType {
    Topic,
    Direct,
}

impl ExchangeType {
    pub fn kind(&self) -> ExchangeKind {
        match self {
            ExchangeType::Topic => ExchangeKind::Topic,
            ExchangeType::Direct => ExchangeKind::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: &'static str,
    pub kind: ExchangeType,
    pub durable: bool,
}

/// Where rejected or expired messages are routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub exchange: &'static str,
    pub routing_key: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: &'static str,
    pub durable: bool,
    pub max_priority: Option<u8>,
    pub message_ttl: Option<Duration>,
    pub dead_letter: Option<DeadLetter>,
}

impl QueueSpec {
    fn durable(name: &'static str) -> Self {
        Self {
            name,
            durable: true,
            max_priority: None,
            message_ttl: None,
            dead_letter: None,
        }
    }

    /// `x-` arguments passed to `queue.declare`.
    pub fn arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();

        if let Some(priority) = self.max_priority {
            args.insert(
                ShortString::from("x-max-priority"),
                AMQPValue::LongInt(i32::from(priority)),
            );
        }

        if let Some(ttl) = self.message_ttl {
            let millis = i32::try_from(ttl.as_millis()).unwrap_or(i32::MAX);
            args.insert(ShortString::from("x-message-ttl"), AMQPValue::LongInt(millis));
        }

        if let Some(dead_letter) = &self.dead_letter {
            args.insert(
                ShortString::from("x-dead-letter-exchange"),
                AMQPValue::LongString(LongString::from(dead_letter.exchange)),
            );
            args.insert(
                ShortString::from("x-dead-letter-routing-key"),
                AMQPValue::LongString(LongString::from(dead_letter.routing_key)),
            );
        }

        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub queue: &'static str,
    pub exchange: &'static str,
    pub routing_key: &'static str,
}

/// Complete broker topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchanges: Vec<ExchangeSpec>,
    pub queues: Vec<QueueSpec>,
    pub bindings: Vec<BindingSpec>,
    pub prefetch: u16,
}

impl Default for Topology {
    fn default() -> Self {
        Self::standard()
    }
}

impl Topology {
    /// Video upload and notification queues with their dead-letter parking queues.
    pub fn standard() -> Self {
        let exchanges = vec![
            ExchangeSpec { name: VIDEO_EXCHANGE, kind: ExchangeType::Topic, durable: true },
            ExchangeSpec { name: NOTIFICATION_EXCHANGE, kind: ExchangeType::Topic, durable: true },
            ExchangeSpec { name: VIDEO_DLX, kind: ExchangeType::Direct, durable: true },
            ExchangeSpec { name: NOTIFICATION_DLX, kind: ExchangeType::Direct, durable: true },
        ];

        let queues = vec![
            QueueSpec {
                max_priority: Some(vframe_models::MAX_PRIORITY),
                message_ttl: Some(Duration::from_secs(24 * 60 * 60)),
                dead_letter: Some(DeadLetter {
                    exchange: VIDEO_DLX,
                    routing_key: VIDEO_UPLOAD_DLQ,
                }),
                ..QueueSpec::durable(VIDEO_UPLOAD_QUEUE)
            },
            QueueSpec {
                message_ttl: Some(Duration::from_secs(60 * 60)),
                dead_letter: Some(DeadLetter {
                    exchange: NOTIFICATION_DLX,
                    routing_key: NOTIFICATION_DLQ,
                }),
                ..QueueSpec::durable(NOTIFICATION_QUEUE)
            },
            QueueSpec::durable(VIDEO_UPLOAD_DLQ),
            QueueSpec::durable(NOTIFICATION_DLQ),
        ];

        let bindings = vec![
            BindingSpec {
                queue: VIDEO_UPLOAD_QUEUE,
                exchange: VIDEO_EXCHANGE,
                routing_key: VIDEO_UPLOAD_ROUTING_KEY,
            },
            BindingSpec {
                queue: NOTIFICATION_QUEUE,
                exchange: NOTIFICATION_EXCHANGE,
                routing_key: NOTIFICATION_BINDING_KEY,
            },
            BindingSpec {
                queue: VIDEO_UPLOAD_DLQ,
                exchange: VIDEO_DLX,
                routing_key: VIDEO_UPLOAD_DLQ,
            },
            BindingSpec {
                queue: NOTIFICATION_DLQ,
                exchange: NOTIFICATION_DLX,
                routing_key: NOTIFICATION_DLQ,
            },
        ];

        Self {
            exchanges,
            queues,
            bindings,
            prefetch: DEFAULT_PREFETCH,
        }
    }

    pub fn queue(&self, name: &str) -> Option<&QueueSpec> {
        self.queues.iter().find(|q| q.name == name)
    }
}
