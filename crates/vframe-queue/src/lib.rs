//! RabbitMQ job queue for the vframe services.
//!
//! This crate provides:
//! - Exchange/queue topology with priority, TTL and dead-lettering
//! - Job publishing and per-worker consumer subscriptions
//! - Acknowledgable deliveries and the shared ack/nack policy
//! - A worker pool supervisor with cooperative shutdown
//! - An in-process broker for tests and local runs

pub mod broker;
pub mod delivery;
pub mod disposition;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod pool;
pub mod topology;

pub use broker::{BrokerConfig, NotificationPublisher, RabbitBroker, RabbitSource, VideoJobPublisher};
pub use delivery::{Acknowledger, Delivery, DeliveryStream, JobSource};
pub use disposition::{Disposition, FailureClass};
pub use error::{QueueError, QueueResult};
pub use memory::{InMemoryBroker, Settled};
pub use pool::{shutdown_signal, JobHandler, PoolConfig, PoolHandle, ShutdownOutcome, WorkerPool};
pub use topology::Topology;
