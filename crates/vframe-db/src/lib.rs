//! Persistence of the pipeline's own rows.
//!
//! Processing attempts and notification deliveries are written here; video
//! and user records belong to other services and are never touched.

pub mod config;
pub mod error;
pub mod memory;
pub mod store;

pub use config::DbConfig;
pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use store::{NotificationStore, PgStore, ProcessingJobStore};
