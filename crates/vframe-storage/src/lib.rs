//! S3-compatible object storage for the vframe pipeline.
//!
//! Raw uploads are read from one bucket and frame archives are written to
//! another under date-partitioned keys.

pub mod client;
pub mod error;

pub use client::{dated_key, ObjectStore, S3ObjectStore, StorageConfig};
pub use error::{StorageError, StorageResult};
