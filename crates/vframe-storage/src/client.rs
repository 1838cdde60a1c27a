//! MinIO/S3 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Object storage operations used by the processing pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream the raw upload at `key` into `dest`. Returns bytes written.
    async fn download_raw(&self, key: &str, dest: &Path) -> StorageResult<u64>;

    /// Upload a local file to the processed bucket under a dated key.
    /// Returns the object key.
    async fn upload_processed(&self, path: &Path, name: &str, size: u64) -> StorageResult<String>;
}

/// `YYYY/MM/DD/<name>`
pub fn dated_key(name: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}", now.format("%Y/%m/%d"), name)
}

/// Configuration for the object store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// `host:port` or a full URL
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
    pub region: String,
    pub raw_bucket: String,
    pub processed_bucket: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint: std::env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "localhost:9000".to_string()),
            access_key: std::env::var("MINIO_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("MINIO_ACCESS_KEY not set"))?,
            secret_key: std::env::var("MINIO_SECRET_KEY")
                .map_err(|_| StorageError::config_error("MINIO_SECRET_KEY not set"))?,
            use_ssl: std::env::var("MINIO_USE_SSL")
                .map(|v| v == "true")
                .unwrap_or(false),
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            raw_bucket: std::env::var("MINIO_BUCKET_RAW").unwrap_or_else(|_| "videos-raw".to_string()),
            processed_bucket: std::env::var("MINIO_BUCKET_PROCESSED")
                .unwrap_or_else(|_| "videos-processed".to_string()),
        })
    }

    /// Endpoint as a URL, adding the scheme when only `host:port` is given.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else if self.use_ssl {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}

/// S3-compatible object store with separate raw and processed buckets.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    raw_bucket: String,
    processed_bucket: String,
}

impl S3ObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "minio",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            raw_bucket: config.raw_bucket,
            processed_bucket: config.processed_bucket,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    /// Create the raw and processed buckets if they do not exist.
    pub async fn ensure_buckets(&self) -> StorageResult<()> {
        for bucket in [&self.raw_bucket, &self.processed_bucket] {
            if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
                continue;
            }

            self.client
                .create_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| StorageError::BucketFailed(format!("{}: {}", bucket, e)))?;
            info!("Created bucket {}", bucket);
        }
        Ok(())
    }

    /// Check that the raw bucket is reachable.
    pub async fn ping(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.raw_bucket)
            .send()
            .await
            .map_err(|e| StorageError::BucketFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download_raw(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        debug!("Downloading {}/{} to {}", self.raw_bucket, key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.raw_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.body;
        let mut written: u64 = 0;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Downloaded {} ({} bytes) to {}", key, written, dest.display());
        Ok(written)
    }

    async fn upload_processed(&self, path: &Path, name: &str, size: u64) -> StorageResult<String> {
        let key = dated_key(name, Utc::now());
        debug!("Uploading {} to {}/{}", path.display(), self.processed_bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.processed_bucket)
            .key(&key)
            .body(body)
            .content_length(size as i64)
            .content_type(ARCHIVE_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} ({} bytes) to {}", path.display(), size, key);
        Ok(key)
    }
}
