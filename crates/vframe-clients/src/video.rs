//! Video-record service client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use vframe_models::{Video, VideoStatus};

use crate::config::{trim_base, ClientConfig};
use crate::error::{check_status, ClientResult};

const RESOURCE: &str = "video";

/// Operations on video records owned by the video-record service.
#[async_trait]
pub trait VideoService: Send + Sync {
    async fn get_video(&self, video_id: &str) -> ClientResult<Video>;

    async fn update_status(
        &self,
        video_id: &str,
        status: VideoStatus,
        error_message: Option<&str>,
    ) -> ClientResult<()>;

    /// Mark processing complete with the archive location.
    async fn complete_video(
        &self,
        video_id: &str,
        zip_path: &str,
        zip_size_bytes: u64,
        frame_count: usize,
    ) -> ClientResult<()>;

    async fn fail_video(&self, video_id: &str, error_message: &str) -> ClientResult<()>;
}

#[derive(Serialize)]
struct UpdateStatusRequest<'a> {
    status: VideoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    zip_path: &'a str,
    zip_size_bytes: u64,
    frame_count: usize,
}

#[derive(Serialize)]
struct FailRequest<'a> {
    error_message: &'a str,
}

/// HTTP client for `/api/internal/videos`.
#[derive(Clone)]
pub struct HttpVideoServiceClient {
    http: Client,
    base_url: String,
}

impl HttpVideoServiceClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            http: config.http_client()?,
            base_url: trim_base(&config.video_service_url),
        })
    }

    fn url(&self, video_id: &str, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/api/internal/videos/{}/{}", self.base_url, video_id, action),
            None => format!("{}/api/internal/videos/{}", self.base_url, video_id),
        }
    }
}

#[async_trait]
impl VideoService for HttpVideoServiceClient {
    async fn get_video(&self, video_id: &str) -> ClientResult<Video> {
        let response = self.http.get(self.url(video_id, None)).send().await?;
        let response = check_status(response, RESOURCE, video_id).await?;
        Ok(response.json().await?)
    }

    async fn update_status(
        &self,
        video_id: &str,
        status: VideoStatus,
        error_message: Option<&str>,
    ) -> ClientResult<()> {
        debug!(video_id, status = %status, "Updating video status");
        let response = self
            .http
            .patch(self.url(video_id, Some("status")))
            .json(&UpdateStatusRequest {
                status,
                error_message,
            })
            .send()
            .await?;
        check_status(response, RESOURCE, video_id).await?;
        Ok(())
    }

    async fn complete_video(
        &self,
        video_id: &str,
        zip_path: &str,
        zip_size_bytes: u64,
        frame_count: usize,
    ) -> ClientResult<()> {
        let response = self
            .http
            .post(self.url(video_id, Some("complete")))
            .json(&CompleteRequest {
                zip_path,
                zip_size_bytes,
                frame_count,
            })
            .send()
            .await?;
        check_status(response, RESOURCE, video_id).await?;
        Ok(())
    }

    async fn fail_video(&self, video_id: &str, error_message: &str) -> ClientResult<()> {
        let response = self
            .http
            .post(self.url(video_id, Some("fail")))
            .json(&FailRequest { error_message })
            .send()
            .await?;
        check_status(response, RESOURCE, video_id).await?;
        Ok(())
    }
}
