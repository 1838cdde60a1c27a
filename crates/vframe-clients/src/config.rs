//! Client configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the video-record service
    pub video_service_url: String,
    /// Base URL of the user-record (auth) service
    pub user_service_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            video_service_url: "http://video-service:8082".to_string(),
            user_service_url: "http://auth-service:8081".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            video_service_url: std::env::var("VIDEO_SERVICE_URL")
                .unwrap_or(defaults.video_service_url),
            user_service_url: std::env::var("AUTH_SERVICE_URL")
                .unwrap_or(defaults.user_service_url),
            timeout: std::env::var("SERVICE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub(crate) fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder().timeout(self.timeout).build()
    }
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
