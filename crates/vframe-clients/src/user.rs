//! User-record service client.

use async_trait::async_trait;
use reqwest::Client;

use vframe_models::User;

use crate::config::{trim_base, ClientConfig};
use crate::error::{check_status, ClientResult};

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, user_id: &str) -> ClientResult<User>;
}

/// HTTP client for `/api/internal/users`.
#[derive(Clone)]
pub struct HttpUserServiceClient {
    http: Client,
    base_url: String,
}

impl HttpUserServiceClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            http: config.http_client()?,
            base_url: trim_base(&config.user_service_url),
        })
    }
}

#[async_trait]
impl UserService for HttpUserServiceClient {
    async fn get_user(&self, user_id: &str) -> ClientResult<User> {
        let url = format!("{}/api/internal/users/{}", self.base_url, user_id);
        let response = self.http.get(url).send().await?;
        let response = check_status(response, "user", user_id).await?;
        Ok(response.json().await?)
    }
}
