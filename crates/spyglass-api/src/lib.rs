//! HTTP collaborator for the thread service's cancellation endpoints.
//!
//! This sits outside the feed core: it is a plain request/response client
//! with no retry logic, used fire-and-forget when the observer wants a
//! running task stopped.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ThreadApiConfig {
    /// `http://` or `https://` base URL of the thread service.
    pub base_url: String,
    /// Bearer credential for the `Authorization` header.
    pub access_token: String,
    pub timeout_ms: u64,
}

impl ThreadApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("thread_api_base_url_missing")]
    BaseUrlMissing,
    #[error("thread_api_request_failed:{message}")]
    Request { message: String },
    #[error("thread_api_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
}

/// Typed client for the thread cancellation endpoints.
#[derive(Debug, Clone)]
pub struct ThreadApiClient {
    base_url: String,
    access_token: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl ThreadApiClient {
    pub fn new(config: ThreadApiConfig) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            access_token: config.access_token,
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn cancel_task_path(thread_id: &str) -> String {
        format!("/apps/threads/{}/cancel_task", thread_id.trim())
    }

    #[must_use]
    pub fn cancel_all_path() -> &'static str {
        "/apps/threads/cancel_all_running_tasks"
    }

    /// Ask the service to cancel the running task on one thread.
    pub async fn cancel_task(&self, thread_id: &str) -> Result<(), ApiError> {
        self.post_empty(Self::cancel_task_path(thread_id).as_str())
            .await
    }

    /// Ask the service to cancel every running task for this credential.
    pub async fn cancel_all_running_tasks(&self) -> Result<(), ApiError> {
        self.post_empty(Self::cancel_all_path()).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .timeout(self.timeout)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|error| ApiError::Request {
                message: error.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let body = if body.trim().is_empty() {
            "<empty>".to_string()
        } else {
            body.trim().to_string()
        };
        Err(ApiError::Http { status, body })
    }
}

fn normalize_base_url(base_url: &str) -> Result<String, ApiError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers_are_deterministic() {
        assert_eq!(
            ThreadApiClient::cancel_task_path("t-42"),
            "/apps/threads/t-42/cancel_task"
        );
        assert_eq!(
            ThreadApiClient::cancel_task_path("  t-42  "),
            "/apps/threads/t-42/cancel_task"
        );
        assert_eq!(
            ThreadApiClient::cancel_all_path(),
            "/apps/threads/cancel_all_running_tasks"
        );
    }

    #[test]
    fn base_url_is_normalized() {
        let client = ThreadApiClient::new(ThreadApiConfig::new(
            "https://api.example.com/",
            "token",
        ))
        .expect("client");
        assert_eq!(client.base_url, "https://api.example.com");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let result = ThreadApiClient::new(ThreadApiConfig::new("   ", "token"));
        assert!(matches!(result, Err(ApiError::BaseUrlMissing)));
    }

    #[test]
    fn timeout_has_a_floor() {
        let mut config = ThreadApiConfig::new("https://api.example.com", "token");
        config.timeout_ms = 1;
        let client = ThreadApiClient::new(config).expect("client");
        assert_eq!(client.timeout, Duration::from_millis(250));
    }
}
