//! HTTP fetch client for the Jikan API.
//!
//! The gateway only depends on the [`FetchClient`] trait; the
//! reqwest-backed [`HttpClient`] is the production implementation.

use crate::api::types::ApiRequest;
use crate::error::ApiError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Collaborator that performs the actual HTTP call.
///
/// Given a request descriptor it returns the opaque response body, or an
/// [`ApiError`] classifying the failure. HTTP 429 must map to
/// [`ApiError::RateLimited`]; it is the sole signal the gateway retries on.
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, request: &ApiRequest) -> Result<Value, ApiError>;
}

/// Jikan API v4 HTTP client.
pub struct HttpClient {
    client: Client,
    base_url: String,
    /// Optional `Accept-Language` header attached to every request.
    accept_language: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client for the given base URL.
    pub fn new(base_url: impl Into<String>, accept_language: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("jikan-gateway/0.1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            accept_language,
        })
    }
}

#[async_trait]
impl FetchClient for HttpClient {
    async fn fetch(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, request.path());
        debug!(url = %url, "Making API request");

        let mut builder = self.client.get(&url).query(request.params());
        if let Some(language) = &self.accept_language {
            builder = builder.header(header::ACCEPT_LANGUAGE, language);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to parse response: {}", e)))
    }
}
