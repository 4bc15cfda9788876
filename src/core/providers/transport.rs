//! HTTP dispatch of resolved upstream requests

use super::ProviderError;
use super::context::UpstreamRequest;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Raw upstream reply; any HTTP status is a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Seconds from a `Retry-After` header
    pub retry_after: Option<u64>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Provider error message if the body carries one, else the raw text
    pub fn error_message(&self) -> String {
        let text = self.text();
        serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v["error"]["message"]
                    .as_str()
                    .or_else(|| v["message"].as_str())
                    .or_else(|| v["error"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or(text)
    }
}

/// Sends one upstream POST per attempt
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> std::result::Result<UpstreamResponse, ProviderError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn send(&self, request: &UpstreamRequest) -> std::result::Result<UpstreamResponse, ProviderError> {
        let response = self
            .client
            .post(request.url.clone())
            .headers(request.headers.clone())
            .json(&request.body)
            .send()
            .await
            .map_err(|e| ProviderError::network(request.provider, e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::network(request.provider, e.to_string()))?;

        Ok(UpstreamResponse {
            status,
            body: body.to_vec(),
            retry_after,
        })
    }
}
