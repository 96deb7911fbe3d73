//! Streaming relay adapter.
//!
//! The relay is a managed edge function that proxies to an upstream model
//! and forwards its SSE frames unchanged. It authenticates with the project's
//! publishable key, sent both as bearer token and as `apikey`.

use crate::adapter::{byte_stream, check_response, AdapterKind, ProviderAdapter, ProviderOutput};
use crate::error::ProviderResult;
use crate::retry::RateLimitRetry;
use async_trait::async_trait;
use reqwest::Client;
use shelfchat_core::ChatPayload;
use tracing::debug;

/// Streaming relay adapter.
#[derive(Debug, Clone)]
pub struct RelayAdapter {
    id: String,
    client: Client,
    url: String,
    api_key: String,
    retry: RateLimitRetry,
}

impl RelayAdapter {
    /// Create a relay adapter posting to `url`.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: "relay".to_string(),
            client: Client::new(),
            url: url.into(),
            api_key: api_key.into(),
            retry: RateLimitRetry::default(),
        }
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Set the rate-limit retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RateLimitRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProviderAdapter for RelayAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::StreamingRelay
    }

    async fn open(&self, payload: &ChatPayload) -> ProviderResult<ProviderOutput> {
        debug!(provider = %self.id, messages = payload.messages.len(), "Opening relay stream");

        let response = self
            .retry
            .run(&self.id, || async {
                let response = self
                    .client
                    .post(&self.url)
                    .bearer_auth(&self.api_key)
                    .header("apikey", &self.api_key)
                    .json(payload)
                    .send()
                    .await?;
                check_response(response).await
            })
            .await?;

        Ok(ProviderOutput::Stream(byte_stream(response)))
    }
}
