//! Streaming gateway adapter for OpenAI-compatible chat completion endpoints.

use crate::adapter::{byte_stream, check_response, AdapterKind, ProviderAdapter, ProviderOutput};
use crate::error::{ProviderError, ProviderResult};
use crate::retry::RateLimitRetry;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use shelfchat_core::{ChatMessage, ChatPayload};
use tracing::{debug, warn};

/// Default gateway base URL.
pub const DEFAULT_GATEWAY_URL: &str = "https://openrouter.ai/api/v1";

/// Default gateway model.
pub const DEFAULT_GATEWAY_MODEL: &str = "google/gemini-2.0-flash-exp:free";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Streaming gateway adapter.
///
/// Tries the primary model first and each fallback model in order when the
/// previous one does not answer successfully.
#[derive(Debug, Clone)]
pub struct GatewayAdapter {
    id: String,
    client: Client,
    base_url: String,
    api_key: String,
    models: Vec<String>,
    referer: Option<String>,
    title: String,
    retry: RateLimitRetry,
}

impl GatewayAdapter {
    /// Create a gateway adapter for the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            id: "gateway".to_string(),
            client: Client::new(),
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            api_key: api_key.into(),
            models: vec![DEFAULT_GATEWAY_MODEL.to_string()],
            referer: None,
            title: "Smart Shelf".to_string(),
            retry: RateLimitRetry::default(),
        }
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the primary model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        if self.models.is_empty() {
            self.models.push(model.into());
        } else {
            self.models[0] = model.into();
        }
        self
    }

    /// Add models tried after the primary one.
    #[must_use]
    pub fn with_fallback_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models.extend(models.into_iter().map(Into::into));
        self
    }

    /// Set the `HTTP-Referer` header.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Set the `X-Title` header.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
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

    /// Models in the order they are tried.
    #[must_use]
    pub fn models(&self) -> &[String] {
        &self.models
    }

    async fn open_model(&self, model: &str, payload: &ChatPayload) -> ProviderResult<Response> {
        let body = CompletionRequest {
            model,
            messages: &payload.messages,
            stream: true,
        };

        self.retry
            .run(&self.id, || async {
                let mut request = self
                    .client
                    .post(format!("{}/chat/completions", self.base_url))
                    .bearer_auth(&self.api_key)
                    .header("X-Title", &self.title);
                if let Some(referer) = &self.referer {
                    request = request.header("HTTP-Referer", referer);
                }
                let response = request.json(&body).send().await?;
                check_response(response).await
            })
            .await
    }
}

#[async_trait]
impl ProviderAdapter for GatewayAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::StreamingGateway
    }

    async fn open(&self, payload: &ChatPayload) -> ProviderResult<ProviderOutput> {
        let total = self.models.len();
        let mut last_error = None;

        for (i, model) in self.models.iter().enumerate() {
            debug!(provider = %self.id, model = %model, attempt = i + 1, total, "Opening gateway stream");

            match self.open_model(model, payload).await {
                Ok(response) => return Ok(ProviderOutput::Stream(byte_stream(response))),
                Err(error) => {
                    warn!(
                        provider = %self.id,
                        model = %model,
                        attempt = i + 1,
                        total,
                        error = %error,
                        "Gateway model failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::configuration("no gateway models configured")))
    }
}
