//! Single-shot generator adapter (Gemini `generateContent`).
//!
//! Used as the last resort. The whole conversation is flattened into one
//! plain-text prompt and the answer arrives in a single response.

use crate::adapter::{check_response, AdapterKind, ProviderAdapter, ProviderOutput};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shelfchat_core::ChatPayload;
use std::time::Duration;
use tracing::debug;

/// Default generator base URL.
pub const DEFAULT_GENERATOR_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default generator model.
pub const DEFAULT_GENERATOR_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Single-shot generator adapter.
#[derive(Debug, Clone)]
pub struct GeneratorAdapter {
    id: String,
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeneratorAdapter {
    /// Create a generator adapter for the default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            id: "generator".to_string(),
            client: Client::new(),
            base_url: DEFAULT_GENERATOR_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_GENERATOR_MODEL.to_string(),
            timeout: Duration::from_secs(60),
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

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn build_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ProviderAdapter for GeneratorAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::SingleShot
    }

    async fn open(&self, payload: &ChatPayload) -> ProviderResult<ProviderOutput> {
        debug!(provider = %self.id, model = %self.model, "Requesting single-shot completion");

        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(payload.to_prompt()),
                }],
            }],
        };

        let response = self
            .client
            .post(self.build_url())
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| match ProviderError::from(e) {
                ProviderError::Timeout(_) => ProviderError::Timeout(self.timeout),
                other => other,
            })?;
        let response = check_response(response).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::api(format!("invalid generator response: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::api(error.message));
        }

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(ProviderOutput::Completed(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfchat_core::{ChatMessage, Role};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> ChatPayload {
        ChatPayload {
            messages: vec![
                ChatMessage::system("ctx"),
                ChatMessage::new(Role::User, "hi"),
            ],
        }
    }

    #[tokio::test]
    async fn test_generator_returns_completed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": "system: ctx\nuser: hi"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = GeneratorAdapter::new("g-key").with_base_url(server.uri());
        let output = generator.open(&payload()).await.unwrap();
        assert!(matches!(output, ProviderOutput::Completed(ref text) if text == "Hello"));
    }

    #[tokio::test]
    async fn test_generator_empty_candidates_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
            .mount(&server)
            .await;

        let generator = GeneratorAdapter::new("k").with_base_url(server.uri());
        let output = generator.open(&payload()).await.unwrap();
        assert!(matches!(output, ProviderOutput::Completed(ref text) if text.is_empty()));
    }

    #[tokio::test]
    async fn test_generator_explicit_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let generator = GeneratorAdapter::new("k").with_base_url(server.uri());
        let err = generator.open(&payload()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 400, .. }));
    }
}
