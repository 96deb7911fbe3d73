//! Session configuration.
//!
//! Built programmatically or read from `CHAT_*` environment variables.
//! Providers whose credentials are missing are left out of the priority
//! list; the order is always relay, gateway, generator.

use crate::error::{ChatError, ChatResult};
use crate::orchestrator::{FallbackOrchestrator, DEFAULT_OPEN_TIMEOUT};
use crate::session::ChatSession;
use serde::{Deserialize, Serialize};
use shelfchat_core::{Language, StorageMode};
use shelfchat_providers::{
    GatewayAdapter, GeneratorAdapter, ProviderAdapter, RelayAdapter, DEFAULT_GATEWAY_MODEL,
    DEFAULT_GATEWAY_URL, DEFAULT_GENERATOR_MODEL,
};
use shelfchat_render::{TypingConfig, TypingRenderer};
use shelfchat_store::{AuthProvider, ConversationStore, LocalStore, RemoteStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default directory of the local conversation blob.
pub const DEFAULT_LOCAL_PATH: &str = ".shelfchat";

/// Default idle read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Streaming relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Endpoint URL.
    pub url: String,
    /// Publishable key sent as bearer token and `apikey`.
    pub key: String,
}

/// OpenAI-compatible streaming gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL.
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// API key.
    pub key: String,
    /// Primary model.
    #[serde(default = "default_gateway_model")]
    pub model: String,
    /// Models tried after the primary one fails.
    #[serde(default)]
    pub fallback_models: Vec<String>,
}

/// Single-shot generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// API key.
    pub key: String,
    /// Model name.
    #[serde(default = "default_generator_model")]
    pub model: String,
}

/// Remote conversation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL.
    pub url: String,
    /// Public API key.
    pub key: String,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_gateway_model() -> String {
    DEFAULT_GATEWAY_MODEL.to_string()
}

fn default_generator_model() -> String {
    DEFAULT_GENERATOR_MODEL.to_string()
}

/// Everything needed to assemble a [`ChatSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfchatConfig {
    /// Persistence backend.
    pub storage: StorageMode,
    /// Streaming relay, tried first.
    pub relay: Option<RelayConfig>,
    /// Streaming gateway, tried second.
    pub gateway: Option<GatewayConfig>,
    /// Single-shot generator, tried last.
    pub generator: Option<GeneratorConfig>,
    /// Remote store settings, required for remote storage.
    pub remote: Option<RemoteConfig>,
    /// Directory of the local blob.
    pub local_path: PathBuf,
    /// Idle timeout between stream reads, in seconds.
    pub read_timeout_secs: u64,
    /// Typing pace and cursor.
    pub typing: TypingConfig,
    /// Forced reply language; detected from input when unset.
    pub language: Option<Language>,
    /// Number of trailing messages sent as history; all when unset.
    pub history_window: Option<usize>,
}

impl Default for ShelfchatConfig {
    fn default() -> Self {
        Self {
            storage: StorageMode::Local,
            relay: None,
            gateway: None,
            generator: None,
            remote: None,
            local_path: PathBuf::from(DEFAULT_LOCAL_PATH),
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            typing: TypingConfig::default(),
            language: None,
            history_window: None,
        }
    }
}

impl ShelfchatConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns the value of a
    /// variable if set. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ChatResult<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(storage) = var("CHAT_STORAGE") {
            config.storage = storage.parse().map_err(ChatError::Configuration)?;
        }
        if let (Some(url), Some(key)) = (var("CHAT_RELAY_URL"), var("CHAT_RELAY_KEY")) {
            config.relay = Some(RelayConfig { url, key });
        }
        if let Some(key) = var("CHAT_GATEWAY_KEY") {
            config.gateway = Some(GatewayConfig {
                url: var("CHAT_GATEWAY_URL").unwrap_or_else(default_gateway_url),
                key,
                model: var("CHAT_GATEWAY_MODEL").unwrap_or_else(default_gateway_model),
                fallback_models: var("CHAT_GATEWAY_FALLBACK_MODELS")
                    .map(|list| {
                        list.split(',')
                            .map(str::trim)
                            .filter(|m| !m.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            });
        }
        if let Some(key) = var("CHAT_GENERATOR_KEY") {
            config.generator = Some(GeneratorConfig {
                key,
                model: var("CHAT_GENERATOR_MODEL").unwrap_or_else(default_generator_model),
            });
        }
        if let (Some(url), Some(key)) = (var("CHAT_REMOTE_URL"), var("CHAT_REMOTE_KEY")) {
            config.remote = Some(RemoteConfig { url, key });
        }
        if let Some(path) = var("CHAT_LOCAL_PATH") {
            config.local_path = PathBuf::from(path);
        }
        if let Some(secs) = var("CHAT_READ_TIMEOUT_SECS") {
            config.read_timeout_secs = parse_number("CHAT_READ_TIMEOUT_SECS", &secs)?;
        }
        if let Some(ms) = var("CHAT_TYPING_TICK_MS") {
            config.typing.tick_ms = parse_number("CHAT_TYPING_TICK_MS", &ms)?;
        }
        if let Some(language) = var("CHAT_LANGUAGE") {
            config.language = Some(language.parse().map_err(ChatError::Configuration)?);
        }

        Ok(config)
    }

    /// Set the storage backend.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageMode) -> Self {
        self.storage = storage;
        self
    }

    /// Configure the streaming relay.
    #[must_use]
    pub fn with_relay(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.relay = Some(RelayConfig {
            url: url.into(),
            key: key.into(),
        });
        self
    }

    /// Configure the streaming gateway with its default URL and model.
    #[must_use]
    pub fn with_gateway(mut self, key: impl Into<String>) -> Self {
        self.gateway = Some(GatewayConfig {
            url: default_gateway_url(),
            key: key.into(),
            model: default_gateway_model(),
            fallback_models: Vec::new(),
        });
        self
    }

    /// Configure the single-shot generator with its default model.
    #[must_use]
    pub fn with_generator(mut self, key: impl Into<String>) -> Self {
        self.generator = Some(GeneratorConfig {
            key: key.into(),
            model: default_generator_model(),
        });
        self
    }

    /// Configure the remote store.
    #[must_use]
    pub fn with_remote(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.remote = Some(RemoteConfig {
            url: url.into(),
            key: key.into(),
        });
        self
    }

    /// Set the local blob directory.
    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = path.into();
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the typing configuration.
    #[must_use]
    pub fn with_typing(mut self, typing: TypingConfig) -> Self {
        self.typing = typing;
        self
    }

    /// Idle timeout between stream reads.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.max(1))
    }

    /// Adapters in priority order.
    pub fn providers(&self) -> ChatResult<Vec<Arc<dyn ProviderAdapter>>> {
        let mut providers: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        if let Some(relay) = &self.relay {
            validate_url("relay", &relay.url)?;
            providers.push(Arc::new(RelayAdapter::new(&relay.url, &relay.key)));
        }
        if let Some(gateway) = &self.gateway {
            validate_url("gateway", &gateway.url)?;
            providers.push(Arc::new(
                GatewayAdapter::new(&gateway.key)
                    .with_base_url(&gateway.url)
                    .with_model(&gateway.model)
                    .with_fallback_models(gateway.fallback_models.iter().cloned()),
            ));
        }
        if let Some(generator) = &self.generator {
            providers.push(Arc::new(
                GeneratorAdapter::new(&generator.key)
                    .with_model(&generator.model)
                    .with_timeout(DEFAULT_OPEN_TIMEOUT),
            ));
        }

        if providers.is_empty() {
            return Err(ChatError::configuration(
                "no provider configured: set a relay, gateway or generator",
            ));
        }
        debug!(
            providers = ?providers.iter().map(|p| p.id()).collect::<Vec<_>>(),
            "Configured providers"
        );
        Ok(providers)
    }

    /// The conversation store for the configured backend.
    ///
    /// `auth` supplies the principal for remote storage and is ignored for
    /// local storage.
    pub fn store(&self, auth: Arc<dyn AuthProvider>) -> ChatResult<Arc<dyn ConversationStore>> {
        match self.storage {
            StorageMode::Local => Ok(Arc::new(LocalStore::in_dir(&self.local_path))),
            StorageMode::Remote => {
                let remote = self.remote.as_ref().ok_or_else(|| {
                    ChatError::configuration("remote storage needs CHAT_REMOTE_URL and CHAT_REMOTE_KEY")
                })?;
                validate_url("remote store", &remote.url)?;
                Ok(Arc::new(RemoteStore::new(&remote.url, &remote.key, auth)))
            }
        }
    }

    /// Assemble a session.
    pub fn build_session(&self, auth: Arc<dyn AuthProvider>) -> ChatResult<ChatSession> {
        let renderer = TypingRenderer::new(self.typing.clone());
        let orchestrator =
            FallbackOrchestrator::new(self.providers()?, renderer).with_read_timeout(self.read_timeout());
        Ok(ChatSession::new(orchestrator, self.store(auth)?)
            .with_language(self.language)
            .with_history_window(self.history_window))
    }
}

fn validate_url(what: &str, raw: &str) -> ChatResult<()> {
    let url = Url::parse(raw).map_err(|e| ChatError::configuration(format!("invalid {what} URL {raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ChatError::configuration(format!(
            "unsupported {what} URL scheme: {other}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> ChatResult<T> {
    raw.parse()
        .map_err(|_| ChatError::configuration(format!("{key} must be a number, got {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelfchat_store::StaticAuth;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ShelfchatConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ShelfchatConfig::default());
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
        assert!(matches!(
            config.providers(),
            Err(ChatError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_env_vars() {
        let config = ShelfchatConfig::from_lookup(lookup(&[
            ("CHAT_STORAGE", "remote"),
            ("CHAT_RELAY_URL", "https://relay.example/functions/v1/chat"),
            ("CHAT_RELAY_KEY", "pk"),
            ("CHAT_GATEWAY_KEY", "gk"),
            ("CHAT_GATEWAY_FALLBACK_MODELS", "openai/gpt-4o-mini, ,anthropic/claude-3-haiku:free"),
            ("CHAT_GENERATOR_KEY", "  "),
            ("CHAT_READ_TIMEOUT_SECS", "12"),
            ("CHAT_TYPING_TICK_MS", "20"),
            ("CHAT_LANGUAGE", "ar"),
        ]))
        .unwrap();

        assert_eq!(config.storage, StorageMode::Remote);
        assert_eq!(config.relay.as_ref().unwrap().key, "pk");
        let gateway = config.gateway.as_ref().unwrap();
        assert_eq!(gateway.url, DEFAULT_GATEWAY_URL);
        assert_eq!(gateway.model, DEFAULT_GATEWAY_MODEL);
        assert_eq!(
            gateway.fallback_models,
            vec!["openai/gpt-4o-mini", "anthropic/claude-3-haiku:free"]
        );
        assert!(config.generator.is_none());
        assert_eq!(config.read_timeout(), Duration::from_secs(12));
        assert_eq!(config.typing.tick_ms, 20);
        assert_eq!(config.language, Some(Language::Ar));

        let ids: Vec<String> = config
            .providers()
            .unwrap()
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(ids, vec!["relay", "gateway"]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ShelfchatConfig::from_lookup(lookup(&[("CHAT_STORAGE", "cloud")])).is_err());
        assert!(ShelfchatConfig::from_lookup(lookup(&[("CHAT_TYPING_TICK_MS", "fast")])).is_err());

        let config = ShelfchatConfig::new().with_relay("not a url", "k");
        assert!(matches!(config.providers(), Err(ChatError::Configuration(_))));
    }

    #[test]
    fn test_remote_storage_requires_settings() {
        let auth: Arc<dyn AuthProvider> = Arc::new(StaticAuth::anonymous());
        let config = ShelfchatConfig::new()
            .with_generator("k")
            .with_storage(StorageMode::Remote);
        assert!(config.store(auth.clone()).is_err());

        let store = config
            .with_remote("https://project.example", "anon")
            .store(auth)
            .unwrap();
        assert_eq!(store.mode(), StorageMode::Remote);
    }

    #[test]
    fn test_build_session_with_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let session = ShelfchatConfig::new()
            .with_generator("k")
            .with_local_path(dir.path())
            .build_session(Arc::new(StaticAuth::anonymous()))
            .unwrap();
        assert_eq!(session.storage_mode(), StorageMode::Local);
        assert_eq!(session.orchestrator().provider_ids(), vec!["generator"]);
    }
}
