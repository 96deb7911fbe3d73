//! # shelfchat
//!
//! A streaming chat pipeline that stays responsive on top of unreliable,
//! rate-limited text providers.
//!
//! An exchange flows through these stages:
//!
//! 1. The [`FallbackOrchestrator`] opens providers in priority order
//!    (streaming relay, streaming gateway, single-shot generator).
//! 2. Raw frames are normalized and reconciled into a canonical delta stream
//!    ([`streaming`]).
//! 3. The [`TypingRenderer`] reveals the growing text one grapheme cluster
//!    at a time ([`render`]).
//! 4. The finished exchange is persisted by a [`ConversationStore`]
//!    ([`store`]).
//!
//! A failing provider's partial text is discarded before the next one is
//! tried, and only exhaustion of every provider reaches the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shelfchat::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ShelfchatConfig::from_env()?;
//!     let mut session = config.build_session(Arc::new(StaticAuth::anonymous()))?;
//!
//!     let reply = session.send("How do I add a book to my shelf?").await?;
//!     if let Some(message) = reply.message {
//!         println!("{}", message.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`shelfchat_core`] - messages, conversations, grounding context
//! - [`shelfchat_streaming`] - frame normalizer, token reconciler, delta buffer
//! - [`shelfchat_providers`] - provider adapters and rate-limit retry
//! - [`shelfchat_render`] - typing renderer
//! - [`shelfchat_store`] - local and remote conversation stores

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;

pub use shelfchat_core as core;
pub use shelfchat_providers as providers;
pub use shelfchat_render as render;
pub use shelfchat_store as store;
pub use shelfchat_streaming as streaming;

pub use config::{
    GatewayConfig, GeneratorConfig, RelayConfig, RemoteConfig, ShelfchatConfig,
    DEFAULT_LOCAL_PATH, DEFAULT_READ_TIMEOUT_SECS,
};
pub use error::{ChatError, ChatResult};
pub use orchestrator::{
    AttemptOutcome, ExchangeOutcome, FallbackOrchestrator, OrchestratorState, ProviderAttempt,
    DEFAULT_OPEN_TIMEOUT, DEFAULT_READ_TIMEOUT,
};
pub use session::{ChatReply, ChatSession};

pub use shelfchat_core::{
    Conversation, ConversationId, ConversationSummary, KnowledgeBase, Language, Message,
    MessageId, Role, StorageMode,
};
pub use shelfchat_providers::{
    GatewayAdapter, GeneratorAdapter, MockAdapter, ProviderAdapter, RelayAdapter,
};
pub use shelfchat_render::{TypingConfig, TypingPhase, TypingRenderer, TypingView};
pub use shelfchat_store::{
    AuthProvider, ConversationStore, LocalStore, Principal, RemoteStore, StaticAuth,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AuthProvider, ChatError, ChatReply, ChatResult, ChatSession, ConversationId,
        ConversationStore, FallbackOrchestrator, LocalStore, Message, ProviderAdapter, Role,
        ShelfchatConfig, StaticAuth, StorageMode, TypingPhase, TypingRenderer, TypingView,
    };
}
