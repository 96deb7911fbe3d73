//! # shelfchat-providers
//!
//! Provider adapters behind one capability: `open(payload)` yields either a
//! raw frame stream or a single completed text.
//!
//! | Adapter | Kind | Wire |
//! |---------|------|------|
//! | [`RelayAdapter`] | streaming relay | SSE forwarded by an edge function |
//! | [`GatewayAdapter`] | streaming gateway | OpenAI-compatible `chat/completions`, `stream: true` |
//! | [`GeneratorAdapter`] | single shot | Gemini `generateContent` |
//!
//! Streaming adapters retry rate limits with [`RateLimitRetry`]; the gateway
//! additionally walks a list of fallback models.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shelfchat_core::{ChatMessage, ChatPayload, Role};
//! use shelfchat_providers::{GatewayAdapter, ProviderAdapter, ProviderOutput};
//!
//! # async fn run() -> Result<(), shelfchat_providers::ProviderError> {
//! let gateway = GatewayAdapter::new("sk-or-...").with_fallback_models(["openai/gpt-4o-mini"]);
//! let payload = ChatPayload {
//!     messages: vec![ChatMessage::new(Role::User, "Where is the shelf map?")],
//! };
//!
//! match gateway.open(&payload).await? {
//!     ProviderOutput::Stream(_bytes) => { /* feed a FrameNormalizer */ }
//!     ProviderOutput::Completed(text) => println!("{text}"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod error;
pub mod gateway;
pub mod generator;
pub mod mock;
pub mod relay;
pub mod retry;

pub use adapter::{AdapterKind, ByteStream, ProviderAdapter, ProviderOutput};
pub use error::{ProviderError, ProviderResult};
pub use gateway::{GatewayAdapter, DEFAULT_GATEWAY_MODEL, DEFAULT_GATEWAY_URL};
pub use generator::{GeneratorAdapter, DEFAULT_GENERATOR_MODEL, DEFAULT_GENERATOR_URL};
pub use mock::{MockAdapter, MockBehavior};
pub use relay::RelayAdapter;
pub use retry::RateLimitRetry;
