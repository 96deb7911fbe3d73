//! Exchange-level errors.

use crate::orchestrator::ProviderAttempt;
use shelfchat_store::StoreError;
use shelfchat_streaming::StreamError;
use thiserror::Error;

/// Errors surfaced to the caller of a chat session.
///
/// Provider failures never appear here individually; they are absorbed by
/// the fallback orchestrator and only show up, collected, in
/// [`ChatError::AllProvidersExhausted`].
#[derive(Debug, Error)]
pub enum ChatError {
    /// The input was empty or whitespace only.
    #[error("Message is empty")]
    EmptyInput,

    /// Every configured provider failed.
    #[error("All {} providers failed", attempts.len())]
    AllProvidersExhausted {
        /// Attempt history in priority order.
        attempts: Vec<ProviderAttempt>,
    },

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Buffer misuse while driving an exchange.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A store operation requested directly by the caller failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChatError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the exchange failed because no provider answered.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::AllProvidersExhausted { .. })
    }
}

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
