//! Store error types.

use shelfchat_core::ConversationId;
use thiserror::Error;

/// Errors that can occur during store operations.
///
/// None of these end a chat exchange; callers log them and carry on with
/// the in-memory conversation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote backend needs a signed-in principal.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Conversation was not found.
    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    /// Non-success HTTP status from the remote backend.
    #[error("HTTP error {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Local blob I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("Storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::http(status.as_u16(), err.to_string()),
            None => Self::backend(err.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(StoreError::Unauthenticated.to_string(), "Not authenticated");
        assert_eq!(
            StoreError::http(500, "boom").to_string(),
            "HTTP error 500: boom"
        );
        assert_eq!(
            StoreError::NotFound(ConversationId::from_string("c1")).to_string(),
            "Conversation not found: c1"
        );
    }
}
