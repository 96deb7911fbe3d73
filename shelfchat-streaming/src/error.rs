//! Streaming errors.

use thiserror::Error;

/// Errors that can occur while normalizing a byte stream.
///
/// Malformed frame payloads are not errors: they are dropped and counted by
/// the normalizer.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The retained fragment grew past the buffer limit.
    #[error("Frame buffer exceeded {limit} bytes")]
    BufferOverflow {
        /// Limit in bytes.
        limit: usize,
    },

    /// Operation not allowed in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Create an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StreamError::BufferOverflow { limit: 16 };
        assert_eq!(err.to_string(), "Frame buffer exceeded 16 bytes");

        let err = StreamError::invalid_state("buffer closed");
        assert_eq!(err.to_string(), "Invalid state: buffer closed");
    }
}
