//! Provider error types.

use shelfchat_streaming::StreamError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while opening or reading a provider.
///
/// Every variant is a soft failure from the exchange's point of view: the
/// orchestrator logs it and moves on to the next provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success HTTP status.
    #[error("HTTP error: {status} - {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response carried no body to stream.
    #[error("Response has no body")]
    MissingBody,

    /// The stream ended without visible text.
    #[error("Provider returned no visible text")]
    EmptyResponse,

    /// Rate limited by the API.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested retry delay.
        retry_after: Option<Duration>,
    },

    /// No data within the allowed time.
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error reported inside an otherwise successful response.
    #[error("API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Frame normalization error.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a rate limited error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(message.into())
    }

    /// Whether the request failed at the transport level (status, body,
    /// connection or timeout).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http { .. }
                | Self::MissingBody
                | Self::RateLimited { .. }
                | Self::Timeout(_)
                | Self::Connection(_)
        )
    }

    /// Whether this is a rate limit.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Get the retry-after duration if applicable.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(Duration::from_secs(30))
        } else if err.is_connect() {
            ProviderError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::http(status.as_u16(), err.to_string())
        } else if err.is_body() || err.is_decode() {
            ProviderError::Connection(err.to_string())
        } else {
            ProviderError::Other(err.into())
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(ProviderError::http(500, "boom").is_transport());
        assert!(ProviderError::MissingBody.is_transport());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(ProviderError::rate_limited(None).is_transport());

        assert!(!ProviderError::EmptyResponse.is_transport());
        assert!(!ProviderError::api("quota").is_transport());
    }

    #[test]
    fn test_retry_after() {
        let err = ProviderError::rate_limited(Some(Duration::from_secs(2)));
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(ProviderError::MissingBody.retry_after(), None);
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::http(404, "Not found");
        assert_eq!(err.to_string(), "HTTP error: 404 - Not found");

        let err: ProviderError = StreamError::invalid_state("closed").into();
        assert_eq!(err.to_string(), "Invalid state: closed");
    }
}
