//! The provider adapter trait.

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use shelfchat_core::ChatPayload;
use std::fmt::Debug;
use std::pin::Pin;
use std::time::Duration;

/// Raw response bytes of a streaming provider.
pub type ByteStream = Pin<Box<dyn Stream<Item = ProviderResult<Bytes>> + Send>>;

/// What an opened provider hands back.
pub enum ProviderOutput {
    /// Raw frames still to be normalized.
    Stream(ByteStream),
    /// One completed text, already final.
    Completed(String),
}

impl Debug for ProviderOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("ProviderOutput::Stream(..)"),
            Self::Completed(text) => f.debug_tuple("ProviderOutput::Completed").field(text).finish(),
        }
    }
}

/// Adapter variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Managed intermediary forwarding SSE frames.
    StreamingRelay,
    /// OpenAI-compatible streaming endpoint.
    StreamingGateway,
    /// Non-streaming generator answering in one round trip.
    SingleShot,
}

impl AdapterKind {
    /// Whether the adapter yields a frame stream.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        !matches!(self, Self::SingleShot)
    }
}

/// A text provider that can be opened with a conversation payload.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + Debug {
    /// Identifier used in logs and attempt history.
    fn id(&self) -> &str;

    /// Adapter variant.
    fn kind(&self) -> AdapterKind;

    /// Send the payload. Errors are soft failures.
    async fn open(&self, payload: &ChatPayload) -> ProviderResult<ProviderOutput>;
}

/// Turn a non-success response into an error, keeping successful ones.
pub(crate) async fn check_response(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::rate_limited(retry_after));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::http(status.as_u16(), body));
    }
    if response.content_length() == Some(0) {
        return Err(ProviderError::MissingBody);
    }
    Ok(response)
}

/// Body of a successful streaming response.
pub(crate) fn byte_stream(response: Response) -> ByteStream {
    Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProviderError::from)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_streaming() {
        assert!(AdapterKind::StreamingRelay.is_streaming());
        assert!(AdapterKind::StreamingGateway.is_streaming());
        assert!(!AdapterKind::SingleShot.is_streaming());
    }

    #[test]
    fn test_output_debug() {
        let output = ProviderOutput::Completed("hi".into());
        assert_eq!(format!("{output:?}"), "ProviderOutput::Completed(\"hi\")");
    }
}
