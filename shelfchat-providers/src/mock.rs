//! Scriptable adapter for tests and offline demos.

use crate::adapter::{AdapterKind, ByteStream, ProviderAdapter, ProviderOutput};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use shelfchat_core::ChatPayload;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a [`MockAdapter`] does when opened.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Fail with the given HTTP status.
    HttpFailure(u16),
    /// Stream the given raw chunks, then end.
    Stream(Vec<String>),
    /// Stream the given raw chunks, then fail with a connection error.
    StreamThenFail(Vec<String>),
    /// Open successfully and never produce a chunk.
    Stall,
    /// Return one completed text.
    Completed(String),
}

/// An adapter that replays a scripted behavior and counts calls.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    id: String,
    kind: AdapterKind,
    behavior: MockBehavior,
    chunk_delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    last_payload: Arc<Mutex<Option<ChatPayload>>>,
}

impl MockAdapter {
    /// Create a mock with explicit kind and behavior.
    pub fn new(id: impl Into<String>, kind: AdapterKind, behavior: MockBehavior) -> Self {
        Self {
            id: id.into(),
            kind,
            behavior,
            chunk_delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            last_payload: Arc::new(Mutex::new(None)),
        }
    }

    /// A streaming mock that fails with `status`.
    pub fn failing(id: impl Into<String>, status: u16) -> Self {
        Self::new(id, AdapterKind::StreamingRelay, MockBehavior::HttpFailure(status))
    }

    /// A streaming mock replaying raw `chunks`.
    pub fn streaming<I, S>(id: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = chunks.into_iter().map(Into::into).collect();
        Self::new(id, AdapterKind::StreamingGateway, MockBehavior::Stream(chunks))
    }

    /// A streaming mock emitting one SSE token frame per text, then `[DONE]`.
    pub fn sse_tokens<I, S>(id: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut chunks: Vec<String> = tokens
            .into_iter()
            .map(|t| {
                let frame = serde_json::json!({"choices": [{"delta": {"content": t.as_ref()}}]});
                format!("data: {frame}\n\n")
            })
            .collect();
        chunks.push("data: [DONE]\n\n".to_string());
        Self::new(id, AdapterKind::StreamingGateway, MockBehavior::Stream(chunks))
    }

    /// A single-shot mock returning `text`.
    pub fn completed(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, AdapterKind::SingleShot, MockBehavior::Completed(text.into()))
    }

    /// A streaming mock that opens and then never yields.
    pub fn stalled(id: impl Into<String>) -> Self {
        Self::new(id, AdapterKind::StreamingRelay, MockBehavior::Stall)
    }

    /// Wait this long before each chunk.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Number of times `open` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter, usable after the adapter is boxed.
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Payload of the most recent `open`.
    #[must_use]
    pub fn last_payload(&self) -> Option<ChatPayload> {
        self.last_payload.lock().clone()
    }

    /// Shared handle to the most recent payload.
    #[must_use]
    pub fn payload_log(&self) -> Arc<Mutex<Option<ChatPayload>>> {
        Arc::clone(&self.last_payload)
    }

    fn chunk_stream(&self, chunks: Vec<String>, fail_at_end: bool) -> ByteStream {
        let items = chunks
            .into_iter()
            .map(|c| Ok(Bytes::from(c)))
            .chain(fail_at_end.then(|| Err(ProviderError::Connection("connection reset".into()))));
        let delay = self.chunk_delay;
        Box::pin(stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        }))
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AdapterKind {
        self.kind
    }

    async fn open(&self, payload: &ChatPayload) -> ProviderResult<ProviderOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock() = Some(payload.clone());

        match &self.behavior {
            MockBehavior::HttpFailure(status) => {
                Err(ProviderError::http(*status, "mock failure"))
            }
            MockBehavior::Stream(chunks) => {
                Ok(ProviderOutput::Stream(self.chunk_stream(chunks.clone(), false)))
            }
            MockBehavior::StreamThenFail(chunks) => {
                Ok(ProviderOutput::Stream(self.chunk_stream(chunks.clone(), true)))
            }
            MockBehavior::Stall => Ok(ProviderOutput::Stream(Box::pin(stream::pending()))),
            MockBehavior::Completed(text) => Ok(ProviderOutput::Completed(text.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfchat_core::{ChatMessage, Role};

    fn payload() -> ChatPayload {
        ChatPayload {
            messages: vec![ChatMessage::new(Role::User, "hi")],
        }
    }

    #[tokio::test]
    async fn test_mock_counts_calls_and_records_payload() {
        let mock = MockAdapter::failing("a", 500);
        let counter = mock.call_counter();

        assert!(mock.open(&payload()).await.is_err());
        assert!(mock.open(&payload()).await.is_err());

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(mock.last_payload(), Some(payload()));
    }

    #[tokio::test]
    async fn test_sse_tokens_stream() {
        let mock = MockAdapter::sse_tokens("b", ["Hel", "lo"]);
        let ProviderOutput::Stream(stream) = mock.open(&payload()).await.unwrap() else {
            panic!("expected a stream");
        };
        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks[0],
            Bytes::from("data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n")
        );
        assert_eq!(chunks[2], Bytes::from("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_stream_then_fail() {
        let mock = MockAdapter::new(
            "c",
            AdapterKind::StreamingRelay,
            MockBehavior::StreamThenFail(vec!["data: {}\n\n".into()]),
        );
        let ProviderOutput::Stream(stream) = mock.open(&payload()).await.unwrap() else {
            panic!("expected a stream");
        };
        let items: Vec<ProviderResult<Bytes>> = stream.collect().await;
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ProviderError::Connection(_))));
    }
}
