//! Stream adapter from raw byte chunks to parsed frames.

use crate::error::StreamError;
use crate::frame::{FrameNormalizer, ParsedFrame};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

pin_project! {
    /// Parses frames out of a byte stream.
    ///
    /// Transport errors from the inner stream are passed through unchanged;
    /// normalizer errors are converted with `From<StreamError>`. When the inner
    /// stream ends the retained fragment is flushed as a final frame.
    pub struct FrameStream<S> {
        #[pin]
        inner: S,
        normalizer: FrameNormalizer,
        pending: VecDeque<ParsedFrame>,
        finished: bool,
    }
}

impl<S> FrameStream<S> {
    /// Create a frame stream with auto-detected framing.
    pub fn new(inner: S) -> Self {
        Self::with_normalizer(inner, FrameNormalizer::new())
    }

    /// Create a frame stream with a preconfigured normalizer.
    pub fn with_normalizer(inner: S, normalizer: FrameNormalizer) -> Self {
        Self {
            inner,
            normalizer,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// The underlying normalizer.
    pub fn normalizer(&self) -> &FrameNormalizer {
        &self.normalizer
    }
}

impl<S, E> Stream for FrameStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: From<StreamError>,
{
    type Item = Result<ParsedFrame, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if *this.finished {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(bytes)) => match this.normalizer.feed(&bytes) {
                    Ok(frames) => this.pending.extend(frames),
                    Err(error) => {
                        *this.finished = true;
                        return Poll::Ready(Some(Err(error.into())));
                    }
                },
                Some(Err(error)) => return Poll::Ready(Some(Err(error))),
                None => {
                    *this.finished = true;
                    match this.normalizer.finish() {
                        Ok(frames) => this.pending.extend(frames),
                        Err(error) => return Poll::Ready(Some(Err(error.into()))),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_frame_stream_yields_frames_and_flushes() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"{\"token\":\"a\"}\n{\"to")),
            Ok(Bytes::from_static(b"ken\":\"b\"}")),
        ];
        let frames: Vec<ParsedFrame> = FrameStream::new(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(frames, vec![json!({"token": "a"}), json!({"token": "b"})]);
    }

    #[tokio::test]
    async fn test_frame_stream_passes_transport_errors() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"data: {\"text\":\"a\"}\n\n")),
            Err(StreamError::Io(std::io::Error::other("reset"))),
        ];
        let mut frames = FrameStream::new(stream::iter(chunks));

        assert_eq!(frames.next().await.unwrap().unwrap(), json!({"text": "a"}));
        assert!(matches!(frames.next().await, Some(Err(StreamError::Io(_)))));
        assert!(frames.next().await.is_none());
    }
}
