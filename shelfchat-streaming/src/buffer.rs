//! The per-exchange delta buffer.

use crate::error::{StreamError, StreamResult};
use crate::segment::{default_segmenter, TextSegmenter};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Cumulative canonical text of one provider attempt, with its grapheme
/// boundaries.
///
/// The text only grows. After every append the boundaries are recomputed
/// from the start of the last cluster, so an appended combining mark joins
/// the cluster it belongs to instead of becoming a unit of its own.
#[derive(Debug)]
pub struct DeltaBuffer {
    text: String,
    ends: Vec<usize>,
    closed: bool,
    segmenter: Arc<dyn TextSegmenter>,
}

impl Default for DeltaBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaBuffer {
    /// Create an empty buffer using grapheme segmentation.
    #[must_use]
    pub fn new() -> Self {
        Self::with_segmenter(default_segmenter())
    }

    /// Create an empty buffer using the given segmenter.
    #[must_use]
    pub fn with_segmenter(segmenter: Arc<dyn TextSegmenter>) -> Self {
        Self {
            text: String::new(),
            ends: Vec::new(),
            closed: false,
            segmenter,
        }
    }

    /// Create a buffer that already holds `text` and is closed.
    #[must_use]
    pub fn completed(text: impl Into<String>, segmenter: Arc<dyn TextSegmenter>) -> Self {
        let text = text.into();
        let ends = segmenter.boundaries(&text);
        Self {
            text,
            ends,
            closed: true,
            segmenter,
        }
    }

    /// Append a delta.
    pub fn append(&mut self, delta: &str) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::invalid_state("append to a closed delta buffer"));
        }
        if delta.is_empty() {
            return Ok(());
        }
        // Only the last cluster can absorb appended text.
        let start = match self.ends.len() {
            0 | 1 => 0,
            n => self.ends[n - 2],
        };
        self.ends.truncate(self.ends.len().saturating_sub(1));
        self.text.push_str(delta);
        let tail = self.segmenter.boundaries(&self.text[start..]);
        self.ends.extend(tail.into_iter().map(|end| start + end));
        Ok(())
    }

    /// Mark the stream as ended. No further appends are accepted.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether the stream has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The aggregate text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of grapheme clusters in the aggregate.
    #[must_use]
    pub fn grapheme_count(&self) -> usize {
        self.ends.len()
    }

    /// The first `count` clusters. Saturates at the full text.
    #[must_use]
    pub fn prefix(&self, count: usize) -> &str {
        match count {
            0 => "",
            n if n >= self.ends.len() => &self.text,
            n => &self.text[..self.ends[n - 1]],
        }
    }

    /// Whether nothing visible has been produced.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Name of the segmenter in use.
    #[must_use]
    pub fn segmenter_name(&self) -> &'static str {
        self.segmenter.name()
    }
}

/// A [`DeltaBuffer`] shared between the exchange driver (writer) and the
/// typing renderer (reader).
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<RwLock<DeltaBuffer>>,
}

impl SharedBuffer {
    /// Wrap a buffer.
    #[must_use]
    pub fn new(buffer: DeltaBuffer) -> Self {
        Self {
            inner: Arc::new(RwLock::new(buffer)),
        }
    }

    /// Acquire a read guard.
    pub fn read(&self) -> RwLockReadGuard<'_, DeltaBuffer> {
        self.inner.read()
    }

    /// Acquire a write guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, DeltaBuffer> {
        self.inner.write()
    }

    /// Append a delta.
    pub fn append(&self, delta: &str) -> StreamResult<()> {
        self.inner.write().append(delta)
    }

    /// Mark the stream as ended.
    pub fn close(&self) {
        self.inner.write().close();
    }

    /// Copy of the aggregate text.
    #[must_use]
    pub fn text(&self) -> String {
        self.inner.read().text().to_string()
    }

    /// Number of grapheme clusters.
    #[must_use]
    pub fn grapheme_count(&self) -> usize {
        self.inner.read().grapheme_count()
    }

    /// Whether the stream has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.read().is_closed()
    }

    /// Whether both handles point to the same buffer.
    #[must_use]
    pub fn same_as(&self, other: &SharedBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
