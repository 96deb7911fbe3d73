//! Pluggable text segmentation.
//!
//! The typing renderer reveals text one user-perceived character at a time,
//! so the delta buffer needs cluster boundaries for its aggregate text.
//! [`GraphemeSegmenter`] uses extended grapheme clusters; [`CodePointSegmenter`]
//! is a deterministic fallback that splits on every `char` and therefore may
//! separate combining marks from their base.

use std::fmt::Debug;
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into display units.
pub trait TextSegmenter: Send + Sync + Debug {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Byte offsets at which each unit of `text` ends, in increasing order.
    /// The last offset equals `text.len()` for non-empty text.
    fn boundaries(&self, text: &str) -> Vec<usize>;

    /// Number of units in `text`.
    fn count(&self, text: &str) -> usize {
        self.boundaries(text).len()
    }
}

/// Extended grapheme cluster segmentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphemeSegmenter;

impl TextSegmenter for GraphemeSegmenter {
    fn name(&self) -> &'static str {
        "grapheme"
    }

    fn boundaries(&self, text: &str) -> Vec<usize> {
        text.grapheme_indices(true)
            .map(|(start, cluster)| start + cluster.len())
            .collect()
    }
}

/// One unit per Unicode scalar value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodePointSegmenter;

impl TextSegmenter for CodePointSegmenter {
    fn name(&self) -> &'static str {
        "code-point"
    }

    fn boundaries(&self, text: &str) -> Vec<usize> {
        text.char_indices()
            .map(|(start, c)| start + c.len_utf8())
            .collect()
    }

    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// The segmenter used when none is configured.
#[must_use]
pub fn default_segmenter() -> Arc<dyn TextSegmenter> {
    Arc::new(GraphemeSegmenter)
}
