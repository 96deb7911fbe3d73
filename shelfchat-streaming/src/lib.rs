//! # shelfchat-streaming
//!
//! Turns raw provider byte streams into a canonical stream of text deltas.
//!
//! ## Core Concepts
//!
//! - **[`FrameNormalizer`]**: parses SSE or newline-delimited JSON from byte
//!   chunks split at arbitrary points, detecting the framing once
//! - **[`TokenReconciler`]**: classifies frame text as incremental or a full
//!   snapshot and emits only text not yet emitted
//! - **[`DeltaBuffer`]**: the aggregate text of one attempt with its grapheme
//!   boundaries, shared with the renderer through [`SharedBuffer`]
//! - **[`TextSegmenter`]**: pluggable segmentation with a grapheme and a
//!   code-point implementation
//!
//! ## Example
//!
//! ```rust
//! use shelfchat_streaming::{DeltaBuffer, FrameNormalizer, TokenReconciler};
//!
//! let mut normalizer = FrameNormalizer::new();
//! let mut reconciler = TokenReconciler::new();
//! let mut buffer = DeltaBuffer::new();
//!
//! let raw = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
//!            data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
//!            data: [DONE]\n\n";
//!
//! for frame in normalizer.feed(raw.as_bytes()).unwrap() {
//!     buffer.append(&reconciler.reconcile(&frame)).unwrap();
//! }
//! buffer.close();
//!
//! assert_eq!(buffer.text(), "Hello");
//! assert_eq!(buffer.grapheme_count(), 5);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod error;
pub mod frame;
pub mod reconcile;
pub mod segment;
pub mod stream;

pub use buffer::{DeltaBuffer, SharedBuffer};
pub use error::{StreamError, StreamResult};
pub use frame::{FrameNormalizer, FramingMode, ParsedFrame};
pub use reconcile::{common_prefix_len, extract, Extracted, PayloadKind, TokenReconciler};
pub use segment::{default_segmenter, CodePointSegmenter, GraphemeSegmenter, TextSegmenter};
pub use stream::FrameStream;
