//! # shelfchat-render
//!
//! Progressive reveal of streamed assistant replies.
//!
//! A [`TypingSession`] reveals a live [`SharedBuffer`](shelfchat_streaming::SharedBuffer)
//! one grapheme cluster at a time, faster when the backlog is long, and
//! finalizes once everything is shown and the stream has ended. The
//! [`TypingRenderer`] owns at most one session, ticks it on a Tokio interval
//! and publishes every [`TypingView`] in order to its subscribers.
//!
//! ## Example
//!
//! ```rust
//! use shelfchat_core::MessageId;
//! use shelfchat_render::{TypingRenderer, TypingPhase};
//! use shelfchat_streaming::SharedBuffer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let renderer = TypingRenderer::default();
//! let buffer = SharedBuffer::default();
//! buffer.append("Hello").unwrap();
//! buffer.close();
//!
//! renderer.start(MessageId(1), buffer);
//! let view = renderer.skip().unwrap();
//! assert_eq!(view.content, "Hello");
//! assert_eq!(view.phase, TypingPhase::Final);
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod renderer;
pub mod session;

pub use config::{step_for, TypingConfig, DEFAULT_CURSOR, DEFAULT_TICK_MS};
pub use renderer::{TypingRenderer, VIEW_CAPACITY};
pub use session::{TypingPhase, TypingSession, TypingView};
