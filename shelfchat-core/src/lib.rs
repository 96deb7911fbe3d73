//! # shelfchat-core
//!
//! Core types shared by every shelfchat crate.
//!
//! - **Messages**: [`Message`] and [`Role`] as stored in a conversation, plus the
//!   outbound wire shape ([`ChatMessage`], [`ChatPayload`])
//! - **Conversations**: [`Conversation`], [`ConversationSummary`] and [`StorageMode`]
//! - **Identifiers**: type-safe [`ConversationId`] and [`MessageId`]
//! - **Grounding**: a small [`KnowledgeBase`] that renders the system message
//!   sent ahead of every exchange
//!
//! ## Example
//!
//! ```rust
//! use shelfchat_core::{ChatPayload, KnowledgeBase, Message, MessageId, Role};
//!
//! let history = vec![Message::new(MessageId(1), Role::User, "Where is the shelf map?", 0)];
//! let context = KnowledgeBase::default().build_context("Where is the shelf map?", None);
//!
//! let payload = ChatPayload::from_history(Some(context), &history, None);
//! assert_eq!(payload.messages[0].role, Role::System);
//! assert_eq!(payload.messages.len(), 2);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod conversation;
pub mod grounding;
pub mod identifier;
pub mod messages;

pub use conversation::{derive_title, Conversation, ConversationSummary, StorageMode, DEFAULT_TITLE};
pub use grounding::{KnowledgeBase, KnowledgeSection, Language};
pub use identifier::{now_utc, ConversationId, MessageId};
pub use messages::{ChatMessage, ChatPayload, Message, Role};
