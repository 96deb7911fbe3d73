//! # shelfchat-store
//!
//! Conversation persistence for shelfchat.
//!
//! Two backends implement [`ConversationStore`]:
//!
//! - [`LocalStore`] keeps every conversation in one JSON blob under a single
//!   key, either in memory or in a file.
//! - [`RemoteStore`] talks to `conversations` and `messages` tables over a
//!   PostgREST-style HTTP API on behalf of the principal supplied by an
//!   [`AuthProvider`].
//!
//! ## Example
//!
//! ```rust
//! use shelfchat_core::{Message, MessageId};
//! use shelfchat_store::{ConversationStore, LocalStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), shelfchat_store::StoreError> {
//! let store = LocalStore::in_memory();
//! let id = store.create("Shelf help").await?;
//! store.append(&id, &Message::user(MessageId(1), "How do I add a book?", 0)).await?;
//!
//! assert_eq!(store.load(&id).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod local;
pub mod remote;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use local::{BlobBackend, FileBlob, LocalStore, MemoryBlob, DEFAULT_BLOB_KEY};
pub use remote::{AuthProvider, Principal, RemoteStore, StaticAuth, DELETE_ALL_RPC, LIST_ORDER};
pub use store::{ConversationStore, DEFAULT_LIST_LIMIT};
