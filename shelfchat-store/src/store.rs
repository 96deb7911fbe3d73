//! The conversation store contract.

use crate::error::StoreResult;
use async_trait::async_trait;
use shelfchat_core::{ConversationId, ConversationSummary, Message, StorageMode};

/// Default number of conversations returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Persistence of conversations and their messages.
///
/// Both backends implement the same contract. Failures are reported but are
/// never meant to interrupt a chat exchange.
#[async_trait]
pub trait ConversationStore: Send + Sync + std::fmt::Debug {
    /// Which backend this is.
    fn mode(&self) -> StorageMode;

    /// Create an empty conversation and return its identifier.
    async fn create(&self, title: &str) -> StoreResult<ConversationId>;

    /// Append a message to a conversation.
    async fn append(&self, id: &ConversationId, message: &Message) -> StoreResult<()>;

    /// Up to `limit` conversations, most recently updated first.
    async fn list(&self, limit: usize) -> StoreResult<Vec<ConversationSummary>>;

    /// Display title of a conversation, [`DEFAULT_TITLE`](shelfchat_core::DEFAULT_TITLE)
    /// when none is stored.
    async fn title(&self, id: &ConversationId) -> StoreResult<String>;

    /// Messages of a conversation in order.
    async fn load(&self, id: &ConversationId) -> StoreResult<Vec<Message>>;

    /// Delete a conversation and its messages.
    async fn delete(&self, id: &ConversationId) -> StoreResult<()>;

    /// Delete every conversation visible to this store.
    async fn delete_all(&self) -> StoreResult<()>;
}
