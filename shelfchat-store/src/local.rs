//! Device-local store over a single keyed blob.
//!
//! All conversations live in one JSON array under one key. Every operation
//! reads the blob, modifies it and writes it back while holding a lock, so
//! concurrent callers on the same store never interleave.

use crate::error::{StoreError, StoreResult};
use crate::store::ConversationStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use shelfchat_core::{
    Conversation, ConversationId, ConversationSummary, Message, StorageMode, DEFAULT_TITLE,
};
use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key under which conversations are stored by default.
pub const DEFAULT_BLOB_KEY: &str = "shelfchat:chats";

/// Synchronous keyed blob storage.
pub trait BlobBackend: Send + Sync + Debug {
    /// Read the value under `key`, `None` if absent.
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Replace the value under `key`.
    fn write(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// In-memory blobs, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryBlob {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBlob {
    /// Create an empty blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobBackend for MemoryBlob {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBlob {
    dir: PathBuf,
}

impl FileBlob {
    /// Store blobs under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl BlobBackend for FileBlob {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Conversation store backed by a [`BlobBackend`].
#[derive(Debug)]
pub struct LocalStore<B: BlobBackend = FileBlob> {
    backend: B,
    key: String,
    lock: Mutex<()>,
}

impl LocalStore<MemoryBlob> {
    /// Store that keeps everything in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBlob::new())
    }
}

impl LocalStore<FileBlob> {
    /// Store that keeps its blob in a JSON file under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileBlob::new(dir))
    }
}

impl<B: BlobBackend> LocalStore<B> {
    /// Create a store over `backend` using [`DEFAULT_BLOB_KEY`].
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            key: DEFAULT_BLOB_KEY.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Use a different blob key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// The blob key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Every stored conversation with its messages, in stored order.
    pub fn snapshot(&self) -> StoreResult<Vec<Conversation>> {
        let _guard = self.lock.lock();
        self.read_all()
    }

    fn read_all(&self) -> StoreResult<Vec<Conversation>> {
        let Some(raw) = self.backend.read(&self.key)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<Conversation>>(&raw) {
            Ok(conversations) => Ok(conversations),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Unreadable local conversations, starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn write_all(&self, conversations: &[Conversation]) -> StoreResult<()> {
        let raw = serde_json::to_string(conversations)?;
        self.backend.write(&self.key, &raw)?;
        Ok(())
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Vec<Conversation>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _guard = self.lock.lock();
        let mut conversations = self.read_all()?;
        let out = f(&mut conversations)?;
        self.write_all(&conversations)?;
        Ok(out)
    }
}

fn display_title(title: String) -> String {
    if title.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

#[async_trait]
impl<B: BlobBackend + 'static> ConversationStore for LocalStore<B> {
    fn mode(&self) -> StorageMode {
        StorageMode::Local
    }

    async fn create(&self, title: &str) -> StoreResult<ConversationId> {
        let conversation = Conversation::new(title.trim(), StorageMode::Local);
        let id = conversation.id.clone();
        self.modify(|all| {
            all.insert(0, conversation);
            Ok(())
        })?;
        debug!(conversation_id = %id, "Created local conversation");
        Ok(id)
    }

    async fn append(&self, id: &ConversationId, message: &Message) -> StoreResult<()> {
        self.modify(|all| {
            let conversation = all
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            conversation.push(message.clone());
            Ok(())
        })
    }

    async fn list(&self, limit: usize) -> StoreResult<Vec<ConversationSummary>> {
        let mut conversations = self.snapshot()?;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations.truncate(limit);
        Ok(conversations
            .iter()
            .map(|c| {
                let mut summary = c.summary();
                summary.title = display_title(summary.title);
                summary
            })
            .collect())
    }

    async fn title(&self, id: &ConversationId) -> StoreResult<String> {
        self.snapshot()?
            .into_iter()
            .find(|c| &c.id == id)
            .map(|c| display_title(c.title))
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn load(&self, id: &ConversationId) -> StoreResult<Vec<Message>> {
        self.snapshot()?
            .into_iter()
            .find(|c| &c.id == id)
            .map(|c| c.messages)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &ConversationId) -> StoreResult<()> {
        self.modify(|all| {
            all.retain(|c| &c.id != id);
            Ok(())
        })
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let _guard = self.lock.lock();
        self.backend.remove(&self.key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelfchat_core::MessageId;

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::in_dir(dir.path());

        let id = store.create("Where is the shelf?").await.unwrap();
        let user = Message::user(MessageId(1), "Where is the shelf?", 0);
        let reply = Message::assistant(MessageId(2), "Open the Shelf page.", 1);
        store.append(&id, &user).await.unwrap();
        store.append(&id, &reply).await.unwrap();

        let reopened = LocalStore::in_dir(dir.path());
        assert_eq!(reopened.load(&id).await.unwrap(), vec![user, reply]);
        assert!(reopened.backend().path_for(DEFAULT_BLOB_KEY).exists());
    }

    #[tokio::test]
    async fn test_list_orders_by_recency() {
        let store = LocalStore::in_memory();
        let older = store.create("older").await.unwrap();
        let newer = store.create("newer").await.unwrap();

        let ids: Vec<_> = store.list(10).await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.clone(), older.clone()]);

        store
            .append(&older, &Message::user(MessageId(1), "bump", 0))
            .await
            .unwrap();
        let ids: Vec<_> = store.list(10).await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![older, newer]);

        assert_eq!(store.list(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_title_filled_from_first_user_message() {
        let store = LocalStore::in_memory();
        let id = store.create("  ").await.unwrap();
        assert_eq!(store.list(10).await.unwrap()[0].title, DEFAULT_TITLE);

        store
            .append(&id, &Message::user(MessageId(1), "Add a book", 0))
            .await
            .unwrap();
        let summary = &store.list(10).await.unwrap()[0];
        assert_eq!(summary.title, "Add a book");
        assert_eq!(summary.preview.as_deref(), Some("Add a book"));
    }

    #[tokio::test]
    async fn test_equal_timestamps_list_newest_insert_first() {
        let store = LocalStore::in_memory();
        let first = store.create("first").await.unwrap();
        let second = store.create("second").await.unwrap();
        let third = store.create("third").await.unwrap();
        store
            .modify(|all| {
                let stamp = all[0].updated_at;
                for conversation in all.iter_mut() {
                    conversation.updated_at = stamp;
                }
                Ok(())
            })
            .unwrap();

        let ids: Vec<_> = store.list(10).await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[tokio::test]
    async fn test_title_is_the_stored_one() {
        let store = LocalStore::in_memory();
        let named = store.create("Reading list").await.unwrap();
        store
            .append(&named, &Message::user(MessageId(1), "what should I read next", 0))
            .await
            .unwrap();
        let blank = store.create("").await.unwrap();

        assert_eq!(store.title(&named).await.unwrap(), "Reading list");
        assert_eq!(store.title(&blank).await.unwrap(), DEFAULT_TITLE);
        assert!(matches!(
            store.title(&ConversationId::from_string("missing")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_blob_reads_as_empty() {
        let blob = MemoryBlob::new();
        blob.write(DEFAULT_BLOB_KEY, "{not json").unwrap();
        let store = LocalStore::new(blob);

        assert!(store.list(10).await.unwrap().is_empty());

        let id = store.create("fresh").await.unwrap();
        assert_eq!(store.list(10).await.unwrap()[0].id, id);
    }

    #[tokio::test]
    async fn test_missing_conversation() {
        let store = LocalStore::in_memory();
        let id = ConversationId::from_string("missing");

        let err = store
            .append(&id, &Message::user(MessageId(1), "hi", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(matches!(store.load(&id).await, Err(StoreError::NotFound(_))));
        assert!(store.delete(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::in_dir(dir.path()).with_key("custom:key");
        let a = store.create("a").await.unwrap();
        let b = store.create("b").await.unwrap();

        store.delete(&a).await.unwrap();
        let ids: Vec<_> = store.list(10).await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b]);

        store.delete_all().await.unwrap();
        assert!(store.list(10).await.unwrap().is_empty());
        assert!(!store.backend().path_for("custom:key").exists());
        store.delete_all().await.unwrap();
    }

    #[test]
    fn test_file_names_are_sanitized() {
        let blob = FileBlob::new("/tmp/chats");
        assert_eq!(
            blob.path_for("shelfchat:chats"),
            PathBuf::from("/tmp/chats/shelfchat_chats.json")
        );
    }
}
