//! The chat session: one active conversation and its exchanges.

use crate::error::{ChatError, ChatResult};
use crate::orchestrator::{FallbackOrchestrator, ProviderAttempt};
use shelfchat_core::{
    derive_title, ChatPayload, Conversation, ConversationId, ConversationSummary, KnowledgeBase,
    Language, Message, StorageMode,
};
use shelfchat_render::TypingRenderer;
use shelfchat_store::{ConversationStore, DEFAULT_LIST_LIMIT};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reply to a single [`ChatSession::send`].
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// Conversation the exchange belongs to.
    pub conversation_id: ConversationId,
    /// The recorded user message.
    pub user_message: Message,
    /// The assistant message, `None` when the provider answered with no text.
    pub message: Option<Message>,
    /// Provider that answered.
    pub provider_id: String,
    /// Attempt history in priority order.
    pub attempts: Vec<ProviderAttempt>,
}

/// Drives exchanges for one active conversation.
///
/// `send` takes `&mut self`, so exchanges on a session never overlap. The
/// renderer handle returned by [`renderer`](Self::renderer) can be cloned and
/// used concurrently to skip typing.
#[derive(Debug)]
pub struct ChatSession {
    orchestrator: FallbackOrchestrator,
    store: Arc<dyn ConversationStore>,
    knowledge: KnowledgeBase,
    language: Option<Language>,
    history_window: Option<usize>,
    active: Option<Conversation>,
    persisted: bool,
}

impl ChatSession {
    /// Create a session.
    pub fn new(orchestrator: FallbackOrchestrator, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            orchestrator,
            store,
            knowledge: KnowledgeBase::default(),
            language: None,
            history_window: None,
            active: None,
            persisted: false,
        }
    }

    /// Replace the grounding knowledge base.
    #[must_use]
    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// Force the reply language instead of detecting it from the input.
    #[must_use]
    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self
    }

    /// Only send the last `n` conversation messages.
    #[must_use]
    pub fn with_history_window(mut self, n: Option<usize>) -> Self {
        self.history_window = n;
        self
    }

    /// Typing renderer showing the replies.
    #[must_use]
    pub fn renderer(&self) -> TypingRenderer {
        self.orchestrator.renderer().clone()
    }

    /// The orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }

    /// Backend used for persistence.
    #[must_use]
    pub fn storage_mode(&self) -> StorageMode {
        self.store.mode()
    }

    /// The active conversation, if any.
    #[must_use]
    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    /// Messages of the active conversation.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.active
            .as_ref()
            .map(|c| c.messages.as_slice())
            .unwrap_or_default()
    }

    /// Whether the active conversation is backed by the store.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.active.is_some() && self.persisted
    }

    /// Send user input and wait for the reply stream to finish.
    ///
    /// Typing of the reply continues on the renderer after this returns. A
    /// still-running typing session from the previous exchange is committed
    /// first. Only [`ChatError::EmptyInput`] and
    /// [`ChatError::AllProvidersExhausted`] are returned; persistence
    /// failures are logged.
    pub async fn send(&mut self, input: &str) -> ChatResult<ChatReply> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        self.orchestrator.renderer().skip();

        if self.active.is_none() {
            self.open_conversation(input).await;
        }
        let Some(conversation) = self.active.as_mut() else {
            return Err(ChatError::configuration("no active conversation"));
        };
        let conversation_id = conversation.id.clone();

        let user_message =
            Message::user(conversation.next_message_id(), input, conversation.next_position());
        conversation.push(user_message.clone());
        self.persist(&conversation_id, &user_message).await;

        let Some(conversation) = self.active.as_ref() else {
            return Err(ChatError::configuration("no active conversation"));
        };
        let context = self.knowledge.build_context(input, self.language);
        let payload =
            ChatPayload::from_history(Some(context), &conversation.messages, self.history_window);
        let target = conversation.next_message_id();
        let position = conversation.next_position();

        debug!(
            conversation_id = %conversation_id,
            messages = payload.messages.len(),
            "Starting exchange"
        );
        let outcome = self.orchestrator.run(target, &payload).await?;

        let message = if outcome.text.trim().is_empty() {
            debug!(provider = %outcome.provider_id, "Provider answered with no text");
            None
        } else {
            let message = Message::assistant(target, outcome.text, position);
            if let Some(conversation) = self.active.as_mut() {
                conversation.push(message.clone());
            }
            self.persist(&conversation_id, &message).await;
            Some(message)
        };

        Ok(ChatReply {
            conversation_id,
            user_message,
            message,
            provider_id: outcome.provider_id,
            attempts: outcome.attempts,
        })
    }

    /// Leave the active conversation; the next send starts a new one.
    pub fn new_chat(&mut self) {
        self.orchestrator.renderer().cancel();
        self.active = None;
        self.persisted = false;
    }

    /// Make a stored conversation active, loading its messages.
    pub async fn select(&mut self, id: &ConversationId) -> ChatResult<&Conversation> {
        self.orchestrator.renderer().cancel();
        let messages = self.store.load(id).await?;
        let title = self.store.title(id).await?;

        let mut conversation = Conversation::new(title, self.store.mode()).with_id(id.clone());
        conversation.messages = messages;

        debug!(conversation_id = %id, messages = conversation.messages.len(), "Selected conversation");
        self.persisted = true;
        Ok(&*self.active.insert(conversation))
    }

    /// Reopen the most recently updated local conversation.
    ///
    /// Returns `None` without touching the session when the store is remote
    /// or holds no conversation.
    pub async fn resume_latest(&mut self) -> ChatResult<Option<&Conversation>> {
        if self.store.mode() != StorageMode::Local {
            return Ok(None);
        }
        let Some(latest) = self.store.list(1).await?.into_iter().next() else {
            return Ok(None);
        };
        debug!(conversation_id = %latest.id, "Resuming latest conversation");
        Ok(Some(self.select(&latest.id).await?))
    }

    /// Delete a conversation, leaving it first if it is active.
    pub async fn delete(&mut self, id: &ConversationId) -> ChatResult<()> {
        if self.active.as_ref().is_some_and(|c| &c.id == id) {
            self.new_chat();
        }
        self.store.delete(id).await?;
        info!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }

    /// Delete every conversation and leave the active one.
    pub async fn delete_all(&mut self) -> ChatResult<()> {
        self.new_chat();
        self.store.delete_all().await?;
        info!("Deleted all conversations");
        Ok(())
    }

    /// Stored conversations, most recent first. `limit` defaults to 100.
    pub async fn conversations(&self, limit: Option<usize>) -> ChatResult<Vec<ConversationSummary>> {
        Ok(self.store.list(limit.unwrap_or(DEFAULT_LIST_LIMIT)).await?)
    }

    /// Stored conversations whose title or first message contains `query`.
    pub async fn search(&self, query: &str) -> ChatResult<Vec<ConversationSummary>> {
        let mut items = self.conversations(None).await?;
        items.retain(|c| c.matches(query));
        Ok(items)
    }

    async fn open_conversation(&mut self, input: &str) {
        let title = derive_title(input);
        let mode = self.store.mode();
        let conversation = match self.store.create(&title).await {
            Ok(id) => {
                self.persisted = true;
                Conversation::new(title, mode).with_id(id)
            }
            Err(e) => {
                warn!(error = %e, "Could not create stored conversation, continuing in memory");
                self.persisted = false;
                Conversation::new(title, mode)
            }
        };
        debug!(conversation_id = %conversation.id, persisted = self.persisted, "Opened conversation");
        self.active = Some(conversation);
    }

    async fn persist(&self, id: &ConversationId, message: &Message) {
        if !self.persisted {
            return;
        }
        if let Err(e) = self.store.append(id, message).await {
            warn!(
                conversation_id = %id,
                message_id = %message.id,
                error = %e,
                "Failed to persist message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelfchat_core::{MessageId, Role};
    use shelfchat_providers::{MockAdapter, ProviderAdapter};
    use shelfchat_render::TypingPhase;
    use shelfchat_store::{LocalStore, RemoteStore, StaticAuth};

    fn session_with(providers: Vec<MockAdapter>, store: Arc<dyn ConversationStore>) -> ChatSession {
        let providers = providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>)
            .collect();
        let orchestrator = FallbackOrchestrator::new(providers, TypingRenderer::default());
        ChatSession::new(orchestrator, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_persists_exchange() {
        let store = Arc::new(LocalStore::in_memory());
        let mut session = session_with(
            vec![MockAdapter::sse_tokens("relay", ["Hel", "lo"])],
            store.clone(),
        );

        let reply = session.send("Where is my shelf?").await.unwrap();
        let message = reply.message.unwrap();
        assert_eq!(message.content, "Hello");
        assert_eq!(message.id, MessageId(2));
        assert_eq!(reply.user_message.id, MessageId(1));

        let stored = store.load(&reply.conversation_id).await.unwrap();
        assert_eq!(stored, session.messages().to_vec());
        assert_eq!(stored.len(), 2);

        let summaries = session.conversations(None).await.unwrap();
        assert_eq!(summaries[0].title, "Where is my shelf?");

        let view = session.renderer().finished().await.unwrap();
        assert_eq!(view.content, "Hello");
        assert_eq!(view.phase, TypingPhase::Final);
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected() {
        let mut session = session_with(Vec::new(), Arc::new(LocalStore::in_memory()));
        assert!(matches!(session.send("   ").await, Err(ChatError::EmptyInput)));
        assert!(session.active().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_has_grounding_first_and_history() {
        let relay = MockAdapter::sse_tokens("relay", ["ok"]);
        let log = relay.payload_log();
        let mut session = session_with(vec![relay], Arc::new(LocalStore::in_memory()));

        session.send("first").await.unwrap();
        session.send("second").await.unwrap();

        let payload = log.lock().clone().unwrap();
        let roles: Vec<_> = payload.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert!(payload.messages[0].content.contains("Knowledge:"));
        assert_eq!(payload.last_user_content(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_keeps_user_message() {
        let store = Arc::new(LocalStore::in_memory());
        let mut session = session_with(
            vec![MockAdapter::failing("relay", 500), MockAdapter::failing("gateway", 502)],
            store.clone(),
        );

        let err = session.send("hello?").await.unwrap_err();
        assert!(err.is_exhausted());

        assert_eq!(session.messages().len(), 1);
        let id = session.active().unwrap().id.clone();
        let stored = store.load(&id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, Role::User);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthenticated_remote_degrades_to_memory() {
        let store = Arc::new(RemoteStore::new(
            "http://127.0.0.1:9",
            "anon",
            Arc::new(StaticAuth::anonymous()),
        ));
        let mut session = session_with(vec![MockAdapter::completed("generator", "Hi")], store);

        let reply = session.send("hello").await.unwrap();
        assert_eq!(reply.message.unwrap().content, "Hi");
        assert!(!session.is_persisted());
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.storage_mode(), StorageMode::Remote);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_single_shot_reply_is_not_recorded() {
        let mut session = session_with(
            vec![MockAdapter::completed("generator", "")],
            Arc::new(LocalStore::in_memory()),
        );

        let reply = session.send("hello").await.unwrap();
        assert!(reply.message.is_none());
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_chat_select_and_delete() {
        let store = Arc::new(LocalStore::in_memory());
        let mut session = session_with(
            vec![MockAdapter::completed("generator", "answer")],
            store.clone(),
        );

        let first = session.send("books about rust").await.unwrap().conversation_id;
        session.new_chat();
        assert!(session.active().is_none());
        let second = session.send("opening hours").await.unwrap().conversation_id;
        assert_ne!(first, second);

        let selected = session.select(&first).await.unwrap();
        assert_eq!(selected.id, first);
        assert_eq!(selected.title, "books about rust");
        assert_eq!(selected.messages.len(), 2);

        let found = session.search("HOURS").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, second);

        session.delete(&first).await.unwrap();
        assert!(session.active().is_none());
        assert_eq!(session.conversations(None).await.unwrap().len(), 1);

        session.delete_all().await.unwrap();
        assert!(session.conversations(Some(10)).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_commits_previous_typing() {
        let mut session = session_with(
            vec![MockAdapter::completed("generator", "a fairly long first answer")],
            Arc::new(LocalStore::in_memory()),
        );
        let renderer = session.renderer();
        let mut views = renderer.subscribe();

        session.send("one").await.unwrap();
        assert!(renderer.is_active());

        session.send("two").await.unwrap();
        let view = renderer.finished().await.unwrap();
        assert_eq!(view.message_id, MessageId(4));
        assert_eq!(view.content, "a fairly long first answer");

        let mut seen = Vec::new();
        while let Ok(view) = views.try_recv() {
            seen.push(view);
        }
        let committed = seen
            .iter()
            .position(|v| v.message_id == MessageId(2) && v.phase == TypingPhase::Final)
            .unwrap();
        let next = seen.iter().position(|v| v.message_id == MessageId(4)).unwrap();
        assert!(committed < next);
        assert_eq!(seen[committed].content, "a fairly long first answer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_keeps_stored_title() {
        let store = Arc::new(LocalStore::in_memory());
        let id = store.create("Reading list").await.unwrap();
        store
            .append(&id, &Message::user(MessageId(1), "what should I read next", 0))
            .await
            .unwrap();
        let mut session = session_with(Vec::new(), store);

        let listed = session.conversations(None).await.unwrap();
        let selected = session.select(&id).await.unwrap();
        assert_eq!(selected.title, "Reading list");
        assert_eq!(selected.title, listed[0].title);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_latest_reopens_most_recent() {
        let store = Arc::new(LocalStore::in_memory());
        let mut session = session_with(
            vec![MockAdapter::completed("generator", "answer")],
            store.clone(),
        );
        assert!(session.resume_latest().await.unwrap().is_none());

        session.send("older question").await.unwrap();
        session.new_chat();
        let latest = session.send("latest question").await.unwrap().conversation_id;
        session.new_chat();

        let resumed = session.resume_latest().await.unwrap().unwrap();
        assert_eq!(resumed.id, latest);
        assert_eq!(resumed.messages.len(), 2);
        assert!(session.is_persisted());
    }

    #[tokio::test]
    async fn test_resume_latest_skips_remote() {
        let store = Arc::new(RemoteStore::new(
            "http://127.0.0.1:9",
            "anon",
            Arc::new(StaticAuth::anonymous()),
        ));
        let mut session = session_with(Vec::new(), store);
        assert!(session.resume_latest().await.unwrap().is_none());
        assert!(session.active().is_none());
    }
}
