//! Account-bound store over a PostgREST-style HTTP API.
//!
//! Conversations and messages live in two tables, `conversations` and
//! `messages`, scoped to the signed-in principal. Without a principal the
//! store degrades: writes fail with [`StoreError::Unauthenticated`], reads
//! return nothing and deletes do nothing.

use crate::error::{StoreError, StoreResult};
use crate::store::ConversationStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use shelfchat_core::{
    ConversationId, ConversationSummary, Message, MessageId, Role, StorageMode, DEFAULT_TITLE,
};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

/// Listing order: most recently updated first, then most recently created.
pub const LIST_ORDER: &str = "updated_at.desc,created_at.desc";

/// Server-side procedure deleting every conversation of a user.
pub const DELETE_ALL_RPC: &str = "delete_all_conversations_for_user";

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User identifier stored in `user_id` columns.
    pub user_id: String,
    /// Bearer token for row-level access.
    pub access_token: String,
}

impl Principal {
    /// Create a principal.
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

/// Source of the current principal.
#[async_trait]
pub trait AuthProvider: Send + Sync + Debug {
    /// The signed-in principal, if any.
    async fn principal(&self) -> Option<Principal>;
}

/// Fixed principal, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    principal: Option<Principal>,
}

impl StaticAuth {
    /// Always signed in as `principal`.
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    /// Never signed in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn principal(&self) -> Option<Principal> {
        self.principal.clone()
    }
}

#[derive(Debug, Deserialize)]
struct ConversationRow {
    id: Value,
    #[serde(default)]
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TitleRow {
    #[serde(default)]
    title: Option<String>,
}

fn display_title(title: Option<String>) -> String {
    title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    #[serde(default)]
    id: Value,
    role: Role,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Value,
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Remote conversation store.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
    auth: Arc<dyn AuthProvider>,
}

impl RemoteStore {
    /// Create a store for the project at `base_url` using its public API key.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            auth,
        }
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Base URL of the project.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, name)
    }

    fn authorized(&self, request: RequestBuilder, principal: &Principal) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&principal.access_token)
    }

    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::http(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn delete_one(&self, principal: &Principal, id: &str) -> StoreResult<()> {
        let filter = format!("eq.{id}");
        let request = self
            .client
            .delete(self.table("messages"))
            .query(&[("conversation_id", filter.as_str())]);
        Self::check(self.authorized(request, principal).send().await?).await?;

        let request = self
            .client
            .delete(self.table("conversations"))
            .query(&[("id", filter.as_str())]);
        Self::check(self.authorized(request, principal).send().await?).await?;
        Ok(())
    }

    async fn delete_each(&self, principal: &Principal) -> StoreResult<()> {
        let owner = format!("eq.{}", principal.user_id);
        let request = self
            .client
            .get(self.table("conversations"))
            .query(&[("select", "id"), ("user_id", owner.as_str())]);
        let rows: Vec<IdRow> = Self::check(self.authorized(request, principal).send().await?)
            .await?
            .json()
            .await?;

        for row in rows {
            self.delete_one(principal, &id_string(&row.id)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for RemoteStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Remote
    }

    async fn create(&self, title: &str) -> StoreResult<ConversationId> {
        let principal = self
            .auth
            .principal()
            .await
            .ok_or(StoreError::Unauthenticated)?;

        let request = self
            .client
            .post(self.table("conversations"))
            .header("Prefer", "return=representation")
            .json(&json!({ "user_id": principal.user_id, "title": title }));
        let rows: Vec<IdRow> = Self::check(self.authorized(request, &principal).send().await?)
            .await?
            .json()
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| StoreError::backend("insert returned no rows"))?;
        let id = ConversationId::from_string(id_string(&row.id));
        debug!(conversation_id = %id, "Created remote conversation");
        Ok(id)
    }

    async fn append(&self, id: &ConversationId, message: &Message) -> StoreResult<()> {
        let principal = self
            .auth
            .principal()
            .await
            .ok_or(StoreError::Unauthenticated)?;

        let request = self
            .client
            .post(self.table("messages"))
            .header("Prefer", "return=minimal")
            .json(&json!({
                "conversation_id": id.as_str(),
                "user_id": principal.user_id,
                "role": message.role,
                "content": message.content,
            }));
        Self::check(self.authorized(request, &principal).send().await?).await?;
        Ok(())
    }

    async fn list(&self, limit: usize) -> StoreResult<Vec<ConversationSummary>> {
        let Some(principal) = self.auth.principal().await else {
            return Ok(Vec::new());
        };

        let limit = limit.to_string();
        let request = self.client.get(self.table("conversations")).query(&[
            ("select", "id,title,created_at,updated_at"),
            ("order", LIST_ORDER),
            ("limit", limit.as_str()),
        ]);
        let rows: Vec<ConversationRow> =
            Self::check(self.authorized(request, &principal).send().await?)
                .await?
                .json()
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| ConversationSummary {
                id: ConversationId::from_string(id_string(&row.id)),
                title: display_title(row.title),
                created_at: row.created_at,
                updated_at: row.updated_at,
                preview: None,
            })
            .collect())
    }

    async fn title(&self, id: &ConversationId) -> StoreResult<String> {
        let Some(principal) = self.auth.principal().await else {
            return Ok(DEFAULT_TITLE.to_string());
        };

        let filter = format!("eq.{id}");
        let request = self.client.get(self.table("conversations")).query(&[
            ("select", "title"),
            ("id", filter.as_str()),
            ("limit", "1"),
        ]);
        let rows: Vec<TitleRow> =
            Self::check(self.authorized(request, &principal).send().await?)
                .await?
                .json()
                .await?;

        rows.into_iter()
            .next()
            .map(|row| display_title(row.title))
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn load(&self, id: &ConversationId) -> StoreResult<Vec<Message>> {
        let Some(principal) = self.auth.principal().await else {
            return Ok(Vec::new());
        };

        let filter = format!("eq.{id}");
        let request = self.client.get(self.table("messages")).query(&[
            ("select", "id,role,content"),
            ("conversation_id", filter.as_str()),
            ("order", "id.asc"),
        ]);
        let rows: Vec<MessageRow> =
            Self::check(self.authorized(request, &principal).send().await?)
                .await?
                .json()
                .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(position, row)| {
                let position = position as u64;
                let id = row.id.as_u64().map_or(MessageId(position + 1), MessageId);
                Message::new(id, row.role, row.content, position)
            })
            .collect())
    }

    async fn delete(&self, id: &ConversationId) -> StoreResult<()> {
        let Some(principal) = self.auth.principal().await else {
            return Ok(());
        };
        self.delete_one(&principal, id.as_str()).await
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let Some(principal) = self.auth.principal().await else {
            return Ok(());
        };

        let request = self
            .client
            .post(self.table(&format!("rpc/{DELETE_ALL_RPC}")))
            .json(&json!({ "uid": principal.user_id }));
        let rpc = match self.authorized(request, &principal).send().await {
            Ok(response) => Self::check(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };

        match rpc {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Bulk delete procedure failed, deleting conversations one by one");
                self.delete_each(&principal).await
            }
        }
    }
}
