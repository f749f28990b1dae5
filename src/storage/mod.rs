//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! history recorder / api handlers
//!     → Store trait (every call scoped by owner identity)
//!         → memory.rs    (DashMap tables, optional JSON snapshot)
//!         → postgrest.rs (PostgREST over HTTP)
//! ```
//!
//! Ownership is enforced here: a collection, item or history entry that
//! belongs to someone else is reported as [`StoreError::NotFound`].

pub mod memory;
pub mod postgrest;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{StorageBackend, StorageConfig};

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// One completed relay, as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub user_uid: String,
    pub url: String,
    pub method: String,
    pub headers: Value,
    pub body: Value,
    pub status: u16,
    pub time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// A history row before the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub user_uid: String,
    pub url: String,
    pub method: String,
    pub headers: Value,
    pub body: Value,
    pub status: u16,
    pub time_ms: u64,
}

impl NewHistoryEntry {
    pub(crate) fn into_entry(self) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            user_uid: self.user_uid,
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            status: self.status,
            time_ms: self.time_ms,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub user_uid: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A saved request inside a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub url: String,
    pub method: String,
    pub headers: Value,
    pub body: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCollectionItem {
    pub url: String,
    pub method: String,
    pub headers: Value,
    pub body: Value,
}

impl NewCollectionItem {
    pub(crate) fn into_item(self, collection_id: Uuid) -> CollectionItem {
        CollectionItem {
            id: Uuid::new_v4(),
            collection_id,
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            created_at: Utc::now(),
        }
    }
}

/// Partial item update. `None` leaves a field alone; for `headers` and
/// `body`, `Some(Value::Null)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl CollectionItemPatch {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.method.is_none() && self.headers.is_none() && self.body.is_none()
    }

    pub(crate) fn apply(self, item: &mut CollectionItem) {
        if let Some(url) = self.url {
            item.url = url;
        }
        if let Some(method) = self.method {
            item.method = method;
        }
        if let Some(headers) = self.headers {
            item.headers = headers;
        }
        if let Some(body) = self.body {
            item.body = body;
        }
    }
}

/// Which kind of row was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Collection,
    Item,
    HistoryEntry,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Collection => write!(f, "collection"),
            Entity::Item => write!(f, "item"),
            Entity::HistoryEntry => write!(f, "history entry"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for history, collections and collection items.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_history(&self, entry: NewHistoryEntry) -> StoreResult<HistoryEntry>;

    /// Newest first, at most `limit` entries.
    async fn list_history(&self, owner: &str, limit: usize) -> StoreResult<Vec<HistoryEntry>>;

    async fn delete_history(&self, owner: &str, id: Uuid) -> StoreResult<()>;

    /// Returns the number of entries removed.
    async fn clear_history(&self, owner: &str) -> StoreResult<usize>;

    async fn create_collection(&self, owner: &str, name: &str) -> StoreResult<Collection>;

    /// Newest first.
    async fn list_collections(&self, owner: &str) -> StoreResult<Vec<Collection>>;

    async fn rename_collection(&self, owner: &str, id: Uuid, name: &str) -> StoreResult<Collection>;

    /// Removes the collection and all of its items.
    async fn delete_collection(&self, owner: &str, id: Uuid) -> StoreResult<()>;

    async fn add_item(
        &self,
        owner: &str,
        collection_id: Uuid,
        item: NewCollectionItem,
    ) -> StoreResult<CollectionItem>;

    /// Newest first.
    async fn list_items(&self, owner: &str, collection_id: Uuid) -> StoreResult<Vec<CollectionItem>>;

    async fn update_item(
        &self,
        owner: &str,
        collection_id: Uuid,
        item_id: Uuid,
        patch: CollectionItemPatch,
    ) -> StoreResult<CollectionItem>;

    async fn delete_item(&self, owner: &str, collection_id: Uuid, item_id: Uuid) -> StoreResult<()>;
}

/// Open the configured backend.
pub fn open_store(config: &StorageConfig) -> StoreResult<Arc<dyn Store>> {
    match config.backend {
        StorageBackend::Memory => {
            let store = match &config.snapshot_path {
                Some(path) => MemoryStore::load_from_file(path)?,
                None => MemoryStore::new(None),
            };
            Ok(Arc::new(store))
        }
        StorageBackend::Postgrest => Ok(Arc::new(PostgrestStore::new(&config.postgrest)?)),
    }
}
