//! In-process store with optional JSON snapshot persistence.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    Collection, CollectionItem, CollectionItemPatch, Entity, HistoryEntry, NewCollectionItem,
    NewHistoryEntry, Store, StoreError, StoreResult,
};

/// Insertion order breaks `created_at` ties.
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Default)]
struct Tables {
    history: DashMap<Uuid, Row<HistoryEntry>>,
    collections: DashMap<Uuid, Row<Collection>>,
    items: DashMap<Uuid, Row<CollectionItem>>,
    seq: AtomicU64,
    save_lock: Mutex<()>,
}

impl Tables {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    collections: Vec<Collection>,
    #[serde(default)]
    items: Vec<CollectionItem>,
}

/// Thread-safe store backed by concurrent maps.
///
/// With a persistence path, the whole dataset is rewritten to disk after
/// every mutation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Tables>,
    persistence_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            inner: Arc::new(Tables::default()),
            persistence_path: persistence_path.map(PathBuf::from),
        }
    }

    /// Open a store backed by `path`, loading it if the file exists.
    pub fn load_from_file(path: &str) -> StoreResult<Self> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            let tables = &store.inner;

            for entry in snapshot.history {
                tables.history.insert(entry.id, Row { seq: tables.next_seq(), value: entry });
            }
            for collection in snapshot.collections {
                tables
                    .collections
                    .insert(collection.id, Row { seq: tables.next_seq(), value: collection });
            }
            for item in snapshot.items {
                tables.items.insert(item.id, Row { seq: tables.next_seq(), value: item });
            }

            tracing::info!(
                path = %path,
                history = tables.history.len(),
                collections = tables.collections.len(),
                items = tables.items.len(),
                "Loaded store snapshot"
            );
        }
        Ok(store)
    }

    /// Write the snapshot on the blocking pool, if persistence is enabled.
    ///
    /// Each call serializes the whole dataset, so a write costs O(rows).
    async fn persist(&self) -> StoreResult<()> {
        if self.persistence_path.is_none() {
            return Ok(());
        }
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save_to_file())
            .await
            .map_err(|e| StoreError::Backend(format!("snapshot task failed: {e}")))?
    }

    /// Write the snapshot, if persistence is enabled.
    pub fn save_to_file(&self) -> StoreResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let _guard = self.inner.save_lock.lock().unwrap_or_else(|e| e.into_inner());

        let snapshot = Snapshot {
            history: ordered(&self.inner.history, |_| true, false),
            collections: ordered(&self.inner.collections, |_| true, false),
            items: ordered(&self.inner.items, |_| true, false),
        };

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }

    fn owned_collection(&self, owner: &str, id: Uuid) -> StoreResult<Collection> {
        self.inner
            .collections
            .get(&id)
            .filter(|row| row.value.user_uid == owner)
            .map(|row| row.value.clone())
            .ok_or(StoreError::NotFound(Entity::Collection))
    }
}

/// Rows matching `keep`, sorted by insertion order.
fn ordered<T: Clone>(table: &DashMap<Uuid, Row<T>>, keep: impl Fn(&T) -> bool, newest_first: bool) -> Vec<T> {
    let mut rows: Vec<(u64, T)> = table
        .iter()
        .filter(|row| keep(&row.value))
        .map(|row| (row.seq, row.value.clone()))
        .collect();
    rows.sort_by_key(|(seq, _)| *seq);
    if newest_first {
        rows.reverse();
    }
    rows.into_iter().map(|(_, value)| value).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_history(&self, entry: NewHistoryEntry) -> StoreResult<HistoryEntry> {
        let entry = entry.into_entry();
        self.inner
            .history
            .insert(entry.id, Row { seq: self.inner.next_seq(), value: entry.clone() });
        self.persist().await?;
        Ok(entry)
    }

    async fn list_history(&self, owner: &str, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        let mut entries = ordered(&self.inner.history, |e| e.user_uid == owner, true);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete_history(&self, owner: &str, id: Uuid) -> StoreResult<()> {
        self.inner
            .history
            .remove_if(&id, |_, row| row.value.user_uid == owner)
            .ok_or(StoreError::NotFound(Entity::HistoryEntry))?;
        self.persist().await
    }

    async fn clear_history(&self, owner: &str) -> StoreResult<usize> {
        let before = self.inner.history.len();
        self.inner.history.retain(|_, row| row.value.user_uid != owner);
        let removed = before.saturating_sub(self.inner.history.len());
        self.persist().await?;
        Ok(removed)
    }

    async fn create_collection(&self, owner: &str, name: &str) -> StoreResult<Collection> {
        let collection = Collection {
            id: Uuid::new_v4(),
            user_uid: owner.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.inner
            .collections
            .insert(collection.id, Row { seq: self.inner.next_seq(), value: collection.clone() });
        self.persist().await?;
        Ok(collection)
    }

    async fn list_collections(&self, owner: &str) -> StoreResult<Vec<Collection>> {
        Ok(ordered(&self.inner.collections, |c| c.user_uid == owner, true))
    }

    async fn rename_collection(&self, owner: &str, id: Uuid, name: &str) -> StoreResult<Collection> {
        let renamed = {
            let mut row = self
                .inner
                .collections
                .get_mut(&id)
                .filter(|row| row.value.user_uid == owner)
                .ok_or(StoreError::NotFound(Entity::Collection))?;
            row.value.name = name.to_string();
            row.value.clone()
        };
        self.persist().await?;
        Ok(renamed)
    }

    async fn delete_collection(&self, owner: &str, id: Uuid) -> StoreResult<()> {
        self.inner
            .collections
            .remove_if(&id, |_, row| row.value.user_uid == owner)
            .ok_or(StoreError::NotFound(Entity::Collection))?;
        self.inner.items.retain(|_, row| row.value.collection_id != id);
        self.persist().await
    }

    async fn add_item(
        &self,
        owner: &str,
        collection_id: Uuid,
        item: NewCollectionItem,
    ) -> StoreResult<CollectionItem> {
        self.owned_collection(owner, collection_id)?;
        let item = item.into_item(collection_id);
        self.inner
            .items
            .insert(item.id, Row { seq: self.inner.next_seq(), value: item.clone() });
        self.persist().await?;
        Ok(item)
    }

    async fn list_items(&self, owner: &str, collection_id: Uuid) -> StoreResult<Vec<CollectionItem>> {
        self.owned_collection(owner, collection_id)?;
        Ok(ordered(&self.inner.items, |i| i.collection_id == collection_id, true))
    }

    async fn update_item(
        &self,
        owner: &str,
        collection_id: Uuid,
        item_id: Uuid,
        patch: CollectionItemPatch,
    ) -> StoreResult<CollectionItem> {
        self.owned_collection(owner, collection_id)?;
        let updated = {
            let mut row = self
                .inner
                .items
                .get_mut(&item_id)
                .filter(|row| row.value.collection_id == collection_id)
                .ok_or(StoreError::NotFound(Entity::Item))?;
            patch.apply(&mut row.value);
            row.value.clone()
        };
        self.persist().await?;
        Ok(updated)
    }

    async fn delete_item(&self, owner: &str, collection_id: Uuid, item_id: Uuid) -> StoreResult<()> {
        self.owned_collection(owner, collection_id)?;
        self.inner
            .items
            .remove_if(&item_id, |_, row| row.value.collection_id == collection_id)
            .ok_or(StoreError::NotFound(Entity::Item))?;
        self.persist().await
    }
}
