//! Durable queue of writes awaiting remote application.
//!
//! The queue is persisted as one JSON array under a single storage key and
//! rewritten in full after every change:
//!
//! ```json
//! [{"id": "...", "action": "logSet", "data": {...}, "timestamp": 1717236000000, "retries": 0}]
//! ```
//!
//! Persistence is best-effort: a failed write is logged and the in-memory
//! queue stays authoritative until the next successful rewrite.

use chrono::{DateTime, TimeZone, Utc};
use liftlog_model::{Mutation, QueueAction};
use liftlog_storage::KeyValueStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A write awaiting remote application.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    /// Unique, time-ordered identifier.
    pub id: String,
    /// The write to replay.
    pub mutation: Mutation,
    /// When the write was queued.
    pub enqueued_at: DateTime<Utc>,
    /// Failed replays so far.
    pub retries: u32,
}

impl QueueItem {
    /// Creates an item with a fresh identifier and no retries.
    pub fn new(mutation: Mutation, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            mutation,
            enqueued_at,
            retries: 0,
        }
    }

    /// The write's action.
    pub fn action(&self) -> QueueAction {
        self.mutation.action()
    }
}

/// Persisted form of a [`QueueItem`].
#[derive(Debug, Serialize, Deserialize)]
struct StoredItem {
    id: String,
    action: QueueAction,
    data: serde_json::Value,
    timestamp: i64,
    #[serde(default)]
    retries: u32,
}

impl StoredItem {
    fn encode(item: &QueueItem) -> Option<Self> {
        match item.mutation.to_data() {
            Ok(data) => Some(Self {
                id: item.id.clone(),
                action: item.action(),
                data,
                timestamp: item.enqueued_at.timestamp_millis(),
                retries: item.retries,
            }),
            Err(e) => {
                warn!(id = %item.id, error = %e, "queued write could not be encoded");
                None
            }
        }
    }

    fn decode(self) -> Option<QueueItem> {
        let mutation = match Mutation::from_data(self.action, self.data) {
            Ok(mutation) => mutation,
            Err(e) => {
                warn!(id = %self.id, error = %e, "skipping unreadable queued write");
                return None;
            }
        };
        let enqueued_at = Utc
            .timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_default();

        Some(QueueItem {
            id: self.id,
            mutation,
            enqueued_at,
            retries: self.retries,
        })
    }
}

/// An ordered, persisted list of pending writes.
///
/// Holds at most one item per [`liftlog_model::QueueKey`]; appending an
/// item evicts the queued item with the same key.
pub struct SyncQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    items: RwLock<Vec<QueueItem>>,
}

impl SyncQueue {
    /// Opens the queue persisted under `key`, re-reading whatever a previous
    /// process left behind.
    pub fn open(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let items = load(store.as_ref(), &key);
        if !items.is_empty() {
            debug!(count = items.len(), "restored queued writes");
        }

        Self {
            store,
            key,
            items: RwLock::new(items),
        }
    }

    /// Queues `mutation`, replacing any queued write with the same key.
    ///
    /// Returns the queued item.
    pub fn append(&self, mut mutation: Mutation, now: DateTime<Utc>) -> QueueItem {
        let key = mutation.key();
        let mut items = self.items.write();

        if let Some(pos) = items.iter().position(|i| i.mutation.key() == key) {
            let evicted = items.remove(pos);
            mutation.supersede(&evicted.mutation);
            debug!(id = %evicted.id, action = %key.action, "evicted superseded queued write");
        }

        let item = QueueItem::new(mutation, now);
        items.push(item.clone());
        self.persist(&items);
        item
    }

    /// All items, oldest first.
    pub fn list(&self) -> Vec<QueueItem> {
        self.items.read().clone()
    }

    /// Returns true if an item with `id` is still queued.
    pub fn contains(&self, id: &str) -> bool {
        self.items.read().iter().any(|i| i.id == id)
    }

    /// Removes the item with `id`. Returns false if it was not queued.
    pub fn remove(&self, id: &str) -> bool {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|i| i.id != id);
        let removed = items.len() != before;
        if removed {
            self.persist(&items);
        }
        removed
    }

    /// Replaces the stored copy of `item` (matched by id), e.g. to record a
    /// retry. Returns false if it was not queued.
    pub fn update(&self, item: &QueueItem) -> bool {
        let mut items = self.items.write();
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item.clone();
                self.persist(&items);
                true
            }
            None => false,
        }
    }

    /// Returns true if some queued write overlaps `mutation`.
    pub fn overlaps(&self, mutation: &Mutation) -> bool {
        self.items
            .read()
            .iter()
            .any(|i| i.mutation.overlaps(mutation))
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn persist(&self, items: &[QueueItem]) {
        let stored: Vec<StoredItem> = items.iter().filter_map(StoredItem::encode).collect();
        let result = serde_json::to_vec(&stored)
            .map_err(|e| e.to_string())
            .and_then(|blob| {
                self.store
                    .set(&self.key, &blob)
                    .map_err(|e| e.to_string())
            });

        if let Err(error) = result {
            warn!(key = %self.key, %error, "failed to persist sync queue");
        }
    }
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("key", &self.key)
            .field("len", &self.len())
            .finish()
    }
}

fn load(store: &dyn KeyValueStore, key: &str) -> Vec<QueueItem> {
    let blob = match store.get(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(key, error = %e, "failed to read sync queue; starting empty");
            return Vec::new();
        }
    };

    let entries: Vec<serde_json::Value> = match serde_json::from_slice(&blob) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(key, error = %e, "sync queue blob is corrupt; starting empty");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<StoredItem>(entry) {
            Ok(stored) => stored.decode(),
            Err(e) => {
                warn!(key, error = %e, "skipping malformed queue entry");
                None
            }
        })
        .collect()
}
