//! In-memory key-value store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory key-value store.
///
/// This store keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Sessions that don't need to survive a restart
///
/// Writes can be made to fail with [`InMemoryStore::set_read_only`], which
/// lets tests exercise best-effort persistence paths.
///
/// # Example
///
/// ```rust
/// use liftlog_storage::{KeyValueStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.set("k", b"v").unwrap();
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
    read_only: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with one pre-existing value.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: Vec<u8>) -> Self {
        let store = Self::new();
        store.values.write().insert(key.into(), value);
        store
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store is read-only".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.check_writable()?;
        self.values.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.values.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn memory_set_replaces_value() {
        let store = InMemoryStore::new();
        store.set("queue", b"first").unwrap();
        store.set("queue", b"second").unwrap();

        assert_eq!(store.get("queue").unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_remove_missing_is_ok() {
        let store = InMemoryStore::new();
        store.remove("nothing").unwrap();

        store.set("k", b"v").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn memory_with_value() {
        let store = InMemoryStore::with_value("queue", b"[]".to_vec());
        assert_eq!(store.get("queue").unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn memory_read_only_rejects_writes() {
        let store = InMemoryStore::with_value("k", b"old".to_vec());
        store.set_read_only(true);

        let result = store.set("k", b"new");
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert!(store.remove("k").is_err());
        assert_eq!(store.get("k").unwrap(), Some(b"old".to_vec()));

        store.set_read_only(false);
        store.set("k", b"new").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"new".to_vec()));
    }
}
