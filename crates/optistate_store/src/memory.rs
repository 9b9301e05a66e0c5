//! In-memory snapshot store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::{SnapshotStore, StoreMode};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory snapshot store.
///
/// This store keeps all entries in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral processes that don't need persistence
///
/// By default the store reports [`StoreMode::Synchronous`]. Tests that
/// need to exercise the asynchronous-only code paths of a coordinator can
/// construct one with [`MemoryStore::async_only`], which makes `get_sync`
/// fail the way a genuinely asynchronous backend would.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    mode: StoreMode,
}

impl MemoryStore {
    /// Creates a new empty store with synchronous reads available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            mode: StoreMode::Synchronous,
        }
    }

    /// Creates a new empty store that refuses synchronous reads.
    ///
    /// Useful for testing code that must fail fast when pointed at an
    /// asynchronous-only backend.
    #[must_use]
    pub fn async_only() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            mode: StoreMode::AsyncOnly,
        }
    }

    /// Creates a store pre-populated with entries.
    ///
    /// Useful for testing load/recovery scenarios.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            entries: RwLock::new(entries),
            mode: StoreMode::Synchronous,
        }
    }

    /// Returns the number of entries currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    fn mode(&self) -> StoreMode {
        self.mode
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.write().insert(key.into(), value.into());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn get_sync(&self, key: &str) -> StoreResult<Option<String>> {
        if !self.mode.supports_sync() {
            return Err(StoreError::SyncUnsupported);
        }
        Ok(self.entries.read().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_set_get_roundtrip() {
        let store = MemoryStore::new();

        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".into()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_set_replaces() {
        let store = MemoryStore::new();

        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".into()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn memory_remove() {
        let store = MemoryStore::new();

        store.set("a", "1").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        // Removing an absent key is a no-op
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn memory_clear() {
        let store = MemoryStore::new();

        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_sync_read() {
        let store = MemoryStore::new();
        store.entries.write().insert("a".into(), "1".into());

        assert_eq!(store.get_sync("a").unwrap(), Some("1".into()));
    }

    #[test]
    fn memory_async_only_refuses_sync_read() {
        let store = MemoryStore::async_only();
        assert_eq!(store.mode(), StoreMode::AsyncOnly);

        let result = store.get_sync("a");
        assert!(matches!(result, Err(StoreError::SyncUnsupported)));
    }

    #[tokio::test]
    async fn memory_async_only_still_reads_async() {
        let store = MemoryStore::async_only();

        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".into()));
    }

    #[tokio::test]
    async fn memory_with_entries() {
        let mut seed = HashMap::new();
        seed.insert("user".into(), "{}".into());

        let store = MemoryStore::with_entries(seed);
        assert_eq!(store.get("user").await.unwrap(), Some("{}".into()));
    }
}
