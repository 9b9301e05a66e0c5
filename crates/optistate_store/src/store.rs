//! Snapshot store trait definition.

use crate::error::StoreResult;
use async_trait::async_trait;

/// Capability mode of a snapshot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Operations complete without suspending; [`SnapshotStore::get_sync`]
    /// is available.
    Synchronous,
    /// Operations may suspend; [`SnapshotStore::get_sync`] fails with
    /// [`crate::StoreError::SyncUnsupported`].
    AsyncOnly,
}

impl StoreMode {
    /// Returns true if synchronous reads are available.
    pub fn supports_sync(&self) -> bool {
        matches!(self, StoreMode::Synchronous)
    }
}

/// A persistent key-value store for serialized snapshots.
///
/// Stores are **opaque string maps**. They hold serialized snapshots
/// (for example the current-identity record) keyed by name; callers own
/// all interpretation of the stored values.
///
/// # Invariants
///
/// - `get` returns exactly the value most recently `set` for that key
/// - `remove` of an absent key succeeds as a no-op
/// - On a [`StoreMode::Synchronous`] store, `get_sync` is equivalent to
///   `get` and completes without suspending
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - For testing and ephemeral storage
/// - [`crate::FileStore`] - Single-file persistent storage
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Returns this store's capability mode.
    fn mode(&self) -> StoreMode;

    /// Reads the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be made durable.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be made durable.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Removes every entry in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    async fn clear(&self) -> StoreResult<()>;

    /// Reads the value stored under `key` without suspending.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::SyncUnsupported`] on an
    /// [`StoreMode::AsyncOnly`] store, or an error if the underlying
    /// storage fails.
    fn get_sync(&self, key: &str) -> StoreResult<Option<String>>;
}
