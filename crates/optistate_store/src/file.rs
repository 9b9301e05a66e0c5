//! File-based snapshot store for persistent storage.

use crate::error::{StoreError, StoreResult};
use crate::store::{SnapshotStore, StoreMode};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A file-based snapshot store.
///
/// All entries live in a single JSON file. The full map is loaded at open
/// and kept in memory; every mutation rewrites the file atomically
/// (write to a temporary file in the same directory, then rename), so a
/// crash mid-write leaves the previous contents intact.
///
/// Reads never touch the file after open, so this store reports
/// [`StoreMode::Synchronous`].
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```no_run
/// use optistate_store::{FileStore, SnapshotStore};
///
/// let store = FileStore::open("snapshots.json").unwrap();
/// assert_eq!(store.get_sync("currentIdentity").unwrap(), None);
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Opens or creates a file store at the given path.
    ///
    /// If the file exists its contents are loaded; otherwise the store
    /// starts empty and the file is created on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or
    /// [`StoreError::Corrupt`] if its contents are not a JSON string map.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)
                    .map_err(|e| StoreError::corrupt(format!("invalid snapshot file: {e}")))?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Opens or creates a file store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be read.
    pub fn open_with_create_dirs(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the file from the given entries, atomically.
    fn persist(&self, entries: &HashMap<String, String>) -> StoreResult<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;

        let raw = serde_json::to_string(entries)
            .map_err(|e| StoreError::corrupt(format!("unencodable entries: {e}")))?;
        tmp.write_all(raw.as_bytes())?;
        tmp.flush()?;

        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Synchronous
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.into(), value.into());
        self.persist(&entries)
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = self.entries.write();
        entries.clear();
        self.persist(&entries)
    }

    fn get_sync(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }
}
