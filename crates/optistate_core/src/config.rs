//! Configuration for the current-identity coordinator.

/// Default store key for the persisted current-identity snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "currentIdentity";

/// Configuration for [`crate::CurrentIdentityManager`].
#[derive(Debug, Clone)]
pub struct CurrentIdentityConfig {
    /// Store key under which the snapshot is persisted.
    pub storage_key: String,
}

impl CurrentIdentityConfig {
    /// Creates a configuration with the default storage key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.into(),
        }
    }

    /// Sets the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

impl Default for CurrentIdentityConfig {
    fn default() -> Self {
        Self::new()
    }
}
