//! Error types for snapshot stores.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a snapshot store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted entry could not be decoded.
    #[error("corrupt store data: {reason}")]
    Corrupt {
        /// Why decoding failed.
        reason: String,
    },

    /// A synchronous read was issued against an asynchronous-only store.
    ///
    /// This is a usage error, not a transient failure: the caller picked
    /// the wrong entry point for this store's capability mode.
    #[error("store does not support synchronous reads")]
    SyncUnsupported,
}

impl StoreError {
    /// Creates a corrupt-data error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    /// Returns true if this error indicates caller misuse rather than a
    /// transient failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, StoreError::SyncUnsupported)
    }
}
