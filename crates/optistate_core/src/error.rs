//! Error types for the state engine.

use crate::identity::ObjectIdentity;
use optistate_store::StoreError;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur in the state engine.
#[derive(Error, Debug)]
pub enum StateError {
    /// A pending-stack operation required more generations than exist.
    ///
    /// Merging the oldest generation forward needs at least two pending
    /// generations. This is a usage error: the caller's save bookkeeping
    /// is out of step with the state it manipulates.
    #[error("fewer than two pending generations for {identity}")]
    PendingStackUnderflow {
        /// The identity whose pending stack was too shallow.
        identity: ObjectIdentity,
    },

    /// Snapshot store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A persisted snapshot could not be decoded.
    #[error("corrupt persisted snapshot: {0}")]
    CorruptSnapshot(String),

    /// A queued task was dropped before its outcome could be delivered.
    #[error("task aborted before completion")]
    TaskAborted,
}

impl StateError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error indicates caller misuse rather than a
    /// transient failure.
    ///
    /// Usage errors are surfaced immediately and must not be retried.
    pub fn is_usage(&self) -> bool {
        match self {
            StateError::PendingStackUnderflow { .. } => true,
            StateError::Store(e) => e.is_usage(),
            _ => false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StateError::Transport { retryable, .. } => *retryable,
            StateError::Store(e) => !e.is_usage(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_are_not_retryable() {
        let err = StateError::PendingStackUnderflow {
            identity: ObjectIdentity::new("Player", "p1"),
        };
        assert!(err.is_usage());
        assert!(!err.is_retryable());

        let err = StateError::Store(StoreError::SyncUnsupported);
        assert!(err.is_usage());
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_retryability() {
        assert!(StateError::transport_retryable("connection reset").is_retryable());
        assert!(!StateError::transport_fatal("invalid session").is_retryable());
        assert!(!StateError::transport_fatal("invalid session").is_usage());
    }

    #[test]
    fn error_display() {
        let err = StateError::PendingStackUnderflow {
            identity: ObjectIdentity::new("Player", "p1"),
        };
        assert!(err.to_string().contains("Player"));
        assert!(err.to_string().contains("p1"));
    }
}
