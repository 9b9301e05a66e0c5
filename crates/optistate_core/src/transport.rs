//! Transport seam for session invalidation.

use crate::error::{StateError, StateResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Network calls the engine issues on its own behalf.
///
/// Entity saves and fetches are owned by callers; the only request this
/// core originates is the best-effort invalidation of a revocable session
/// token during logout.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Invalidates a session token server-side.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be completed. Logout
    /// treats this as best-effort and never fails because of it.
    async fn revoke_session(&self, token: &str) -> StateResult<()>;
}

/// A mock transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    revoked: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MockTransport {
    /// Creates a new mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent revocations fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns the tokens revoked so far.
    #[must_use]
    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().clone()
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn revoke_session(&self, token: &str) -> StateResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StateError::transport_retryable("mock revocation failure"));
        }
        self.revoked.lock().push(token.into());
        Ok(())
    }
}
