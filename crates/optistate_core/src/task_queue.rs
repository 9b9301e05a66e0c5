//! Per-object ordering of asynchronous completion effects.

use crate::error::{StateError, StateResult};
use crate::identity::ObjectIdentity;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Handle to an enqueued task's outcome.
///
/// Resolves only after every earlier task for the same identity has
/// applied its effect, regardless of the order the underlying work
/// completed in.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<StateResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Waits for the task's outcome.
    ///
    /// # Errors
    ///
    /// Returns the task's own error, or [`StateError::TaskAborted`] if the
    /// task was dropped before delivering (panicked work or a runtime
    /// shutting down).
    pub async fn outcome(self) -> StateResult<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(StateError::TaskAborted),
        }
    }
}

/// One identity's lane: an issue counter and a delivered-count channel.
#[derive(Debug)]
struct Lane {
    next_seq: u64,
    delivered: watch::Sender<u64>,
}

impl Lane {
    fn new() -> Self {
        let (delivered, _) = watch::channel(0);
        Self {
            next_seq: 0,
            delivered,
        }
    }
}

/// Serializes completion effects of asynchronous work per object identity.
///
/// Work enqueued for an identity starts immediately and runs concurrently
/// with everything else; only the *effect* (the state-applying closure and
/// the resolution of the caller's handle) is held back until every earlier
/// task for that identity has applied its own. Tasks bound to different
/// identities never wait on each other.
///
/// A task that fails reports only to its own caller; the lane advances and
/// queued tasks behind it run normally. This ordering is what prevents two
/// saves on the same entity from committing their server responses out of
/// order.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct ObjectTaskQueue {
    lanes: Arc<Mutex<HashMap<ObjectIdentity, Lane>>>,
}

impl ObjectTaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of identities with an active lane.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.lock().len()
    }

    /// Enqueues `work` for `identity` and registers `apply` as its effect.
    ///
    /// `work` is spawned immediately. When it completes, `apply` runs with
    /// its outcome - but only once every earlier task for the same
    /// identity has run its own effect. The returned handle resolves with
    /// `apply`'s result.
    pub fn enqueue<R, T, W, E>(&self, identity: &ObjectIdentity, work: W, apply: E) -> TaskHandle<T>
    where
        R: Send + 'static,
        T: Send + 'static,
        W: Future<Output = StateResult<R>> + Send + 'static,
        E: FnOnce(StateResult<R>) -> StateResult<T> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();

        let (seq, mut delivered_rx, delivered_tx) = {
            let mut lanes = self.lanes.lock();
            let lane = lanes.entry(identity.clone()).or_insert_with(Lane::new);
            let seq = lane.next_seq;
            lane.next_seq += 1;
            (seq, lane.delivered.subscribe(), lane.delivered.clone())
        };

        // The work starts now; ordering applies to its effect only.
        let running = tokio::spawn(work);

        let lanes = Arc::clone(&self.lanes);
        let identity = identity.clone();
        tokio::spawn(async move {
            let outcome = match running.await {
                Ok(outcome) => outcome,
                Err(_) => Err(StateError::TaskAborted),
            };

            // Hold the effect until every earlier task has applied its own.
            if delivered_rx
                .wait_for(|delivered| *delivered >= seq)
                .await
                .is_err()
            {
                return;
            }

            let _ = result_tx.send(apply(outcome));
            delivered_tx.send_replace(seq + 1);

            // Drop the lane once it has fully drained.
            let mut lanes = lanes.lock();
            if let Some(lane) = lanes.get(&identity) {
                if lane.next_seq == seq + 1 {
                    lanes.remove(&identity);
                }
            }
        });

        TaskHandle { rx: result_rx }
    }
}
