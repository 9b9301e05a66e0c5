//! Single-writer action dispatcher owning the process-wide state table.

use crate::action::{Action, ActionOutcome};
use crate::current::CurrentCache;
use crate::error::{StateError, StateResult};
use crate::identity::ObjectIdentity;
use crate::object_state::{AttributePatch, ObjectState, PendingOpSet};
use crate::operation::OpRef;
use crate::task_queue::{ObjectTaskQueue, TaskHandle};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;

/// The process-wide state table and its dispatcher.
///
/// All mutation funnels through one ordered channel: [`StateStore::dispatch`]
/// applies exactly one [`Action`] at a time under a mutex, so no action's
/// effect ever interleaves with another's even when actions are submitted
/// from concurrent callers. The typed methods are thin wrappers that build
/// and dispatch the corresponding action. Dispatching never suspends; only
/// callers that issue I/O do.
///
/// Reads ([`StateStore::get_server_data`] and friends) take the same lock
/// briefly and return owned snapshots, so they are safe between dispatched
/// actions from any number of readers.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: Mutex<StoreInner>,
    queue: ObjectTaskQueue,
}

#[derive(Debug, Default)]
struct StoreInner {
    states: HashMap<ObjectIdentity, ObjectState>,
    current: CurrentCache,
}

impl StoreInner {
    fn state_mut(&mut self, identity: &ObjectIdentity) -> &mut ObjectState {
        self.states
            .entry(identity.clone())
            .or_insert_with(ObjectState::new)
    }

    fn apply(&mut self, action: Action) -> StateResult<ActionOutcome> {
        match action {
            Action::InitializeState { identity } => {
                let state = self.state_mut(&identity).clone();
                Ok(ActionOutcome::Initialized(state))
            }
            Action::RemoveState { identity } => {
                Ok(ActionOutcome::Removed(self.states.remove(&identity)))
            }
            Action::SetServerData { identity, attrs } => {
                self.state_mut(&identity).set_server_data(attrs);
                Ok(ActionOutcome::Done)
            }
            Action::SetPendingOp { identity, attr, op } => {
                self.state_mut(&identity).set_pending_op(attr, op);
                Ok(ActionOutcome::Done)
            }
            Action::PushPendingState { identity } => {
                self.state_mut(&identity).push_pending_state();
                Ok(ActionOutcome::Done)
            }
            Action::PopPendingState { identity } => {
                Ok(ActionOutcome::Popped(
                    self.state_mut(&identity).pop_pending_state(),
                ))
            }
            Action::MergeFirstPendingState { identity } => {
                let state = self
                    .states
                    .get_mut(&identity)
                    .filter(|state| state.can_merge_first())
                    .ok_or_else(|| StateError::PendingStackUnderflow {
                        identity: identity.clone(),
                    })?;
                state.merge_first_pending_state();
                Ok(ActionOutcome::Done)
            }
            Action::CommitServerChanges { identity, attrs } => {
                self.state_mut(&identity).set_server_data(attrs);
                Ok(ActionOutcome::Done)
            }
            Action::MigrateIdentity { from, to } => {
                if let Some(state) = self.states.remove(&from) {
                    match self.states.entry(to.clone()) {
                        Entry::Occupied(mut existing) => existing.get_mut().absorb_pending(state),
                        Entry::Vacant(slot) => {
                            slot.insert(state);
                        }
                    }
                    if let CurrentCache::Present(current) = &mut self.current {
                        if current.identity == from {
                            current.identity = to;
                        }
                    }
                }
                Ok(ActionOutcome::Done)
            }
            Action::SetCurrentIdentity { cache } => {
                self.current = cache;
                Ok(ActionOutcome::Done)
            }
            Action::ClearAllState => {
                self.states.clear();
                self.current = CurrentCache::Unknown;
                Ok(ActionOutcome::Done)
            }
        }
    }
}

impl StateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one action, atomically with respect to all other actions.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::PendingStackUnderflow`] for
    /// [`Action::MergeFirstPendingState`] on an identity with fewer than
    /// two pending generations. All other actions are infallible.
    pub fn dispatch(&self, action: Action) -> StateResult<ActionOutcome> {
        self.inner.lock().apply(action)
    }

    /// Creates state for an identity if absent and returns it.
    ///
    /// Idempotent: re-initializing returns the existing state untouched.
    pub fn initialize_state(&self, identity: &ObjectIdentity) -> ObjectState {
        match self.dispatch(Action::InitializeState {
            identity: identity.clone(),
        }) {
            Ok(ActionOutcome::Initialized(state)) => state,
            _ => unreachable!("INITIALIZE_STATE is infallible"),
        }
    }

    /// Deletes an identity's state, returning it so callers can replay its
    /// pending generations. Returns `None` if the identity had no state.
    pub fn remove_state(&self, identity: &ObjectIdentity) -> Option<ObjectState> {
        match self.dispatch(Action::RemoveState {
            identity: identity.clone(),
        }) {
            Ok(ActionOutcome::Removed(state)) => state,
            _ => unreachable!("REMOVE_STATE is infallible"),
        }
    }

    /// Shallow-merges a patch into an identity's server snapshot,
    /// initializing the identity if needed.
    pub fn set_server_data(&self, identity: &ObjectIdentity, attrs: AttributePatch) {
        let _ = self.dispatch(Action::SetServerData {
            identity: identity.clone(),
            attrs,
        });
    }

    /// Writes (or clears, with `None`) a pending operation in the top
    /// generation, initializing the identity if needed.
    pub fn set_pending_op(
        &self,
        identity: &ObjectIdentity,
        attr: impl Into<String>,
        op: Option<OpRef>,
    ) {
        let _ = self.dispatch(Action::SetPendingOp {
            identity: identity.clone(),
            attr: attr.into(),
            op,
        });
    }

    /// Pushes a new empty pending generation for the identity.
    pub fn push_pending_state(&self, identity: &ObjectIdentity) {
        let _ = self.dispatch(Action::PushPendingState {
            identity: identity.clone(),
        });
    }

    /// Removes and returns the identity's oldest pending generation.
    pub fn pop_pending_state(&self, identity: &ObjectIdentity) -> PendingOpSet {
        match self.dispatch(Action::PopPendingState {
            identity: identity.clone(),
        }) {
            Ok(ActionOutcome::Popped(set)) => set,
            _ => unreachable!("POP_PENDING_STATE is infallible"),
        }
    }

    /// Merges the identity's oldest pending generation into the next one.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::PendingStackUnderflow`] if fewer than two
    /// generations exist. This is a usage error: the caller's save
    /// bookkeeping is broken, and the state is left untouched.
    pub fn merge_first_pending_state(&self, identity: &ObjectIdentity) -> StateResult<()> {
        self.dispatch(Action::MergeFirstPendingState {
            identity: identity.clone(),
        })
        .map(|_| ())
    }

    /// Installs authoritative server attributes at the close of a
    /// successful save or fetch cycle.
    pub fn commit_server_changes(&self, identity: &ObjectIdentity, attrs: AttributePatch) {
        let _ = self.dispatch(Action::CommitServerChanges {
            identity: identity.clone(),
            attrs,
        });
    }

    /// Moves state from a client-generated identity to its server-assigned
    /// twin. No-op if `from` has no state.
    pub fn migrate_identity(&self, from: &ObjectIdentity, to: &ObjectIdentity) {
        let _ = self.dispatch(Action::MigrateIdentity {
            from: from.clone(),
            to: to.clone(),
        });
    }

    /// Discards every object state and resets the current-identity cache
    /// in one step. Used for logout and test teardown.
    pub fn clear_all_state(&self) {
        let _ = self.dispatch(Action::ClearAllState);
    }

    /// Returns the identity's confirmed server snapshot, or an empty map
    /// if the identity is uninitialized.
    #[must_use]
    pub fn get_server_data(&self, identity: &ObjectIdentity) -> HashMap<String, Value> {
        self.inner
            .lock()
            .states
            .get(identity)
            .map(|state| state.server_data().clone())
            .unwrap_or_default()
    }

    /// Returns the identity's pending generations, oldest first, or an
    /// empty stack if the identity is uninitialized.
    #[must_use]
    pub fn get_pending_ops(&self, identity: &ObjectIdentity) -> Vec<PendingOpSet> {
        self.inner
            .lock()
            .states
            .get(identity)
            .map(|state| state.pending_ops().to_vec())
            .unwrap_or_default()
    }

    /// Computes the identity's estimated attributes, or an empty map if
    /// the identity is uninitialized.
    #[must_use]
    pub fn estimate_attributes(&self, identity: &ObjectIdentity) -> HashMap<String, Value> {
        self.inner
            .lock()
            .states
            .get(identity)
            .map(ObjectState::estimate_attributes)
            .unwrap_or_default()
    }

    /// Returns true if the identity currently has state.
    #[must_use]
    pub fn contains(&self, identity: &ObjectIdentity) -> bool {
        self.inner.lock().states.contains_key(identity)
    }

    /// Returns the current-identity cache contents.
    #[must_use]
    pub fn current_identity_cache(&self) -> CurrentCache {
        self.inner.lock().current.clone()
    }

    /// Replaces the current-identity cache.
    pub fn set_current_identity(&self, cache: CurrentCache) {
        let _ = self.dispatch(Action::SetCurrentIdentity { cache });
    }

    /// Enqueues asynchronous work bound to an identity.
    ///
    /// See [`ObjectTaskQueue::enqueue`] for the ordering guarantee.
    pub fn enqueue_task<R, T, W, E>(
        &self,
        identity: &ObjectIdentity,
        work: W,
        apply: E,
    ) -> TaskHandle<T>
    where
        R: Send + 'static,
        T: Send + 'static,
        W: Future<Output = StateResult<R>> + Send + 'static,
        E: FnOnce(StateResult<R>) -> StateResult<T> + Send + 'static,
    {
        self.queue.enqueue(identity, work, apply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::AttributeOp;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Set(Value);

    impl AttributeOp for Set {
        fn apply(&self, _previous: Option<&Value>) -> Option<Value> {
            Some(self.0.clone())
        }

        fn merge_with(&self, _older: &OpRef) -> OpRef {
            Arc::new(self.clone())
        }
    }

    fn set(value: Value) -> Option<OpRef> {
        Some(Arc::new(Set(value)))
    }

    fn patch(attr: &str, value: Value) -> AttributePatch {
        let mut attrs = AttributePatch::new();
        attrs.insert(attr.into(), Some(value));
        attrs
    }

    fn player(id: &str) -> ObjectIdentity {
        ObjectIdentity::new("Player", id)
    }

    #[test]
    fn initialize_is_idempotent() {
        let store = StateStore::new();
        let id = player("p1");

        store.initialize_state(&id);
        store.set_pending_op(&id, "name", set(json!("x")));
        let again = store.initialize_state(&id);

        assert_eq!(again.pending_ops().len(), 1);
        assert!(again.has_pending_ops());
        assert_eq!(store.get_pending_ops(&id).len(), 1);
    }

    #[test]
    fn remove_then_initialize_is_fresh() {
        let store = StateStore::new();
        let id = player("p1");

        store.set_server_data(&id, patch("name", json!("x")));
        store.set_pending_op(&id, "score", set(json!(1)));

        let removed = store.remove_state(&id).unwrap();
        assert!(removed.has_pending_ops());
        assert!(!store.contains(&id));

        let fresh = store.initialize_state(&id);
        assert!(fresh.server_data().is_empty());
        assert!(!fresh.has_pending_ops());
    }

    #[test]
    fn remove_absent_returns_none() {
        let store = StateStore::new();
        assert!(store.remove_state(&player("ghost")).is_none());
    }

    #[test]
    fn queries_on_uninitialized_return_defaults() {
        let store = StateStore::new();
        let id = player("p1");

        assert!(store.get_server_data(&id).is_empty());
        assert!(store.get_pending_ops(&id).is_empty());
        assert!(store.estimate_attributes(&id).is_empty());
    }

    #[test]
    fn pending_edit_then_estimate() {
        let store = StateStore::new();
        let id = player("p1");

        store.initialize_state(&id);
        store.set_pending_op(&id, "name", set(json!("x")));

        assert_eq!(
            store.estimate_attributes(&id).get("name"),
            Some(&json!("x"))
        );
    }

    #[test]
    fn push_pop_detaches_sent_generation() {
        let store = StateStore::new();
        let id = player("p1");

        store.set_pending_op(&id, "name", set(json!("x")));
        store.push_pending_state(&id);
        store.set_pending_op(&id, "name", set(json!("y")));

        let sent = store.pop_pending_state(&id);
        assert_eq!(
            sent.get("name").map(|op| op.apply(None)),
            Some(Some(json!("x")))
        );
        assert_eq!(
            store.estimate_attributes(&id).get("name"),
            Some(&json!("y"))
        );
    }

    #[test]
    fn commit_does_not_clobber_pending_edit() {
        let store = StateStore::new();
        let id = player("p1");

        store.set_pending_op(&id, "name", set(json!("y")));
        store.commit_server_changes(&id, patch("name", json!("server")));

        assert_eq!(
            store.estimate_attributes(&id).get("name"),
            Some(&json!("y"))
        );
        assert_eq!(
            store.get_server_data(&id).get("name"),
            Some(&json!("server"))
        );
    }

    #[test]
    fn merge_first_underflow_is_a_usage_error() {
        let store = StateStore::new();
        let id = player("p1");

        // Uninitialized identity
        let err = store.merge_first_pending_state(&id).unwrap_err();
        assert!(err.is_usage());

        // Initialized, but only one generation
        store.initialize_state(&id);
        let err = store.merge_first_pending_state(&id).unwrap_err();
        assert!(matches!(err, StateError::PendingStackUnderflow { .. }));
    }

    #[test]
    fn merge_first_folds_retry_into_next_generation() {
        let store = StateStore::new();
        let id = player("p1");

        store.set_pending_op(&id, "name", set(json!("x")));
        store.push_pending_state(&id);
        store.set_pending_op(&id, "color", set(json!("blue")));

        store.merge_first_pending_state(&id).unwrap();

        assert_eq!(store.get_pending_ops(&id).len(), 1);
        let estimate = store.estimate_attributes(&id);
        assert_eq!(estimate.get("name"), Some(&json!("x")));
        assert_eq!(estimate.get("color"), Some(&json!("blue")));
    }

    #[test]
    fn migrate_identity_moves_state_in_place() {
        let store = StateStore::new();
        let local = ObjectIdentity::local("Player");
        let server = local.with_object_id("xWMyZ4YEGZ");

        store.set_pending_op(&local, "name", set(json!("x")));
        store.migrate_identity(&local, &server);

        assert!(!store.contains(&local));
        assert_eq!(
            store.estimate_attributes(&server).get("name"),
            Some(&json!("x"))
        );
    }

    #[test]
    fn migrate_absent_identity_is_noop() {
        let store = StateStore::new();
        let local = ObjectIdentity::local("Player");
        let server = local.with_object_id("xWMyZ4YEGZ");

        store.migrate_identity(&local, &server);
        assert!(!store.contains(&server));
    }

    #[test]
    fn migrate_onto_existing_keeps_destination_server_data() {
        let store = StateStore::new();
        let local = ObjectIdentity::local("Player");
        let server = local.with_object_id("xWMyZ4YEGZ");

        store.set_pending_op(&local, "name", set(json!("local-edit")));
        store.set_server_data(&server, patch("score", json!(10)));

        store.migrate_identity(&local, &server);

        let estimate = store.estimate_attributes(&server);
        assert_eq!(estimate.get("score"), Some(&json!(10)));
        assert_eq!(estimate.get("name"), Some(&json!("local-edit")));
    }

    #[test]
    fn clear_all_state_resets_table_and_cache() {
        let store = StateStore::new();
        let id = player("p1");

        store.set_server_data(&id, patch("name", json!("x")));
        store.set_current_identity(CurrentCache::Absent);

        store.clear_all_state();

        assert!(!store.contains(&id));
        assert_eq!(store.current_identity_cache(), CurrentCache::Unknown);
    }

    #[test]
    fn dispatch_channel_matches_typed_methods() {
        let store = StateStore::new();
        let id = player("p1");

        store
            .dispatch(Action::SetPendingOp {
                identity: id.clone(),
                attr: "name".into(),
                op: set(json!("x")),
            })
            .unwrap();

        let outcome = store
            .dispatch(Action::PopPendingState {
                identity: id.clone(),
            })
            .unwrap();
        match outcome {
            ActionOutcome::Popped(set) => assert!(set.contains_key("name")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
