//! Per-object state: server snapshot plus pending generations.

use crate::operation::OpRef;
use serde_json::Value;
use std::collections::HashMap;

/// One generation of not-yet-confirmed local edits, keyed by attribute.
pub type PendingOpSet = HashMap<String, OpRef>;

/// A shallow attribute patch.
///
/// `Some(value)` sets the attribute; `None` deletes it. This is how
/// "remove this key from the server snapshot" is expressed without
/// reserving a sentinel value.
pub type AttributePatch = HashMap<String, Option<Value>>;

/// State held for one live object identity.
///
/// `server_data` is the last attribute snapshot confirmed by the server.
/// `pending_ops` is a stack of generations, oldest at index 0; the top
/// (newest) generation accumulates new local edits until a save is
/// dispatched.
///
/// # Invariants
///
/// - `pending_ops` is never empty for an initialized state
/// - At most one generation is in flight at a time, always the oldest
#[derive(Debug, Clone)]
pub struct ObjectState {
    server_data: HashMap<String, Value>,
    pending_ops: Vec<PendingOpSet>,
}

impl ObjectState {
    /// Creates a fresh state: empty server data, one empty generation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            server_data: HashMap::new(),
            pending_ops: vec![PendingOpSet::new()],
        }
    }

    /// Returns the last server-confirmed attribute snapshot.
    #[must_use]
    pub fn server_data(&self) -> &HashMap<String, Value> {
        &self.server_data
    }

    /// Returns the pending generations, oldest first.
    #[must_use]
    pub fn pending_ops(&self) -> &[PendingOpSet] {
        &self.pending_ops
    }

    /// Returns true if any generation holds at least one operation.
    #[must_use]
    pub fn has_pending_ops(&self) -> bool {
        self.pending_ops.iter().any(|set| !set.is_empty())
    }

    /// Shallow-merges a patch into the server snapshot.
    ///
    /// Last write wins per attribute; a `None` entry deletes the key.
    /// Pending operations are untouched and continue to apply on top of
    /// the new snapshot when attributes are estimated.
    pub fn set_server_data(&mut self, attrs: AttributePatch) {
        for (attr, value) in attrs {
            match value {
                Some(v) => {
                    self.server_data.insert(attr, v);
                }
                None => {
                    self.server_data.remove(&attr);
                }
            }
        }
    }

    /// Writes an operation into the top (newest) generation.
    ///
    /// `None` clears any pending edit at that attribute without touching
    /// the server snapshot.
    pub fn set_pending_op(&mut self, attr: impl Into<String>, op: Option<OpRef>) {
        let top = self
            .pending_ops
            .last_mut()
            .expect("pending stack is never empty");
        match op {
            Some(op) => {
                top.insert(attr.into(), op);
            }
            None => {
                top.remove(&attr.into());
            }
        }
    }

    /// Pushes a new empty generation on top of the stack.
    ///
    /// Called immediately before a save is issued, so edits made while the
    /// save is in flight accumulate separately from the operations sent.
    pub fn push_pending_state(&mut self) {
        self.pending_ops.push(PendingOpSet::new());
    }

    /// Removes and returns the oldest generation.
    ///
    /// The stack never ends up empty: popping the last generation leaves a
    /// fresh empty one behind.
    pub fn pop_pending_state(&mut self) -> PendingOpSet {
        let popped = self.pending_ops.remove(0);
        if self.pending_ops.is_empty() {
            self.pending_ops.push(PendingOpSet::new());
        }
        popped
    }

    /// Returns true if the oldest generation can be merged forward.
    #[must_use]
    pub fn can_merge_first(&self) -> bool {
        self.pending_ops.len() >= 2
    }

    /// Merges the oldest generation into the one after it and drops it.
    ///
    /// Each attribute of the oldest generation is composed into the next:
    /// where both generations touch the same attribute, the newer
    /// operation is composed over the older via
    /// [`crate::AttributeOp::merge_with`]; otherwise the older operation
    /// moves forward unchanged. Used when a save must be retried together
    /// with subsequently queued edits instead of being resent alone.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two generations exist. Callers going through
    /// [`crate::StateStore`] get an error instead.
    pub fn merge_first_pending_state(&mut self) {
        assert!(
            self.can_merge_first(),
            "merge_first_pending_state requires at least two pending generations"
        );

        let oldest = self.pending_ops.remove(0);
        let next = &mut self.pending_ops[0];
        for (attr, older) in oldest {
            match next.get(&attr).cloned() {
                Some(newer) => {
                    next.insert(attr, newer.merge_with(&older));
                }
                None => {
                    next.insert(attr, older);
                }
            }
        }
    }

    /// Appends another state's pending generations onto this one.
    ///
    /// Used by identity migration when the destination identity already
    /// has state: the destination's server snapshot is kept, the source's
    /// unconfirmed edits are queued behind the destination's.
    pub(crate) fn absorb_pending(&mut self, other: ObjectState) {
        self.pending_ops.extend(other.pending_ops);
    }

    /// Computes the estimated attributes: the server snapshot with every
    /// pending generation applied, oldest first.
    #[must_use]
    pub fn estimate_attributes(&self) -> HashMap<String, Value> {
        let mut estimate = self.server_data.clone();
        for generation in &self.pending_ops {
            for (attr, op) in generation {
                match op.apply(estimate.get(attr)) {
                    Some(v) => {
                        estimate.insert(attr.clone(), v);
                    }
                    None => {
                        estimate.remove(attr);
                    }
                }
            }
        }
        estimate
    }
}

impl Default for ObjectState {
    fn default() -> Self {
        Self::new()
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

    #[derive(Debug, Clone)]
    struct Increment(i64);

    impl AttributeOp for Increment {
        fn apply(&self, previous: Option<&Value>) -> Option<Value> {
            let base = previous.and_then(Value::as_i64).unwrap_or(0);
            Some(json!(base + self.0))
        }

        fn merge_with(&self, older: &OpRef) -> OpRef {
            match older.apply(None) {
                Some(v) => Arc::new(Set(json!(v.as_i64().unwrap_or(0) + self.0))),
                None => Arc::new(Increment(self.0)),
            }
        }
    }

    fn set(value: Value) -> Option<OpRef> {
        Some(Arc::new(Set(value)))
    }

    fn patch(attr: &str, value: Option<Value>) -> AttributePatch {
        let mut attrs = AttributePatch::new();
        attrs.insert(attr.into(), value);
        attrs
    }

    #[test]
    fn fresh_state_shape() {
        let state = ObjectState::new();
        assert!(state.server_data().is_empty());
        assert_eq!(state.pending_ops().len(), 1);
        assert!(!state.has_pending_ops());
    }

    #[test]
    fn estimate_applies_ops_in_call_order() {
        let mut state = ObjectState::new();
        state.set_server_data(patch("score", Some(json!(10))));
        state.set_pending_op("score", Some(Arc::new(Increment(5))));
        state.set_pending_op("name", set(json!("x")));

        let estimate = state.estimate_attributes();
        assert_eq!(estimate.get("score"), Some(&json!(15)));
        assert_eq!(estimate.get("name"), Some(&json!("x")));
    }

    #[test]
    fn estimate_spans_generations_oldest_first() {
        let mut state = ObjectState::new();
        state.set_pending_op("score", Some(Arc::new(Increment(5))));
        state.push_pending_state();
        state.set_pending_op("score", Some(Arc::new(Increment(2))));

        assert_eq!(state.estimate_attributes().get("score"), Some(&json!(7)));
    }

    #[test]
    fn server_patch_none_deletes_key() {
        let mut state = ObjectState::new();
        state.set_server_data(patch("name", Some(json!("x"))));
        state.set_server_data(patch("name", None));

        assert!(state.server_data().is_empty());
    }

    #[test]
    fn clearing_pending_op_leaves_server_data() {
        let mut state = ObjectState::new();
        state.set_server_data(patch("name", Some(json!("server"))));
        state.set_pending_op("name", set(json!("local")));
        state.set_pending_op("name", None);

        assert_eq!(
            state.estimate_attributes().get("name"),
            Some(&json!("server"))
        );
    }

    #[test]
    fn pop_returns_oldest_and_never_empties_stack() {
        let mut state = ObjectState::new();
        state.set_pending_op("name", set(json!("x")));
        state.push_pending_state();
        state.set_pending_op("name", set(json!("y")));

        let popped = state.pop_pending_state();
        assert!(popped.contains_key("name"));
        assert_eq!(state.pending_ops().len(), 1);

        // Popping the final generation leaves a fresh empty one.
        let popped = state.pop_pending_state();
        assert!(popped.contains_key("name"));
        assert_eq!(state.pending_ops().len(), 1);
        assert!(!state.has_pending_ops());
    }

    #[test]
    fn merge_first_moves_unconflicted_ops_forward() {
        let mut state = ObjectState::new();
        state.set_pending_op("name", set(json!("x")));
        state.push_pending_state();
        state.set_pending_op("score", Some(Arc::new(Increment(1))));

        state.merge_first_pending_state();

        assert_eq!(state.pending_ops().len(), 1);
        let estimate = state.estimate_attributes();
        assert_eq!(estimate.get("name"), Some(&json!("x")));
        assert_eq!(estimate.get("score"), Some(&json!(1)));
    }

    #[test]
    fn merge_first_composes_conflicts_newer_wins() {
        let mut state = ObjectState::new();
        state.set_pending_op("name", set(json!("older")));
        state.set_pending_op("score", Some(Arc::new(Increment(10))));
        state.push_pending_state();
        state.set_pending_op("name", set(json!("newer")));
        state.set_pending_op("score", Some(Arc::new(Increment(5))));

        state.merge_first_pending_state();

        let estimate = state.estimate_attributes();
        assert_eq!(estimate.get("name"), Some(&json!("newer")));
        assert_eq!(estimate.get("score"), Some(&json!(15)));
    }

    #[test]
    #[should_panic(expected = "at least two pending generations")]
    fn merge_first_with_single_generation_panics() {
        let mut state = ObjectState::new();
        state.merge_first_pending_state();
    }

    #[test]
    fn pending_op_survives_server_update_to_same_attribute() {
        let mut state = ObjectState::new();
        state.set_pending_op("name", set(json!("local")));
        state.set_server_data(patch("name", Some(json!("server"))));

        assert_eq!(
            state.estimate_attributes().get("name"),
            Some(&json!("local"))
        );
        assert_eq!(state.server_data().get("name"), Some(&json!("server")));
    }
}
