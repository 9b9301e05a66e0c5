//! Attribute operation capability.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shared handle to an attribute operation.
///
/// Pending generations hold operations behind an `Arc` so cloning a state
/// snapshot never copies operation payloads.
pub type OpRef = Arc<dyn AttributeOp>;

/// An abstract composable edit to a single attribute.
///
/// The engine treats operations as opaque units: it never inspects what an
/// operation does, only applies and composes them. Concrete operation kinds
/// (set, increment, array edits, relation edits) are supplied by the entity
/// layer.
///
/// # Contract
///
/// - `apply` is pure with respect to the engine: given the previous value
///   of the attribute it yields the new one, `None` meaning the attribute
///   is removed
/// - `merge_with` composes the receiver (the newer operation) with an
///   older one targeting the same attribute; the result must behave like
///   "older, then newer" under `apply`, and the newer operation wins where
///   the two conflict
pub trait AttributeOp: fmt::Debug + Send + Sync {
    /// Applies this operation on top of the attribute's previous value.
    ///
    /// `None` in means the attribute is currently unset; `None` out
    /// removes it.
    fn apply(&self, previous: Option<&Value>) -> Option<Value>;

    /// Composes this operation with an older one for the same attribute.
    fn merge_with(&self, older: &OpRef) -> OpRef;
}
