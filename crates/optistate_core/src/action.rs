//! Action vocabulary for the dispatcher.

use crate::current::CurrentCache;
use crate::identity::ObjectIdentity;
use crate::object_state::{AttributePatch, ObjectState, PendingOpSet};
use crate::operation::OpRef;

/// A tagged command on the dispatcher's single ordered channel.
///
/// Every mutation of the process-wide state table is expressed as one of
/// these commands and applied atomically with respect to all others.
/// Enqueueing a task is part of the same vocabulary but carries a future,
/// so it enters through [`crate::StateStore::enqueue_task`] rather than a
/// data variant.
#[derive(Debug, Clone)]
pub enum Action {
    /// Create state for an identity if absent; no-op otherwise.
    InitializeState {
        /// The identity to initialize.
        identity: ObjectIdentity,
    },
    /// Delete an identity's state entirely.
    RemoveState {
        /// The identity to remove.
        identity: ObjectIdentity,
    },
    /// Shallow-merge a patch into the server snapshot.
    SetServerData {
        /// The identity to update.
        identity: ObjectIdentity,
        /// The patch; `None` entries delete keys.
        attrs: AttributePatch,
    },
    /// Write (or clear) an operation in the top pending generation.
    SetPendingOp {
        /// The identity to update.
        identity: ObjectIdentity,
        /// The attribute the operation targets.
        attr: String,
        /// The operation, or `None` to clear the pending edit.
        op: Option<OpRef>,
    },
    /// Push a new empty pending generation.
    PushPendingState {
        /// The identity to update.
        identity: ObjectIdentity,
    },
    /// Remove and return the oldest pending generation.
    PopPendingState {
        /// The identity to update.
        identity: ObjectIdentity,
    },
    /// Merge the oldest pending generation into the one after it.
    MergeFirstPendingState {
        /// The identity to update.
        identity: ObjectIdentity,
    },
    /// Install authoritative attributes at the close of a save or fetch.
    ///
    /// Same mechanics as [`Action::SetServerData`]; the distinct tag
    /// documents intent.
    CommitServerChanges {
        /// The identity to update.
        identity: ObjectIdentity,
        /// The confirmed attributes; `None` entries delete keys.
        attrs: AttributePatch,
    },
    /// Move state from a client-generated identity to its server-assigned
    /// twin without breaking references held elsewhere.
    MigrateIdentity {
        /// The identity whose id the server replaced.
        from: ObjectIdentity,
        /// The identity under the server-assigned id.
        to: ObjectIdentity,
    },
    /// Replace the current-identity cache.
    SetCurrentIdentity {
        /// The new cache contents.
        cache: CurrentCache,
    },
    /// Discard every object state and reset the current-identity cache.
    ClearAllState,
}

/// Data returned by a dispatched action.
#[derive(Debug)]
pub enum ActionOutcome {
    /// The action carries no data back.
    Done,
    /// The state as it exists after `INITIALIZE_STATE`.
    Initialized(ObjectState),
    /// The state removed by `REMOVE_STATE`, if any existed.
    Removed(Option<ObjectState>),
    /// The generation detached by `POP_PENDING_STATE`.
    Popped(PendingOpSet),
}
