//! # OptiState Core
//!
//! Optimistic object state and pending-operation coordination for
//! server-backed entities.
//!
//! This crate provides:
//! - Per-object state: confirmed server attributes plus stacked generations
//!   of pending local operations
//! - A single-writer action dispatcher owning the process-wide state table
//! - A per-object task queue that applies network completion effects in
//!   issue order, even when completions arrive out of order
//! - A current-identity cache coordinated with a persistent snapshot store
//!
//! ## Architecture
//!
//! All mutation funnels through one ordered channel: callers dispatch
//! tagged [`Action`]s (or call the equivalent typed methods) against a
//! [`StateStore`], which applies exactly one action at a time. Estimated
//! attributes are never stored; they are computed on read by applying every
//! pending generation, oldest first, on top of the confirmed server data.
//!
//! Saves follow a push/pop discipline: [`StateStore::push_pending_state`]
//! opens a fresh generation before a save is issued, so edits made during
//! the save accumulate separately; once the server answers,
//! [`StateStore::pop_pending_state`] detaches the generation that was sent
//! and [`StateStore::commit_server_changes`] installs the authoritative
//! result. A failed save leaves its generation in place, ready to be
//! retried or folded forward with
//! [`StateStore::merge_first_pending_state`].
//!
//! ## Key Invariants
//!
//! - An initialized object always has at least one pending generation
//! - At most one generation per object is in flight, always the oldest
//! - Completion effects for one object apply in issue order
//! - A still-pending local operation is never clobbered by unrelated
//!   server updates; it continues to apply on top of new server data

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod config;
mod current;
mod dispatcher;
mod error;
mod identity;
mod object_state;
mod operation;
mod task_queue;
mod transport;

pub use action::{Action, ActionOutcome};
pub use config::CurrentIdentityConfig;
pub use current::{CurrentCache, CurrentIdentity, CurrentIdentityManager, IdentitySnapshot};
pub use dispatcher::StateStore;
pub use error::{StateError, StateResult};
pub use identity::ObjectIdentity;
pub use object_state::{AttributePatch, ObjectState, PendingOpSet};
pub use operation::{AttributeOp, OpRef};
pub use task_queue::{ObjectTaskQueue, TaskHandle};
pub use transport::{MockTransport, SessionTransport};
