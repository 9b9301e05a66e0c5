//! # OptiState Store
//!
//! Snapshot store trait and backends for OptiState.
//!
//! This crate provides the persistence abstraction used by the
//! current-identity coordinator in `optistate_core`. Stores are **opaque
//! string-to-string maps** - they do not interpret the snapshots they hold.
//!
//! ## Design Principles
//!
//! - Stores are simple key-value maps (get, set, remove, clear)
//! - Each store declares whether it supports synchronous reads
//! - An asynchronous-only store refuses synchronous reads instead of
//!   silently returning stale or absent data
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`MemoryStore`] - For testing and ephemeral storage
//! - [`FileStore`] - A single JSON file with atomic writes
//!
//! ## Example
//!
//! ```rust
//! use optistate_store::{MemoryStore, SnapshotStore};
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let store = MemoryStore::new();
//! store.set("session", "abc").await.unwrap();
//! assert_eq!(store.get("session").await.unwrap(), Some("abc".into()));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{SnapshotStore, StoreMode};
