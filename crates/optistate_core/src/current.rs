//! Current-identity cache and persistence coordination.

use crate::config::CurrentIdentityConfig;
use crate::dispatcher::StateStore;
use crate::error::{StateError, StateResult};
use crate::identity::ObjectIdentity;
use crate::object_state::AttributePatch;
use crate::transport::SessionTransport;
use optistate_store::SnapshotStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix marking a session token that must be revoked server-side.
const REVOCABLE_SESSION_PREFIX: &str = "r:";

/// The distinguished "current session owner" reference.
///
/// Non-owning: it does not keep the underlying object state alive beyond
/// normal rules. The owner's attributes live in the state table like any
/// other object's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentIdentity {
    /// The owner's object identity.
    pub identity: ObjectIdentity,
    /// The owner's session token, if one was issued.
    pub session_token: Option<String>,
}

impl CurrentIdentity {
    /// Returns true if the session token must be invalidated server-side
    /// on logout.
    #[must_use]
    pub fn has_revocable_session(&self) -> bool {
        self.session_token
            .as_deref()
            .is_some_and(|token| token.starts_with(REVOCABLE_SESSION_PREFIX))
    }
}

/// Memory cache over the persisted current identity.
///
/// The three states make "absent because we checked" distinguishable from
/// "absent because nobody looked yet":
///
/// - `Unknown`: memory unpopulated; only a store read can answer
/// - `Present`: a current identity is cached; reads return it without I/O
/// - `Absent`: memory has been reconciled with the store and there is no
///   current identity; absence is authoritative, so reads return it
///   without I/O
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CurrentCache {
    /// Memory unpopulated; the store has not been consulted.
    #[default]
    Unknown,
    /// A current identity is cached in memory.
    Present(CurrentIdentity),
    /// Reconciled with the store: there is no current identity.
    Absent,
}

impl CurrentCache {
    /// Returns true once memory has been reconciled with the store, so a
    /// negative answer is authoritative rather than unpopulated.
    #[must_use]
    pub fn matches_disk(&self) -> bool {
        !matches!(self, CurrentCache::Unknown)
    }
}

/// Serialized form of the current identity, as persisted.
///
/// Attributes flatten into the same JSON object as the identifying
/// fields, tagged with the entity's type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Entity type tag.
    #[serde(rename = "__type")]
    pub type_name: String,
    /// Server-assigned object id.
    #[serde(rename = "objectId")]
    pub object_id: String,
    /// Session token, if one was issued.
    #[serde(
        rename = "sessionToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_token: Option<String>,
    /// Full attribute snapshot.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl IdentitySnapshot {
    /// Creates a snapshot with no session token and no attributes.
    pub fn new(type_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            object_id: object_id.into(),
            session_token: None,
            attributes: Map::new(),
        }
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Adds one attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// Decodes a persisted snapshot, translating field names written by older
/// releases (`_id`, `_sessionToken`).
fn decode_snapshot(raw: &str) -> StateResult<IdentitySnapshot> {
    let mut value: Value =
        serde_json::from_str(raw).map_err(|e| StateError::CorruptSnapshot(e.to_string()))?;
    let Some(fields) = value.as_object_mut() else {
        return Err(StateError::CorruptSnapshot("expected a JSON object".into()));
    };

    if let Some(id) = fields.remove("_id") {
        fields.entry("objectId").or_insert(id);
    }
    if let Some(token) = fields.remove("_sessionToken") {
        fields.entry("sessionToken").or_insert(token);
    }

    serde_json::from_value(value).map_err(|e| StateError::CorruptSnapshot(e.to_string()))
}

/// Coordinates the current-identity cache with a persistent snapshot store.
///
/// Reads and writes go through the same dispatcher as every other state
/// mutation, so "who is the current session owner" changes are observable
/// exactly like any object attribute change. The memory cache is updated
/// synchronously on writes (read-your-writes within the process) while the
/// persistent write is awaited by the caller.
pub struct CurrentIdentityManager {
    store: Arc<StateStore>,
    snapshots: Arc<dyn SnapshotStore>,
    transport: Option<Arc<dyn SessionTransport>>,
    config: CurrentIdentityConfig,
}

impl CurrentIdentityManager {
    /// Creates a manager over a state store and a snapshot store.
    pub fn new(store: Arc<StateStore>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            snapshots,
            transport: None,
            config: CurrentIdentityConfig::default(),
        }
    }

    /// Attaches a transport used for best-effort session revocation.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn SessionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: CurrentIdentityConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the current identity, reading the store only if memory has
    /// never been reconciled with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or the persisted snapshot
    /// is corrupt.
    pub async fn current(&self) -> StateResult<Option<CurrentIdentity>> {
        match self.store.current_identity_cache() {
            CurrentCache::Present(current) => Ok(Some(current)),
            CurrentCache::Absent => Ok(None),
            CurrentCache::Unknown => {
                let raw = self.snapshots.get(&self.config.storage_key).await?;
                self.finish_load(raw)
            }
        }
    }

    /// Returns the current identity without suspending.
    ///
    /// # Errors
    ///
    /// Returns a usage error if memory is unpopulated and the store is
    /// asynchronous-only: failing fast beats silently answering "absent"
    /// from a store that was never read. Also fails on a corrupt snapshot.
    pub fn current_sync(&self) -> StateResult<Option<CurrentIdentity>> {
        match self.store.current_identity_cache() {
            CurrentCache::Present(current) => Ok(Some(current)),
            CurrentCache::Absent => Ok(None),
            CurrentCache::Unknown => {
                let raw = self.snapshots.get_sync(&self.config.storage_key)?;
                self.finish_load(raw)
            }
        }
    }

    /// Makes `snapshot` the current identity.
    ///
    /// Memory (and the state table) are updated before the persistent
    /// write settles, so an immediate read observes the new owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistent write fails. The memory cache
    /// keeps the new owner either way.
    pub async fn set_current(&self, snapshot: IdentitySnapshot) -> StateResult<CurrentIdentity> {
        let current = self.install(&snapshot);
        debug!(identity = %current.identity, "current identity set");

        let raw = serde_json::to_string(&snapshot)
            .map_err(|e| StateError::CorruptSnapshot(e.to_string()))?;
        self.snapshots.set(&self.config.storage_key, &raw).await?;
        Ok(current)
    }

    /// Logs the current identity out.
    ///
    /// Removes the persisted snapshot, marks memory authoritatively
    /// absent, and - when the session token is revocable - fires a
    /// best-effort server-side revocation that does not block logout
    /// beyond the store removal. Revocation failures are logged, not
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the store removal fails; the cache is left
    /// untouched so a retry behaves identically.
    pub async fn logout(&self) -> StateResult<()> {
        let previous = self.store.current_identity_cache();
        self.snapshots.remove(&self.config.storage_key).await?;
        self.store.set_current_identity(CurrentCache::Absent);
        debug!("current identity logged out");

        if let CurrentCache::Present(current) = previous {
            if current.has_revocable_session() {
                if let (Some(transport), Some(token)) =
                    (self.transport.clone(), current.session_token)
                {
                    tokio::spawn(async move {
                        if let Err(error) = transport.revoke_session(&token).await {
                            warn!(%error, "best-effort session revocation failed");
                        }
                    });
                }
            }
        }
        Ok(())
    }

    /// Installs a snapshot as the current identity: seeds the state table
    /// and updates the memory cache through the dispatcher.
    fn install(&self, snapshot: &IdentitySnapshot) -> CurrentIdentity {
        let identity = ObjectIdentity::new(&snapshot.type_name, &snapshot.object_id);
        let current = CurrentIdentity {
            identity: identity.clone(),
            session_token: snapshot.session_token.clone(),
        };

        self.store.initialize_state(&identity);
        let attrs: AttributePatch = snapshot
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), Some(value.clone())))
            .collect();
        self.store.commit_server_changes(&identity, attrs);
        self.store
            .set_current_identity(CurrentCache::Present(current.clone()));
        current
    }

    fn finish_load(&self, raw: Option<String>) -> StateResult<Option<CurrentIdentity>> {
        match raw {
            None => {
                debug!("no persisted current identity; caching absence");
                self.store.set_current_identity(CurrentCache::Absent);
                Ok(None)
            }
            Some(raw) => {
                let snapshot = decode_snapshot(&raw)?;
                let current = self.install(&snapshot);
                debug!(identity = %current.identity, "current identity loaded from store");
                Ok(Some(current))
            }
        }
    }
}
