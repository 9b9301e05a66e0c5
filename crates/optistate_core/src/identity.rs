//! Object identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix for client-generated ids that a server has not yet replaced.
const LOCAL_ID_PREFIX: &str = "local_";

/// Stable key identifying one logical server-backed entity.
///
/// An identity is the pair of an entity type name and an object id. Objects
/// created locally carry a client-generated id (`local_<uuid>`) until the
/// server assigns a real one; the state table migrates the entry in place
/// when that happens, so references held elsewhere stay valid.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    type_name: String,
    object_id: String,
}

impl ObjectIdentity {
    /// Creates an identity from a type name and object id.
    pub fn new(type_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            object_id: object_id.into(),
        }
    }

    /// Creates an identity with a fresh client-generated local id.
    #[must_use]
    pub fn local(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            object_id: format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()),
        }
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the object id.
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Returns true if the id is client-generated and not yet replaced by
    /// a server-assigned one.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.object_id.starts_with(LOCAL_ID_PREFIX)
    }

    /// Returns the same identity under a server-assigned object id.
    #[must_use]
    pub fn with_object_id(&self, object_id: impl Into<String>) -> Self {
        Self {
            type_name: self.type_name.clone(),
            object_id: object_id.into(),
        }
    }
}

impl fmt::Debug for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectIdentity({}:{})", self.type_name, self.object_id)
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_prefixed_and_unique() {
        let a = ObjectIdentity::local("Player");
        let b = ObjectIdentity::local("Player");

        assert!(a.is_local());
        assert!(b.is_local());
        assert_ne!(a, b);
    }

    #[test]
    fn server_ids_are_not_local() {
        let id = ObjectIdentity::new("Player", "xWMyZ4YEGZ");
        assert!(!id.is_local());
    }

    #[test]
    fn with_object_id_keeps_type() {
        let local = ObjectIdentity::local("Player");
        let migrated = local.with_object_id("xWMyZ4YEGZ");

        assert_eq!(migrated.type_name(), "Player");
        assert_eq!(migrated.object_id(), "xWMyZ4YEGZ");
        assert!(!migrated.is_local());
    }

    #[test]
    fn identity_display() {
        let id = ObjectIdentity::new("Player", "p1");
        assert_eq!(format!("{id}"), "Player:p1");
    }
}
