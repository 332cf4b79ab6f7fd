//! Identifier types.
//!
//! Two families of identifiers exist:
//!
//! - **Engine keys** ([`GameKey`], [`WorldKey`], [`PlayerKey`], [`EntityKey`], [`MapKey`])
//!   are process-unique integers handed out by the engine when an object is
//!   created. They never leave the process and are never reused.
//! - **Object handles** ([`ObjectId`]) are the stable integers external
//!   clients use in paths and bodies. They are allocated by the identity
//!   registry and always travel as JSON strings.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

/// Generates a process-unique key newtype backed by its own counter.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Allocate the next key. Keys start at 1 and are never reused.
            pub fn new() -> Self {
                static NEXT: AtomicU64 = AtomicU64::new(1);
                Self(NEXT.fetch_add(1, Ordering::Relaxed))
            }

            /// Return the raw integer value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_key! {
    /// Key of a game placeholder that has not been started yet.
    GameKey
}

define_key! {
    /// Key of one simulated world (a started game).
    WorldKey
}

define_key! {
    /// Key of a player. Allocated when the player joins a placeholder and
    /// kept when the placeholder turns into a running world.
    PlayerKey
}

define_key! {
    /// Key of an entity placed on a world: building, flag, road, tree,
    /// stone, sign, crop, worker or wild animal.
    EntityKey
}

define_key! {
    /// Key of a map template in the catalog.
    MapKey
}

/// Stable external handle of an addressable object.
///
/// Serialized as a JSON string. Deserialization accepts both strings and
/// numbers since clients have historically sent either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ObjectId(#[ts(type = "string")] u64);

impl ObjectId {
    /// Wrap a raw handle value. Returns `None` for zero, which is never a
    /// valid handle.
    pub const fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    /// Return the raw integer value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// The first handle ever allocated.
    pub const FIRST: Self = Self(1);

    /// The handle allocated after this one.
    pub const fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl core::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string is not a valid object handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseObjectIdError(String);

impl core::fmt::Display for ParseObjectIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid object id: {:?}", self.0)
    }
}

impl std::error::Error for ParseObjectIdError {}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .ok()
            .and_then(Self::from_raw)
            .ok_or_else(|| ParseObjectIdError(s.to_owned()))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ObjectIdVisitor;

        impl Visitor<'_> for ObjectIdVisitor {
            type Value = ObjectId;

            fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("a positive integer id as a string or number")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ObjectId, E> {
                ObjectId::from_raw(v).ok_or_else(|| E::custom("object id must be positive"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ObjectId, E> {
                u64::try_from(v)
                    .ok()
                    .and_then(ObjectId::from_raw)
                    .ok_or_else(|| E::custom("object id must be positive"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ObjectId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ObjectIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique_and_increasing() {
        let a = EntityKey::new();
        let b = EntityKey::new();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }

    #[test]
    fn object_id_serializes_as_string() {
        let id = ObjectId::from_raw(42);
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"42\""));
    }

    #[test]
    fn object_id_accepts_string_and_number() {
        let from_str: Result<ObjectId, _> = serde_json::from_str("\"7\"");
        let from_num: Result<ObjectId, _> = serde_json::from_str("7");
        assert_eq!(from_str.ok(), ObjectId::from_raw(7));
        assert_eq!(from_num.ok(), ObjectId::from_raw(7));
    }

    #[test]
    fn zero_and_negative_ids_are_rejected() {
        assert!(ObjectId::from_raw(0).is_none());
        assert!(serde_json::from_str::<ObjectId>("0").is_err());
        assert!(serde_json::from_str::<ObjectId>("-3").is_err());
        assert!("abc".parse::<ObjectId>().is_err());
    }
}
