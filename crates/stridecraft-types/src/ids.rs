//! Type-safe identifier wrappers.
//!
//! Activity, variant, location, and item identifiers are opaque strings
//! resolved by external registries. Each gets its own newtype so an item id
//! can never be passed where a variant id is expected. An empty identifier
//! is never a valid reference; sessions built from empty ids are the "no
//! active session" sentinel.
//!
//! [`SessionId`] is the only engine-generated identifier. It uses UUID v7
//! (time-ordered) so log lines and stop records sort by start time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a transparent newtype wrapper around [`String`].
macro_rules! define_name_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (never a valid reference).
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_name_id! {
    /// Identifier of an activity (e.g. `mining`, `smithing`).
    ActivityId
}

define_name_id! {
    /// Identifier of a variant within an activity (e.g. `copper_vein`).
    VariantId
}

define_name_id! {
    /// Identifier of a map location.
    LocationId
}

define_name_id! {
    /// Identifier of an inventory item.
    ItemId
}

/// Unique identifier of one started activity session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
