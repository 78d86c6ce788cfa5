//! Entity identifiers
//!
//! All durable ids are UUIDv4. Message ids carry an extra dimension: a
//! message inserted optimistically gets a client-local id that is later
//! swapped in place for the durable id issued by the backing store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            #[inline]
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Get the inner UUID
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Conversation identifier
    ConversationId
);
uuid_id!(
    /// Channel connection instance identifier
    ConnectionId
);
uuid_id!(
    /// Verification challenge identifier
    ChallengeId
);
uuid_id!(
    /// Authenticated principal (agent/user) identifier
    PrincipalId
);

/// Message identifier
///
/// `Local` ids exist only on this client, assigned at optimistic insert time.
/// `Durable` ids are issued by the backing store. Reconciliation replaces a
/// `Local` id with its `Durable` counterpart in the same list slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MessageId {
    Local(Uuid),
    Durable(Uuid),
}

impl MessageId {
    /// Generate a fresh client-local id
    #[must_use]
    pub fn generate_local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    /// Wrap a store-issued UUID
    #[inline]
    #[must_use]
    pub const fn durable(id: Uuid) -> Self {
        Self::Durable(id)
    }

    /// Check whether this id is client-local (not yet confirmed)
    #[inline]
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Get the inner UUID regardless of provenance
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        match self {
            Self::Local(id) | Self::Durable(id) => *id,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "local:{id}"),
            Self::Durable(id) => write!(f, "{id}"),
        }
    }
}

/// Weak reference to the client (end customer) a conversation belongs to.
///
/// Lookup key only: this core never owns or mutates client records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientRef(String);

impl ClientRef {
    /// Create a client reference from an opaque external key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the underlying key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
