//! Backing store gateway port
//!
//! Narrow contract over the authoritative, eventually-consistent remote
//! store: generic select/insert/update/delete plus a change-subscription
//! primitive. Rows travel as JSON values; entities (de)serialize with serde.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::DomainError;
use crate::events::ChangeFeed;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, DomainError>;

/// Collections the sync core reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Conversations,
    Messages,
    Connections,
    Challenges,
}

impl Collection {
    /// Stable collection name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Conversations => "conversations",
            Self::Messages => "messages",
            Self::Connections => "connections",
            Self::Challenges => "challenges",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Field-equality conjunction filter over JSON rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter(Vec<(String, Value)>);

impl Filter {
    /// Match every row
    #[must_use]
    pub fn all() -> Self {
        Self(Vec::new())
    }

    /// Match rows whose `field` equals `value`
    pub fn field(field: impl Into<String>, value: Value) -> Self {
        Self(vec![(field.into(), value)])
    }

    /// Add another equality condition (conjunction)
    #[must_use]
    pub fn and(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.push((field.into(), value));
        self
    }

    /// Evaluate the filter against a row
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.0
            .iter()
            .all(|(field, value)| row.get(field) == Some(value))
    }

    /// Whether this filter matches everything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sort order for selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

impl Order {
    /// Ascending order on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Backing store gateway port
///
/// `insert` returns the durable row as stored, including the server-issued
/// id and timestamp the caller needs for reconciliation.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Select rows matching `filter`, optionally ordered
    async fn select(
        &self,
        collection: Collection,
        filter: Filter,
        order: Option<Order>,
    ) -> GatewayResult<Vec<Value>>;

    /// Insert a row, returning it as durably stored
    async fn insert(&self, collection: Collection, row: Value) -> GatewayResult<Value>;

    /// Patch all rows matching `filter`; returns the number of rows touched
    async fn update(&self, collection: Collection, filter: Filter, patch: Value)
        -> GatewayResult<u64>;

    /// Delete all rows matching `filter`; returns the number of rows removed
    async fn delete(&self, collection: Collection, filter: Filter) -> GatewayResult<u64>;

    /// Subscribe to row-level changes in a collection. Dropping the feed
    /// unsubscribes; cancellation is synchronous.
    fn subscribe(&self, collection: Collection, filter: Filter) -> ChangeFeed;
}
