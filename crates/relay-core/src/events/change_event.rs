//! Typed change events
//!
//! The backing store pushes row-level changes; the sync engine consumes
//! them through a `ChangeFeed`, turning push callbacks into a pull-based
//! merge step. Dropping a feed unsubscribes it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::traits::{Collection, Filter};

/// What happened to the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// One row-level change in a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub row: serde_json::Value,
}

impl ChangeEvent {
    /// Create an insert event
    pub fn inserted(collection: Collection, row: serde_json::Value) -> Self {
        Self {
            collection,
            kind: ChangeKind::Inserted,
            row,
        }
    }

    /// Create an update event
    pub fn updated(collection: Collection, row: serde_json::Value) -> Self {
        Self {
            collection,
            kind: ChangeKind::Updated,
            row,
        }
    }

    /// Create a delete event carrying the removed row
    pub fn deleted(collection: Collection, row: serde_json::Value) -> Self {
        Self {
            collection,
            kind: ChangeKind::Deleted,
            row,
        }
    }
}

/// Error while pulling from a change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The consumer fell behind and events were dropped. The gap is closed
    /// by a cold resync, not by replaying individual events.
    #[error("change feed lagged, {0} events dropped")]
    Lagged(u64),

    /// The producer side went away
    #[error("change feed closed")]
    Closed,
}

/// Pull-based handle over a store subscription
///
/// Filters events locally so every subscriber sees only the rows matching
/// its filter. Dropping the feed is the unsubscribe operation.
#[derive(Debug)]
pub struct ChangeFeed {
    collection: Collection,
    filter: Filter,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    /// Wrap a broadcast receiver with a collection/filter view
    pub fn new(collection: Collection, filter: Filter, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            collection,
            filter,
            rx,
        }
    }

    /// The collection this feed observes
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Receive the next matching event, skipping rows outside the filter.
    pub async fn recv(&mut self) -> Result<ChangeEvent, FeedError> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if event.collection == self.collection && self.filter.matches(&event.row) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(FeedError::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }
}
