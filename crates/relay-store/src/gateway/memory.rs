//! In-memory backing store gateway
//!
//! Implements the `StoreGateway` port over process-local state with a
//! broadcast change feed. Used by the integration tests and by embedders
//! that run without a remote backend. Supports failure injection and feed
//! interruption so reconnect/rollback paths can be exercised.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use relay_core::{
    ChangeEvent, ChangeFeed, Collection, DomainError, Filter, GatewayResult, Order, StoreGateway,
};

const FEED_BUFFER: usize = 1024;

/// In-memory gateway with a broadcast change feed
pub struct MemoryGateway {
    rows: DashMap<Collection, Vec<Value>>,
    // Swapped out wholesale by `interrupt_feed`, which closes every live
    // feed and forces subscribers through their reconnect path
    events: RwLock<broadcast::Sender<ChangeEvent>>,
    fail_next_insert: Mutex<Option<String>>,
    delay_next_insert: Mutex<Option<std::time::Duration>>,
    garble_next_insert: Mutex<bool>,
}

impl MemoryGateway {
    /// Create an empty gateway
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(FEED_BUFFER);
        Self {
            rows: DashMap::new(),
            events: RwLock::new(events),
            fail_next_insert: Mutex::new(None),
            delay_next_insert: Mutex::new(None),
            garble_next_insert: Mutex::new(false),
        }
    }

    /// Make the next `insert` fail with a persistence error
    pub fn fail_next_insert(&self, reason: impl Into<String>) {
        *self.fail_next_insert.lock() = Some(reason.into());
    }

    /// Hold the next `insert` for the given duration before it completes,
    /// keeping the caller in flight
    pub fn delay_next_insert(&self, delay: std::time::Duration) {
        *self.delay_next_insert.lock() = Some(delay);
    }

    /// Make the next `insert` store and broadcast the row normally but
    /// return a response the caller cannot decode, as if the reply were
    /// truncated in transit
    pub fn garble_next_insert(&self) {
        *self.garble_next_insert.lock() = true;
    }

    /// Drop the current change feed. Every subscribed `ChangeFeed` observes
    /// `Closed`, simulating a transport drop; later subscriptions attach to
    /// a fresh feed.
    pub fn interrupt_feed(&self) {
        let (fresh, _) = broadcast::channel(FEED_BUFFER);
        *self.events.write() = fresh;
        tracing::debug!("Change feed interrupted");
    }

    /// Total rows in a collection (test observability)
    pub fn row_count(&self, collection: Collection) -> usize {
        self.rows.get(&collection).map_or(0, |rows| rows.len())
    }

    /// Direct row insertion without event emission, for seeding state that
    /// predates a subscription.
    pub fn seed(&self, collection: Collection, row: Value) {
        self.rows.entry(collection).or_default().push(row);
    }

    fn emit(&self, event: ChangeEvent) {
        // No subscribers is fine
        let _ = self.events.read().send(event);
    }

    fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => {
                // Timestamps sort by instant, not lexicographically
                match (
                    chrono::DateTime::parse_from_rfc3339(x),
                    chrono::DateTime::parse_from_rfc3339(y),
                ) {
                    (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                    _ => x.cmp(y),
                }
            }
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreGateway for MemoryGateway {
    async fn select(
        &self,
        collection: Collection,
        filter: Filter,
        order: Option<Order>,
    ) -> GatewayResult<Vec<Value>> {
        let mut rows: Vec<Value> = self
            .rows
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ordering = Self::compare(
                    a.get(&order.field).unwrap_or(&Value::Null),
                    b.get(&order.field).unwrap_or(&Value::Null),
                );
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Value) -> GatewayResult<Value> {
        let delay = self.delay_next_insert.lock().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.fail_next_insert.lock().take() {
            return Err(DomainError::Persistence(reason));
        }

        let mut row = match row {
            Value::Object(map) => map,
            other => {
                return Err(DomainError::Gateway(format!(
                    "insert expects an object row, got {other}"
                )))
            }
        };

        // Server-issued identity and timestamp
        if !row.contains_key("id") {
            row.insert("id".into(), json!(Uuid::new_v4()));
        }
        if !row.contains_key("created_at") {
            row.insert("created_at".into(), json!(Utc::now()));
        }

        let stored = Value::Object(row);
        self.rows
            .entry(collection)
            .or_default()
            .push(stored.clone());

        tracing::trace!(collection = %collection, "Row inserted");
        self.emit(ChangeEvent::inserted(collection, stored.clone()));

        if std::mem::take(&mut *self.garble_next_insert.lock()) {
            return Ok(json!({}));
        }
        Ok(stored)
    }

    async fn update(
        &self,
        collection: Collection,
        filter: Filter,
        patch: Value,
    ) -> GatewayResult<u64> {
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(DomainError::Gateway(format!(
                    "update expects an object patch, got {other}"
                )))
            }
        };

        let mut touched = Vec::new();
        if let Some(mut rows) = self.rows.get_mut(&collection) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                if let Value::Object(map) = row {
                    for (key, value) in &patch {
                        map.insert(key.clone(), value.clone());
                    }
                    touched.push(row.clone());
                }
            }
        }

        for row in &touched {
            self.emit(ChangeEvent::updated(collection, row.clone()));
        }

        Ok(touched.len() as u64)
    }

    async fn delete(&self, collection: Collection, filter: Filter) -> GatewayResult<u64> {
        let mut removed = Vec::new();
        if let Some(mut rows) = self.rows.get_mut(&collection) {
            rows.retain(|row| {
                if filter.matches(row) {
                    removed.push(row.clone());
                    false
                } else {
                    true
                }
            });
        }

        for row in &removed {
            self.emit(ChangeEvent::deleted(collection, row.clone()));
        }

        Ok(removed.len() as u64)
    }

    fn subscribe(&self, collection: Collection, filter: Filter) -> ChangeFeed {
        ChangeFeed::new(collection, filter, self.events.read().subscribe())
    }
}
