//! Realtime sync engine
//!
//! Subscribes to remote change events and merges them into the local
//! conversation store. On every (re)subscription a full cold resync runs
//! before incremental events are processed, closing any gap left by a
//! prior disconnection; events missed mid-gap are not replayed
//! individually. Transport drops reconnect with capped backoff.

mod backoff;
mod subscription;

pub use backoff::Backoff;
pub use subscription::{ConnectionStatus, SubscriptionHandle};

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use relay_core::{
    ChangeKind, Collection, ConversationId, DomainError, Filter, Order, PrincipalId, StoreGateway,
};
use relay_store::{ConversationRecord, LocalConversationStore, MessageRecord};

/// Realtime sync engine
pub struct SyncEngine {
    gateway: Arc<dyn StoreGateway>,
    store: Arc<LocalConversationStore>,
    backoff_base: Duration,
    backoff_ceiling: Duration,
}

impl SyncEngine {
    /// Create an engine over the given gateway and local store
    pub fn new(
        gateway: Arc<dyn StoreGateway>,
        store: Arc<LocalConversationStore>,
        backoff_base: Duration,
        backoff_ceiling: Duration,
    ) -> Self {
        Self {
            gateway,
            store,
            backoff_base,
            backoff_ceiling,
        }
    }

    /// Subscribe to remote changes for a principal, optionally scoped to a
    /// single conversation. The returned handle cancels synchronously and
    /// exposes the connection status for caller feedback.
    pub fn subscribe(
        &self,
        principal: PrincipalId,
        conversation: Option<ConversationId>,
    ) -> SubscriptionHandle {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let worker = Worker {
            gateway: Arc::clone(&self.gateway),
            store: Arc::clone(&self.store),
            principal,
            conversation,
            backoff: Backoff::new(self.backoff_base, self.backoff_ceiling),
        };
        let task = tokio::spawn(worker.run(status_tx));
        SubscriptionHandle::new(task, status_rx)
    }
}

struct Worker {
    gateway: Arc<dyn StoreGateway>,
    store: Arc<LocalConversationStore>,
    principal: PrincipalId,
    conversation: Option<ConversationId>,
    backoff: Backoff,
}

impl Worker {
    #[instrument(skip(self, status), fields(principal = %self.principal))]
    async fn run(mut self, status: watch::Sender<ConnectionStatus>) {
        loop {
            let _ = status.send(ConnectionStatus::Connecting);

            // Subscribe before the cold resync so no change can slip into
            // the gap between fetch and feed
            let mut conversation_feed = self
                .gateway
                .subscribe(Collection::Conversations, self.conversation_filter());
            let mut message_feed = self
                .gateway
                .subscribe(Collection::Messages, self.message_filter());

            match self.cold_resync().await {
                Ok(()) => {
                    debug!("Cold resync complete, consuming feed");
                    let _ = status.send(ConnectionStatus::Connected);
                    self.backoff.reset();
                }
                Err(e) => {
                    warn!(error = %e, "Cold resync failed");
                    let _ = status.send(ConnectionStatus::Error);
                    self.wait_backoff().await;
                    continue;
                }
            }

            // Incremental merge until the transport drops
            loop {
                let result = tokio::select! {
                    event = conversation_feed.recv() => event,
                    event = message_feed.recv() => event,
                };
                match result {
                    Ok(event) => self.apply(event),
                    Err(e) => {
                        warn!(error = %e, "Change feed dropped");
                        break;
                    }
                }
            }

            let _ = status.send(ConnectionStatus::Disconnected);
            self.wait_backoff().await;
        }
    }

    fn conversation_filter(&self) -> Filter {
        let filter = Filter::field("owner", json!(self.principal));
        match self.conversation {
            Some(id) => filter.and("id", json!(id)),
            None => filter,
        }
    }

    fn message_filter(&self) -> Filter {
        match self.conversation {
            Some(id) => Filter::field("conversation_id", json!(id)),
            // Unscoped: merge drops rows for conversations we do not hold
            None => Filter::all(),
        }
    }

    /// Full refetch of current state; the merge rules make replaying
    /// already-known rows a no-op.
    async fn cold_resync(&self) -> Result<(), DomainError> {
        let conversations = self
            .gateway
            .select(
                Collection::Conversations,
                self.conversation_filter(),
                Some(Order::asc("created_at")),
            )
            .await?;
        for row in &conversations {
            match ConversationRecord::from_row(row) {
                Ok(record) => self.store.upsert_conversation(record.into_conversation()),
                Err(e) => warn!(error = %e, "Skipping malformed conversation row"),
            }
        }

        let messages = self
            .gateway
            .select(
                Collection::Messages,
                self.message_filter(),
                Some(Order::asc("created_at")),
            )
            .await?;
        for row in &messages {
            match MessageRecord::from_row(row) {
                Ok(record) => self.store.merge_remote_message(record.into_message()),
                Err(e) => warn!(error = %e, "Skipping malformed message row"),
            }
        }

        Ok(())
    }

    fn apply(&self, event: relay_core::ChangeEvent) {
        match (event.collection, event.kind) {
            (Collection::Messages, ChangeKind::Inserted | ChangeKind::Updated) => {
                match MessageRecord::from_row(&event.row) {
                    Ok(record) => {
                        let message = record.into_message();
                        let conversation_id = message.conversation_id;
                        let created_at = message.created_at;
                        self.store.merge_remote_message(message);
                        self.store.bump_last_activity(conversation_id, created_at);
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed message event"),
                }
            }
            (Collection::Conversations, ChangeKind::Inserted | ChangeKind::Updated) => {
                match ConversationRecord::from_row(&event.row) {
                    Ok(record) => self.store.upsert_conversation(record.into_conversation()),
                    Err(e) => warn!(error = %e, "Skipping malformed conversation event"),
                }
            }
            // This core never deletes conversations or messages
            (_, ChangeKind::Deleted) => {
                debug!(collection = %event.collection, "Ignoring delete event");
            }
            _ => {}
        }
    }

    async fn wait_backoff(&mut self) {
        let delay = self.backoff.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
