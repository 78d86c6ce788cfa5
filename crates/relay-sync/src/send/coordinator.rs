//! Optimistic send coordinator
//!
//! Drives one send attempt through validation, authorization, optimistic
//! display, durable persistence, reconciliation or rollback, provider
//! dispatch, and the terminal activity bump. Sends are single-flight per
//! conversation: a concurrent second attempt is rejected outright, not
//! queued.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use validator::Validate;

use relay_core::{
    Collection, Conversation, ConversationId, DomainError, Filter, Message, MessageId,
    PrincipalId, ProviderDispatch, SenderKind, StoreGateway,
};
use relay_store::{ConversationRecord, LocalConversationStore, MessageDraft, MessageRecord};

use crate::session::ComposeBuffer;

/// Validated outbound payload
#[derive(Debug, Clone, Validate)]
pub struct OutboundDraft {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}

/// Durable outcome of a successful send
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: MessageId,
    pub created_at: DateTime<Utc>,
}

/// User-facing send notifications
///
/// Confirmations and failures are emitted here for views that are not
/// awaiting the call (debounced fires, watchdog expiries, async dispatch).
#[derive(Debug, Clone)]
pub enum SendEvent {
    Confirmed {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    Failed {
        conversation_id: ConversationId,
        error_code: &'static str,
    },
    /// Provider forwarding failed after durable persistence. Non-blocking:
    /// the durable record stands, delivery is retried out of band.
    DispatchWarning {
        conversation_id: ConversationId,
        detail: String,
    },
}

/// Optimistic send coordinator
pub struct SendCoordinator {
    gateway: Arc<dyn StoreGateway>,
    store: Arc<LocalConversationStore>,
    dispatch: Arc<dyn ProviderDispatch>,
    compose: Arc<ComposeBuffer>,
    in_flight: Arc<DashMap<ConversationId, ()>>,
    watchdog: Duration,
    events: broadcast::Sender<SendEvent>,
}

impl SendCoordinator {
    /// Create a coordinator over the given collaborators
    pub fn new(
        gateway: Arc<dyn StoreGateway>,
        store: Arc<LocalConversationStore>,
        dispatch: Arc<dyn ProviderDispatch>,
        compose: Arc<ComposeBuffer>,
        watchdog: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            gateway,
            store,
            dispatch,
            compose,
            in_flight: Arc::new(DashMap::new()),
            watchdog,
            events,
        }
    }

    /// Get a receiver for send notifications
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SendEvent> {
        self.events.subscribe()
    }

    /// Check whether a send is currently in flight for a conversation
    pub fn is_in_flight(&self, conversation_id: ConversationId) -> bool {
        self.in_flight.contains_key(&conversation_id)
    }

    /// Run one send attempt end to end.
    #[instrument(skip(self, content), fields(conversation_id = %conversation_id))]
    pub async fn send(
        &self,
        principal: PrincipalId,
        conversation_id: ConversationId,
        content: &str,
        sender_name: &str,
    ) -> Result<SendReceipt, DomainError> {
        // Validate: blocked before any network call, silent to the UI
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyContent);
        }
        let draft = OutboundDraft {
            content: trimmed.to_string(),
        };
        draft
            .validate()
            .map_err(|e| DomainError::Validation(e.to_string()))?;

        // Single-flight per conversation
        let _guard = FlightGuard::acquire(&self.in_flight, conversation_id)?;

        // Authorize: point-in-time ownership check, before any optimistic
        // mutation so content is never shown prematurely
        let conversation = match self.authorize(principal, conversation_id).await {
            Ok(conversation) => conversation,
            Err(e) => {
                self.emit_failure(conversation_id, &e);
                return Err(e);
            }
        };

        // A send can race ahead of the cold resync; create the local view
        // from the authorized conversation so the optimistic entry has a
        // place to land
        if self.store.conversation(conversation_id).is_none() {
            self.store.upsert_conversation(conversation.clone());
        }

        // Optimistic insert, then clear the compose buffer
        let message = Message::optimistic(
            conversation_id,
            draft.content.clone(),
            SenderKind::Human,
            sender_name.to_string(),
        );
        let local_id = message.id;
        self.store.insert_optimistic(message.clone());
        self.compose.clear();
        self.spawn_watchdog(conversation_id, local_id);

        // Persist durably
        let row = MessageDraft::from_message(&message).to_row();
        let confirmed = match self.gateway.insert(Collection::Messages, row).await {
            Ok(stored) => match MessageRecord::from_row(&stored) {
                Ok(record) => message.into_confirmed(record.id, record.created_at),
                Err(e) => {
                    // The row is durable but the response is unreadable; drop
                    // the optimistic entry and let the sync feed deliver the
                    // stored row. The compose buffer stays cleared, restoring
                    // it would invite a duplicate send.
                    self.store.remove_message(conversation_id, local_id);
                    warn!(error = %e, "Stored row unreadable, deferring to feed");
                    self.emit_failure(conversation_id, &e);
                    return Err(e);
                }
            },
            Err(e) => {
                self.rollback(conversation_id, local_id, content, &e);
                return Err(e);
            }
        };

        let receipt = SendReceipt {
            message_id: confirmed.id,
            created_at: confirmed.created_at,
        };
        self.store
            .reconcile(conversation_id, local_id, confirmed.clone());
        info!(message_id = %confirmed.id, "Message confirmed");
        let _ = self.events.send(SendEvent::Confirmed {
            conversation_id,
            message_id: confirmed.id,
        });

        // Dispatch to the external provider, detached from the UI flow
        if conversation.channel.requires_dispatch() {
            self.spawn_dispatch(principal, conversation_id, confirmed.content.clone());
        }

        // Terminal activity bump, regardless of dispatch outcome
        self.bump_activity(conversation_id, confirmed.created_at).await;

        Ok(receipt)
    }

    async fn authorize(
        &self,
        principal: PrincipalId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, DomainError> {
        let rows = self
            .gateway
            .select(
                Collection::Conversations,
                Filter::field("id", json!(conversation_id)),
                None,
            )
            .await?;
        let row = rows
            .first()
            .ok_or(DomainError::ConversationNotFound(conversation_id))?;
        let conversation = ConversationRecord::from_row(row)?.into_conversation();

        if !conversation.is_owned_by(principal) {
            return Err(DomainError::NotConversationOwner(conversation_id));
        }
        Ok(conversation)
    }

    fn rollback(
        &self,
        conversation_id: ConversationId,
        local_id: MessageId,
        original_content: &str,
        error: &DomainError,
    ) {
        self.store.remove_message(conversation_id, local_id);
        self.compose.restore(original_content);
        warn!(error = %error, "Send rolled back");
        self.emit_failure(conversation_id, error);
    }

    fn emit_failure(&self, conversation_id: ConversationId, error: &DomainError) {
        let _ = self.events.send(SendEvent::Failed {
            conversation_id,
            error_code: error.code(),
        });
    }

    /// An optimistic entry must never remain optimistic indefinitely: if
    /// it is still unreconciled after the watchdog window, force it into
    /// `Failed` and surface that.
    fn spawn_watchdog(&self, conversation_id: ConversationId, local_id: MessageId) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let watchdog = self.watchdog;
        tokio::spawn(async move {
            tokio::time::sleep(watchdog).await;
            if store.mark_failed(conversation_id, local_id) {
                warn!(
                    conversation_id = %conversation_id,
                    message_id = %local_id,
                    "Optimistic message unreconciled past watchdog, marked failed"
                );
                let _ = events.send(SendEvent::Failed {
                    conversation_id,
                    error_code: DomainError::ConfirmationTimeout.code(),
                });
            }
        });
    }

    fn spawn_dispatch(
        &self,
        principal: PrincipalId,
        conversation_id: ConversationId,
        content: String,
    ) {
        let dispatch = Arc::clone(&self.dispatch);
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatch.send(conversation_id, &content, principal).await {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Provider dispatch failed; durable record stands"
                );
                let _ = events.send(SendEvent::DispatchWarning {
                    conversation_id,
                    detail: e.to_string(),
                });
            }
        });
    }

    async fn bump_activity(&self, conversation_id: ConversationId, at: DateTime<Utc>) {
        self.store.bump_last_activity(conversation_id, at);
        let result = self
            .gateway
            .update(
                Collection::Conversations,
                Filter::field("id", json!(conversation_id)),
                json!({ "last_message_at": at }),
            )
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Activity bump not persisted");
        }
    }
}

/// RAII single-flight guard
struct FlightGuard {
    in_flight: Arc<DashMap<ConversationId, ()>>,
    conversation_id: ConversationId,
}

impl FlightGuard {
    fn acquire(
        in_flight: &Arc<DashMap<ConversationId, ()>>,
        conversation_id: ConversationId,
    ) -> Result<Self, DomainError> {
        use dashmap::mapref::entry::Entry;
        match in_flight.entry(conversation_id) {
            Entry::Occupied(_) => Err(DomainError::SendInFlight(conversation_id)),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Self {
                    in_flight: Arc::clone(in_flight),
                    conversation_id,
                })
            }
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.conversation_id);
    }
}
