//! Chat session facade
//!
//! Top-level entry point views talk to: holds the signed-in principal,
//! the active conversation, the compose buffer, and the lifecycle of the
//! realtime subscription. Selecting a conversation supersedes the prior
//! subscription before the new one starts, so two workers never write to
//! the store for the same session.

mod compose;

pub use compose::ComposeBuffer;

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use relay_common::SyncConfig;
use relay_core::{
    ConversationId, DomainError, PrincipalId, ProviderDispatch, StoreGateway,
};
use relay_store::LocalConversationStore;

use crate::engine::{ConnectionStatus, SubscriptionHandle, SyncEngine};
use crate::gate::{GatedSend, SendGate};
use crate::send::SendCoordinator;

/// Chat session facade over the gate, coordinator, and sync engine
pub struct ChatSession {
    principal: Mutex<Option<PrincipalId>>,
    active: Mutex<Option<ConversationId>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
    compose: Arc<ComposeBuffer>,
    store: Arc<LocalConversationStore>,
    gate: SendGate,
    coordinator: Arc<SendCoordinator>,
    engine: SyncEngine,
    sender_name: String,
}

impl ChatSession {
    /// Wire up a session over the given gateway, store, and dispatcher
    pub fn new(
        gateway: Arc<dyn StoreGateway>,
        store: Arc<LocalConversationStore>,
        dispatch: Arc<dyn ProviderDispatch>,
        config: &SyncConfig,
        sender_name: impl Into<String>,
    ) -> Self {
        let compose = Arc::new(ComposeBuffer::new());
        let coordinator = Arc::new(SendCoordinator::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            dispatch,
            Arc::clone(&compose),
            config.watchdog(),
        ));
        let engine = SyncEngine::new(
            gateway,
            Arc::clone(&store),
            config.backoff_base(),
            config.backoff_ceiling(),
        );
        Self {
            principal: Mutex::new(None),
            active: Mutex::new(None),
            subscription: Mutex::new(None),
            compose,
            store,
            gate: SendGate::new(config.dedup_window(), config.dedup_capacity, config.debounce()),
            coordinator,
            engine,
            sender_name: sender_name.into(),
        }
    }

    /// Shared compose buffer (views bind their input field to this)
    #[must_use]
    pub fn compose(&self) -> Arc<ComposeBuffer> {
        Arc::clone(&self.compose)
    }

    /// The coordinator, for subscribing to send notifications
    #[must_use]
    pub fn coordinator(&self) -> Arc<SendCoordinator> {
        Arc::clone(&self.coordinator)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Sign in and start an unscoped subscription covering the principal's
    /// conversation list
    pub fn sign_in(&self, principal: PrincipalId) {
        info!(principal = %principal, "Session signed in");
        *self.principal.lock() = Some(principal);
        self.resubscribe(principal, None);
    }

    /// Select the active conversation, narrowing the subscription to it.
    /// The previous subscription is cancelled before the new one starts.
    pub fn select_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), DomainError> {
        let principal = self.require_principal()?;
        debug!(conversation_id = %conversation_id, "Conversation selected");
        *self.active.lock() = Some(conversation_id);
        self.compose.clear();
        self.resubscribe(principal, Some(conversation_id));
        Ok(())
    }

    /// Cancel the realtime subscription and any pending send timer,
    /// leaving the signed-in state and cached data in place
    pub fn cancel_all_subscriptions(&self) {
        self.cancel_subscription();
        self.gate.stop();
    }

    /// Sign out: cancel the subscription, drop pending timers, and clear
    /// all locally cached state
    pub fn sign_out(&self) {
        info!("Session signed out");
        self.cancel_all_subscriptions();
        self.compose.clear();
        *self.active.lock() = None;
        *self.principal.lock() = None;
        self.store.clear();
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Offer a message for the active conversation to the send gate.
    ///
    /// Returns `Ok(true)` if the content entered the debounce cycle,
    /// `Ok(false)` if it was dropped as a recent duplicate. Outcomes of
    /// the eventual send surface through the coordinator's event channel.
    pub fn send_message(&self, content: &str) -> Result<bool, DomainError> {
        let principal = self.require_principal()?;
        let conversation_id = self
            .active
            .lock()
            .ok_or(DomainError::NoConversationSelected)?;

        self.compose.set(content);

        let coordinator = Arc::clone(&self.coordinator);
        let sender_name = self.sender_name.clone();
        let payload = GatedSend {
            conversation_id,
            content: content.to_string(),
        };
        let accepted = self.gate.trigger(payload, move |send| async move {
            // Failures are emitted on the coordinator's event channel;
            // nothing is awaiting a debounced fire
            let _ = coordinator
                .send(principal, send.conversation_id, &send.content, &sender_name)
                .await;
        });
        Ok(accepted)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Connection status of the current subscription
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.subscription
            .lock()
            .as_ref()
            .map_or(ConnectionStatus::Disconnected, SubscriptionHandle::status)
    }

    /// Currently active conversation, if any
    #[must_use]
    pub fn active_conversation(&self) -> Option<ConversationId> {
        *self.active.lock()
    }

    /// Signed-in principal, if any
    #[must_use]
    pub fn current_principal(&self) -> Option<PrincipalId> {
        *self.principal.lock()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_principal(&self) -> Result<PrincipalId, DomainError> {
        self.principal.lock().ok_or(DomainError::NotAuthenticated)
    }

    fn resubscribe(&self, principal: PrincipalId, conversation: Option<ConversationId>) {
        let mut slot = self.subscription.lock();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        *slot = Some(self.engine.subscribe(principal, conversation));
    }

    fn cancel_subscription(&self) {
        if let Some(handle) = self.subscription.lock().take() {
            handle.cancel();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel_subscription();
        self.gate.stop();
    }
}
