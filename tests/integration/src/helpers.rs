//! Test helpers for integration tests
//!
//! Provides an in-process harness wiring every layer together, a
//! recording provider dispatcher, and condition polling utilities.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use relay_channels::{ConnectionRegistry, VerificationManager};
use relay_common::{try_init_tracing, SyncConfig, TracingConfig, VerificationConfig};
use relay_core::{
    ChannelConnection, ChannelKind, Collection, ConversationId, DomainError, PrincipalId,
    ProviderDispatch, StoreGateway,
};
use relay_store::{ConversationRecord, LocalConversationStore, MemoryGateway};
use relay_sync::ChatSession;

use crate::fixtures::conversation_for;

/// Provider dispatcher that records calls and can be told to fail
#[derive(Default)]
pub struct RecordingDispatch {
    pub sent: AtomicUsize,
    pub teardowns: AtomicUsize,
    pub fail_send: AtomicBool,
}

#[async_trait]
impl ProviderDispatch for RecordingDispatch {
    async fn send(
        &self,
        _conversation_id: ConversationId,
        _content: &str,
        _principal: PrincipalId,
    ) -> Result<(), DomainError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(DomainError::Dispatch("provider unavailable".into()));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn teardown(&self, _connection: &ChannelConnection) -> Result<(), DomainError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Full in-process stack under test
pub struct TestHarness {
    pub gateway: Arc<MemoryGateway>,
    pub store: Arc<LocalConversationStore>,
    pub dispatch: Arc<RecordingDispatch>,
    pub session: ChatSession,
    pub registry: ConnectionRegistry,
    pub verification: VerificationManager,
    pub principal: PrincipalId,
}

impl TestHarness {
    /// Wire a harness with test-sized timers
    pub fn new() -> Self {
        Self::with_config(test_sync_config(), test_verification_config())
    }

    /// Wire a harness with custom tunables
    pub fn with_config(sync: SyncConfig, verification: VerificationConfig) -> Self {
        // First harness in the process installs the subscriber; RUST_LOG
        // controls test verbosity
        let _ = try_init_tracing(TracingConfig::default());

        let gateway = Arc::new(MemoryGateway::new());
        let store = Arc::new(LocalConversationStore::new());
        let dispatch = Arc::new(RecordingDispatch::default());

        let session = ChatSession::new(
            gateway.clone(),
            store.clone(),
            dispatch.clone(),
            &sync,
            "Agent",
        );
        let registry = ConnectionRegistry::new(gateway.clone(), dispatch.clone());
        let manager = VerificationManager::new(gateway.clone(), verification);

        Self {
            gateway,
            store,
            dispatch,
            session,
            registry,
            verification: manager,
            principal: PrincipalId::generate(),
        }
    }

    /// Seed a durable conversation owned by the harness principal
    pub async fn seed_conversation(&self, channel: ChannelKind) -> Result<ConversationId> {
        let conversation = conversation_for(self.principal, channel);
        let id = conversation.id;
        self.gateway
            .insert(
                Collection::Conversations,
                ConversationRecord::to_row(&conversation),
            )
            .await?;
        Ok(id)
    }

    /// Sign in and select a conversation, waiting until the subscription
    /// has completed its cold resync
    pub async fn open_conversation(&self, conversation_id: ConversationId) -> Result<()> {
        self.session.sign_in(self.principal);
        self.session.select_conversation(conversation_id)?;
        wait_for(|| {
            self.session.connection_status() == relay_sync::ConnectionStatus::Connected
        })
        .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Sync tunables shrunk for fast tests
pub fn test_sync_config() -> SyncConfig {
    SyncConfig {
        dedup_window_ms: 2000,
        dedup_capacity: 64,
        debounce_ms: 20,
        watchdog_ms: 15_000,
        backoff_base_ms: 10,
        backoff_ceiling_ms: 100,
    }
}

/// Verification tunables shrunk for fast tests
pub fn test_verification_config() -> VerificationConfig {
    VerificationConfig {
        code_len: 6,
        validity_mins: 30,
        poll_interval_ms: 10,
        sweep_interval_ms: 20,
        poll_grace_ms: 60_000,
    }
}

/// Poll `condition` until it holds, failing after two seconds
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> Result<()> {
    for _ in 0..200 {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("condition not reached within timeout")
}
