//! Provider dispatch port
//!
//! Generic contract for forwarding outbound messages to the external
//! provider behind a channel, and for tearing down provider-side sessions.
//! Dispatch is fire-and-forget relative to message durability: the local
//! durable record is authoritative, provider delivery is best effort.

use async_trait::async_trait;

use crate::entities::ChannelConnection;
use crate::error::DomainError;
use crate::value_objects::{ConversationId, PrincipalId};

/// Outbound provider operations
#[async_trait]
pub trait ProviderDispatch: Send + Sync {
    /// Forward a durably persisted message to the channel's provider.
    async fn send(
        &self,
        conversation_id: ConversationId,
        content: &str,
        principal: PrincipalId,
    ) -> Result<(), DomainError>;

    /// Attempt to tear down the provider-side session for a connection.
    /// Used by soft disconnect; errors are non-fatal to the caller.
    async fn teardown(&self, connection: &ChannelConnection) -> Result<(), DomainError>;
}
