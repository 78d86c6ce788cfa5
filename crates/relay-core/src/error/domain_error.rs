//! Domain errors - failure taxonomy for the sync core
//!
//! Nothing here is fatal to the process: every variant is local to one
//! operation and recoverable by retry or user action.

use thiserror::Error;

use crate::value_objects::{ChallengeId, ConnectionId, ConversationId};

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Validation (blocked before any network call; silent no-op to the UI)
    // =========================================================================
    #[error("Message content is empty")]
    EmptyContent,

    #[error("No conversation selected")]
    NoConversationSelected,

    #[error("Caller is not authenticated")]
    NotAuthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    // =========================================================================
    // Concurrency guards
    // =========================================================================
    #[error("A send is already in flight for conversation {0}")]
    SendInFlight(ConversationId),

    // =========================================================================
    // Authorization (aborts before any optimistic mutation)
    // =========================================================================
    #[error("Conversation {0} does not belong to the caller")]
    NotConversationOwner(ConversationId),

    #[error("Connection {0} does not belong to the caller")]
    NotConnectionOwner(ConnectionId),

    // =========================================================================
    // Not Found
    // =========================================================================
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    #[error("Verification challenge not found: {0}")]
    ChallengeNotFound(ChallengeId),

    // =========================================================================
    // Persistence (triggers optimistic rollback)
    // =========================================================================
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Optimistic message timed out awaiting confirmation")]
    ConfirmationTimeout,

    // =========================================================================
    // Dispatch (after durability; never rolls back local state)
    // =========================================================================
    #[error("Provider dispatch failed: {0}")]
    Dispatch(String),

    // =========================================================================
    // Transport (realtime feed; handled by backoff-and-reconnect)
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(String),

    // =========================================================================
    // Verification
    // =========================================================================
    #[error("Verification challenge has expired")]
    ChallengeExpired,

    // =========================================================================
    // Destructive operations
    // =========================================================================
    #[error("Hard delete requires explicit confirmation")]
    HardDeleteNotConfirmed,

    // =========================================================================
    // Infrastructure (wrapped)
    // =========================================================================
    #[error("Gateway error: {0}")]
    Gateway(String),
}

impl DomainError {
    /// Get a stable error code string for surfacing to views
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::NoConversationSelected => "NO_CONVERSATION_SELECTED",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::SendInFlight(_) => "SEND_IN_FLIGHT",
            Self::NotConversationOwner(_) => "NOT_CONVERSATION_OWNER",
            Self::NotConnectionOwner(_) => "NOT_CONNECTION_OWNER",
            Self::ConversationNotFound(_) => "UNKNOWN_CONVERSATION",
            Self::ConnectionNotFound(_) => "UNKNOWN_CONNECTION",
            Self::ChallengeNotFound(_) => "UNKNOWN_CHALLENGE",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::ConfirmationTimeout => "CONFIRMATION_TIMEOUT",
            Self::Dispatch(_) => "DISPATCH_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::ChallengeExpired => "CHALLENGE_EXPIRED",
            Self::HardDeleteNotConfirmed => "HARD_DELETE_NOT_CONFIRMED",
            Self::Gateway(_) => "GATEWAY_ERROR",
        }
    }

    /// Check if this is a validation error (no-op to the user, never a toast)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyContent
                | Self::NoConversationSelected
                | Self::NotAuthenticated
                | Self::Validation(_)
        )
    }

    /// Check if this is an authorization error
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::NotConversationOwner(_) | Self::NotConnectionOwner(_)
        )
    }

    /// Check if this failure leaves durable state intact (warning only)
    pub fn is_non_blocking(&self) -> bool {
        matches!(self, Self::Dispatch(_) | Self::Transport(_))
    }

    /// Check if this failure requires rolling back an optimistic entry
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::ConfirmationTimeout | Self::Gateway(_)
        )
    }
}
