//! Conversation entity - one thread of messages with an end client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ChannelKind, ClientRef, ConversationId, PrincipalId};

/// Conversation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
}

/// Conversation entity
///
/// Owned by the principal that created it. The sync engine bumps
/// `last_message_at`; the send coordinator mutates it indirectly through
/// the message pipeline. Never deleted by this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub channel: ChannelKind,
    pub client_ref: ClientRef,
    pub last_message_at: DateTime<Utc>,
    pub status: ConversationStatus,
    pub ai_enabled: Option<bool>,
    pub owner: PrincipalId,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new open Conversation
    pub fn new(
        id: ConversationId,
        channel: ChannelKind,
        client_ref: ClientRef,
        owner: PrincipalId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            channel,
            client_ref,
            last_message_at: now,
            status: ConversationStatus::Open,
            ai_enabled: None,
            owner,
            created_at: now,
        }
    }

    /// Check if the conversation is open for new messages
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == ConversationStatus::Open
    }

    /// Check if the conversation belongs to the given principal
    #[inline]
    pub fn is_owned_by(&self, principal: PrincipalId) -> bool {
        self.owner == principal
    }

    /// Bump the last-activity timestamp, keeping it monotone
    pub fn bump_activity(&mut self, at: DateTime<Utc>) {
        if at > self.last_message_at {
            self.last_message_at = at;
        }
    }
}
