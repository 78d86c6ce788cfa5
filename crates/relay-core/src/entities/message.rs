//! Message entity - one entry in a conversation's message list

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{ConversationId, MessageId};

/// Who produced the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Client,
    Human,
    Ai,
}

/// Delivery state of a locally visible message
///
/// `Optimistic` entries are shown before durable confirmation and must
/// always resolve to `Confirmed` or `Failed` within the watchdog window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Optimistic,
    Confirmed,
    Failed,
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub content: String,
    pub sender: SenderKind,
    pub sender_name: String,
    pub is_automated: bool,
    pub created_at: DateTime<Utc>,
    pub delivery: DeliveryState,
}

impl Message {
    /// Create an optimistic outbound message with a client-local id
    pub fn optimistic(
        conversation_id: ConversationId,
        content: String,
        sender: SenderKind,
        sender_name: String,
    ) -> Self {
        Self {
            id: MessageId::generate_local(),
            conversation_id,
            content,
            sender,
            sender_name,
            is_automated: false,
            created_at: Utc::now(),
            delivery: DeliveryState::Optimistic,
        }
    }

    /// Create a confirmed message as received from the backing store
    pub fn confirmed(
        id: Uuid,
        conversation_id: ConversationId,
        content: String,
        sender: SenderKind,
        sender_name: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::durable(id),
            conversation_id,
            content,
            sender,
            sender_name,
            is_automated: false,
            created_at,
            delivery: DeliveryState::Confirmed,
        }
    }

    /// Check if the message is still awaiting durable confirmation
    #[inline]
    pub fn is_optimistic(&self) -> bool {
        self.delivery == DeliveryState::Optimistic
    }

    /// Check if message content is effectively empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Produce the confirmed counterpart of this message, carrying the
    /// durable id and server timestamp issued at persistence time.
    #[must_use]
    pub fn into_confirmed(mut self, durable_id: Uuid, server_time: DateTime<Utc>) -> Self {
        self.id = MessageId::durable(durable_id);
        self.created_at = server_time;
        self.delivery = DeliveryState::Confirmed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_message() {
        let msg = Message::optimistic(
            ConversationId::generate(),
            "Hola".to_string(),
            SenderKind::Human,
            "Agent".to_string(),
        );
        assert!(msg.is_optimistic());
        assert!(msg.id.is_local());
        assert!(!msg.is_automated);
    }

    #[test]
    fn test_into_confirmed_swaps_id_in_place() {
        let msg = Message::optimistic(
            ConversationId::generate(),
            "Hola".to_string(),
            SenderKind::Human,
            "Agent".to_string(),
        );
        let durable = Uuid::new_v4();
        let server_time = Utc::now();
        let confirmed = msg.clone().into_confirmed(durable, server_time);

        assert!(!confirmed.is_optimistic());
        assert!(!confirmed.id.is_local());
        assert_eq!(confirmed.id.as_uuid(), durable);
        assert_eq!(confirmed.created_at, server_time);
        assert_eq!(confirmed.content, msg.content);
    }

    #[test]
    fn test_empty_detection() {
        let msg = Message::optimistic(
            ConversationId::generate(),
            "   ".to_string(),
            SenderKind::Human,
            "Agent".to_string(),
        );
        assert!(msg.is_empty());
    }
}
