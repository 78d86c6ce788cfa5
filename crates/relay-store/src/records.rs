//! Row records - the durable JSON shapes exchanged with the gateway
//!
//! The gateway speaks flat rows with plain UUID ids; the domain speaks
//! entities whose message ids carry local/durable provenance. Records sit
//! in between, mirroring the model/mapper split of the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use relay_core::{
    ChannelKind, ClientRef, Conversation, ConversationId, ConversationStatus, DeliveryState,
    DomainError, Message, MessageId, PrincipalId, SenderKind,
};

/// Durable message row as stored by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: ConversationId,
    pub content: String,
    pub sender: SenderKind,
    pub sender_name: String,
    pub is_automated: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Parse a gateway row
    pub fn from_row(row: &Value) -> Result<Self, DomainError> {
        serde_json::from_value(row.clone())
            .map_err(|e| DomainError::Gateway(format!("malformed message row: {e}")))
    }

    /// Convert into the confirmed domain message
    #[must_use]
    pub fn into_message(self) -> Message {
        Message {
            id: MessageId::durable(self.id),
            conversation_id: self.conversation_id,
            content: self.content,
            sender: self.sender,
            sender_name: self.sender_name,
            is_automated: self.is_automated,
            created_at: self.created_at,
            delivery: DeliveryState::Confirmed,
        }
    }
}

/// Insert payload for a new durable message
///
/// Carries no id and no timestamp: the store issues both, and the caller
/// reads them back from the returned row for reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDraft {
    pub conversation_id: ConversationId,
    pub content: String,
    pub sender: SenderKind,
    pub sender_name: String,
    pub is_automated: bool,
}

impl MessageDraft {
    /// Build the draft row for an optimistic message
    pub fn from_message(message: &Message) -> Self {
        Self {
            conversation_id: message.conversation_id,
            content: message.content.clone(),
            sender: message.sender,
            sender_name: message.sender_name.clone(),
            is_automated: message.is_automated,
        }
    }

    /// Serialize to a gateway row
    pub fn to_row(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Conversation row as stored by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub channel: ChannelKind,
    pub client_ref: ClientRef,
    pub last_message_at: DateTime<Utc>,
    pub status: ConversationStatus,
    pub ai_enabled: Option<bool>,
    pub owner: PrincipalId,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Parse a gateway row
    pub fn from_row(row: &Value) -> Result<Self, DomainError> {
        serde_json::from_value(row.clone())
            .map_err(|e| DomainError::Gateway(format!("malformed conversation row: {e}")))
    }

    /// Convert into the domain entity
    #[must_use]
    pub fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            channel: self.channel,
            client_ref: self.client_ref,
            last_message_at: self.last_message_at,
            status: self.status,
            ai_enabled: self.ai_enabled,
            owner: self.owner,
            created_at: self.created_at,
        }
    }

    /// Serialize a domain entity to a gateway row
    pub fn to_row(conversation: &Conversation) -> Value {
        serde_json::to_value(conversation).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_record_roundtrip() {
        let record = MessageRecord {
            id: Uuid::new_v4(),
            conversation_id: ConversationId::generate(),
            content: "Hola".into(),
            sender: SenderKind::Human,
            sender_name: "Agent".into(),
            is_automated: false,
            created_at: Utc::now(),
        };
        let row = serde_json::to_value(&record).unwrap();
        let message = MessageRecord::from_row(&row).unwrap().into_message();

        assert!(!message.id.is_local());
        assert_eq!(message.id.as_uuid(), record.id);
        assert_eq!(message.delivery, DeliveryState::Confirmed);
    }

    #[test]
    fn test_draft_has_no_id() {
        let message = Message::optimistic(
            ConversationId::generate(),
            "Hola".into(),
            SenderKind::Human,
            "Agent".into(),
        );
        let row = MessageDraft::from_message(&message).to_row();
        assert!(row.get("id").is_none());
        assert!(row.get("created_at").is_none());
        assert_eq!(row["content"], json!("Hola"));
    }

    #[test]
    fn test_malformed_row_is_gateway_error() {
        let err = MessageRecord::from_row(&json!({"id": 42})).unwrap_err();
        assert_eq!(err.code(), "GATEWAY_ERROR");
    }
}
