//! Row records for connections and challenges
//!
//! Both entities serialize flat enough to be their own rows; these
//! wrappers only pin the gateway error mapping in one place.

use serde_json::Value;

use relay_core::{ChannelConnection, DomainError, VerificationChallenge};

/// Connection row codec
pub struct ConnectionRecord;

impl ConnectionRecord {
    /// Parse a gateway row
    pub fn from_row(row: &Value) -> Result<ChannelConnection, DomainError> {
        serde_json::from_value(row.clone())
            .map_err(|e| DomainError::Gateway(format!("malformed connection row: {e}")))
    }

    /// Serialize a connection to a gateway row
    pub fn to_row(connection: &ChannelConnection) -> Value {
        serde_json::to_value(connection).unwrap_or(Value::Null)
    }
}

/// Challenge row codec
pub struct ChallengeRecord;

impl ChallengeRecord {
    /// Parse a gateway row
    pub fn from_row(row: &Value) -> Result<VerificationChallenge, DomainError> {
        serde_json::from_value(row.clone())
            .map_err(|e| DomainError::Gateway(format!("malformed challenge row: {e}")))
    }

    /// Serialize a challenge to a gateway row
    pub fn to_row(challenge: &VerificationChallenge) -> Value {
        serde_json::to_value(challenge).unwrap_or(Value::Null)
    }
}
