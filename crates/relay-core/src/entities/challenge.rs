//! Verification challenge entity - time-boxed ownership proof for a channel

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{generate_verification_code, ChallengeId, ConnectionId};

/// Challenge status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Completed,
    Expired,
}

/// Verification challenge entity
///
/// Invariant: at most one non-expired `Pending` challenge per connection;
/// issuing a new one supersedes any prior pending challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationChallenge {
    pub id: ChallengeId,
    pub connection_id: ConnectionId,
    pub code: String,
    pub status: ChallengeStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationChallenge {
    /// Issue a fresh pending challenge with a random code and the given
    /// validity window.
    pub fn issue(connection_id: ConnectionId, code_len: usize, validity: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: ChallengeId::generate(),
            connection_id,
            code: generate_verification_code(code_len),
            status: ChallengeStatus::Pending,
            expires_at: now + validity,
            created_at: now,
        }
    }

    /// Check if the challenge is still awaiting completion
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == ChallengeStatus::Pending
    }

    /// Check if the validity window has passed at `now`
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_pending_challenge() {
        let challenge =
            VerificationChallenge::issue(ConnectionId::generate(), 6, Duration::minutes(30));
        assert!(challenge.is_pending());
        assert_eq!(challenge.code.len(), 6);
        assert_eq!(
            challenge.expires_at - challenge.created_at,
            Duration::minutes(30)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let challenge =
            VerificationChallenge::issue(ConnectionId::generate(), 6, Duration::minutes(30));
        assert!(!challenge.is_expired_at(challenge.created_at));
        assert!(challenge.is_expired_at(challenge.expires_at));
        assert!(challenge.is_expired_at(challenge.expires_at + Duration::seconds(1)));
    }
}
