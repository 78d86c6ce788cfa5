//! Channel connection entity - one provisioned provider instance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ChannelKind, ConnectionId, PrincipalId, ProviderConfig, ProviderVariant};

/// Stored lifecycle state of a connection instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Channel connection entity
///
/// Multiple instances of the same kind may coexist, including duplicates
/// left behind by repeated provisioning; the registry labels those rather
/// than assuming uniqueness per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConnection {
    pub id: ConnectionId,
    pub channel: ChannelKind,
    pub variant: ProviderVariant,
    pub config: ProviderConfig,
    pub state: ConnectionState,
    pub owner: PrincipalId,
    pub created_at: DateTime<Utc>,
}

impl ChannelConnection {
    /// Provision a new connection instance in the `Connecting` state
    pub fn provision(variant: ProviderVariant, owner: PrincipalId) -> Self {
        let config = ProviderConfig::empty(variant);
        Self {
            id: ConnectionId::generate(),
            channel: config.kind(),
            variant,
            config,
            state: ConnectionState::Connecting,
            owner,
            created_at: Utc::now(),
        }
    }

    /// Composite connected predicate: the stored state flag AND the
    /// per-variant required configuration must hold simultaneously. The
    /// flag alone is insufficient.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.config.is_complete()
    }

    /// The effective state as reported outward: a `Connected` flag over an
    /// incomplete config degrades to `Error`.
    #[must_use]
    pub fn effective_state(&self) -> ConnectionState {
        if self.state == ConnectionState::Connected && !self.config.is_complete() {
            ConnectionState::Error
        } else {
            self.state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_starts_connecting() {
        let conn = ChannelConnection::provision(ProviderVariant::BotApi, PrincipalId::generate());
        assert_eq!(conn.state, ConnectionState::Connecting);
        assert_eq!(conn.channel, ChannelKind::Telegram);
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_flag_alone_is_not_connected() {
        let mut conn =
            ChannelConnection::provision(ProviderVariant::BotApi, PrincipalId::generate());
        conn.state = ConnectionState::Connected;
        // No bot token yet: the composite predicate must fail
        assert!(!conn.is_connected());
        assert_eq!(conn.effective_state(), ConnectionState::Error);

        conn.config = ProviderConfig::TelegramBot {
            bot_token: Some("123:abc".into()),
        };
        assert!(conn.is_connected());
        assert_eq!(conn.effective_state(), ConnectionState::Connected);
    }
}
