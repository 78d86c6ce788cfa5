//! Channel taxonomy and provider configuration
//!
//! A `ChannelKind` is the category of communication line; a
//! `ProviderVariant` is one concrete backend implementing that kind.
//! Several variants may exist per kind, and several connection instances
//! may exist per variant (including unintended duplicates).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of communication channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Whatsapp,
    Telegram,
    Webchat,
}

impl ChannelKind {
    /// Whether outbound messages on this kind must be forwarded to an
    /// external provider after durable persistence.
    #[must_use]
    pub const fn requires_dispatch(&self) -> bool {
        match self {
            Self::Whatsapp | Self::Telegram => true,
            // Webchat delivers through the realtime feed itself
            Self::Webchat => false,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Webchat => "webchat",
        };
        f.write_str(s)
    }
}

/// Concrete backend implementation of a channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderVariant {
    /// Hosted cloud API (WhatsApp)
    CloudApi,
    /// Self-hosted bridge session (WhatsApp); requires device linking,
    /// proven through the verification-challenge flow
    BridgeSession,
    /// Bot API (Telegram)
    BotApi,
    /// Embedded site widget (Webchat)
    Widget,
}

impl fmt::Display for ProviderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CloudApi => "cloud_api",
            Self::BridgeSession => "bridge_session",
            Self::BotApi => "bot_api",
            Self::Widget => "widget",
        };
        f.write_str(s)
    }
}

/// Provider-shaped connection configuration
///
/// Tagged union keyed by (kind, variant). A stored "connected" flag alone is
/// never enough to consider an instance live: the per-variant required
/// fields must all be present as well (`is_complete`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderConfig {
    WhatsappCloud {
        access_token: Option<String>,
        phone_number_id: Option<String>,
        webhook_verified: bool,
    },
    WhatsappBridge {
        session_key: Option<String>,
        device_id: Option<String>,
        linked: bool,
    },
    TelegramBot {
        bot_token: Option<String>,
    },
    WebchatWidget {
        widget_key: Option<String>,
    },
}

impl ProviderConfig {
    /// The channel kind this configuration shape belongs to
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        match self {
            Self::WhatsappCloud { .. } | Self::WhatsappBridge { .. } => ChannelKind::Whatsapp,
            Self::TelegramBot { .. } => ChannelKind::Telegram,
            Self::WebchatWidget { .. } => ChannelKind::Webchat,
        }
    }

    /// The provider variant this configuration shape belongs to
    #[must_use]
    pub const fn variant(&self) -> ProviderVariant {
        match self {
            Self::WhatsappCloud { .. } => ProviderVariant::CloudApi,
            Self::WhatsappBridge { .. } => ProviderVariant::BridgeSession,
            Self::TelegramBot { .. } => ProviderVariant::BotApi,
            Self::WebchatWidget { .. } => ProviderVariant::Widget,
        }
    }

    /// Whether the variant supports remote session teardown on disconnect
    #[must_use]
    pub const fn supports_teardown(&self) -> bool {
        matches!(self, Self::WhatsappBridge { .. })
    }

    /// Per-variant completeness predicate: all externally issued
    /// credentials and linkage confirmations required by this variant are
    /// present. Pure function over the config; never consults the flag.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        fn present(field: &Option<String>) -> bool {
            field.as_deref().is_some_and(|s| !s.trim().is_empty())
        }

        match self {
            Self::WhatsappCloud {
                access_token,
                phone_number_id,
                webhook_verified,
            } => present(access_token) && present(phone_number_id) && *webhook_verified,
            Self::WhatsappBridge {
                session_key,
                device_id,
                linked,
            } => present(session_key) && present(device_id) && *linked,
            Self::TelegramBot { bot_token } => present(bot_token),
            Self::WebchatWidget { widget_key } => present(widget_key),
        }
    }

    /// Empty (freshly provisioned) configuration for a variant
    #[must_use]
    pub const fn empty(variant: ProviderVariant) -> Self {
        match variant {
            ProviderVariant::CloudApi => Self::WhatsappCloud {
                access_token: None,
                phone_number_id: None,
                webhook_verified: false,
            },
            ProviderVariant::BridgeSession => Self::WhatsappBridge {
                session_key: None,
                device_id: None,
                linked: false,
            },
            ProviderVariant::BotApi => Self::TelegramBot { bot_token: None },
            ProviderVariant::Widget => Self::WebchatWidget { widget_key: None },
        }
    }
}

/// Generate a short random verification code (uppercase alphanumeric)
#[must_use]
pub fn generate_verification_code(len: usize) -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_requirement() {
        assert!(ChannelKind::Whatsapp.requires_dispatch());
        assert!(ChannelKind::Telegram.requires_dispatch());
        assert!(!ChannelKind::Webchat.requires_dispatch());
    }

    #[test]
    fn test_empty_config_is_incomplete() {
        for variant in [
            ProviderVariant::CloudApi,
            ProviderVariant::BridgeSession,
            ProviderVariant::BotApi,
            ProviderVariant::Widget,
        ] {
            let config = ProviderConfig::empty(variant);
            assert_eq!(config.variant(), variant);
            assert!(!config.is_complete());
        }
    }

    #[test]
    fn test_cloud_config_requires_all_fields() {
        let config = ProviderConfig::WhatsappCloud {
            access_token: Some("tok".into()),
            phone_number_id: Some("123".into()),
            webhook_verified: false,
        };
        assert!(!config.is_complete());

        let config = ProviderConfig::WhatsappCloud {
            access_token: Some("tok".into()),
            phone_number_id: Some("123".into()),
            webhook_verified: true,
        };
        assert!(config.is_complete());
    }

    #[test]
    fn test_blank_credential_does_not_count() {
        let config = ProviderConfig::TelegramBot {
            bot_token: Some("   ".into()),
        };
        assert!(!config.is_complete());
    }

    #[test]
    fn test_bridge_supports_teardown() {
        assert!(ProviderConfig::empty(ProviderVariant::BridgeSession).supports_teardown());
        assert!(!ProviderConfig::empty(ProviderVariant::CloudApi).supports_teardown());
    }

    #[test]
    fn test_generate_verification_code() {
        let code = generate_verification_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        // Ambiguous glyphs are excluded from the charset
        assert!(!code.contains('O') && !code.contains('0') && !code.contains('I'));
    }
}
