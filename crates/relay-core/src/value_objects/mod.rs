//! Value objects - identifiers, channel taxonomy, and provider configuration

mod channel;
mod ids;

pub use channel::{
    generate_verification_code, ChannelKind, ProviderConfig, ProviderVariant,
};
pub use ids::{
    ChallengeId, ClientRef, ConnectionId, ConversationId, MessageId, PrincipalId,
};
