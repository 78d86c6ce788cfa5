//! # relay-core
//!
//! Domain layer for the realtime messaging sync core: entities, value
//! objects, domain errors, change events, and the ports through which the
//! application layer talks to the backing store and channel providers.
//! This crate has zero dependencies on infrastructure.

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    ChallengeStatus, ChannelConnection, ConnectionState, Conversation, ConversationStatus,
    DeliveryState, Message, SenderKind, VerificationChallenge,
};
pub use error::DomainError;
pub use events::{ChangeEvent, ChangeFeed, ChangeKind, FeedError};
pub use traits::{
    Collection, Filter, GatewayResult, Order, ProviderDispatch, StoreGateway,
};
pub use value_objects::{
    generate_verification_code, ChallengeId, ChannelKind, ClientRef, ConnectionId, ConversationId,
    MessageId, PrincipalId, ProviderConfig, ProviderVariant,
};
