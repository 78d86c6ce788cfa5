//! Domain entities

mod challenge;
mod connection;
mod conversation;
mod message;

pub use challenge::{ChallengeStatus, VerificationChallenge};
pub use connection::{ChannelConnection, ConnectionState};
pub use conversation::{Conversation, ConversationStatus};
pub use message::{DeliveryState, Message, SenderKind};
