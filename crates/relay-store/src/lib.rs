//! # relay-store
//!
//! Infrastructure layer: the `LocalConversationStore` (single owner of the
//! UI-visible conversation/message state, shared merge rules for all
//! writers) and `MemoryGateway`, an in-memory implementation of the
//! backing store port with a broadcast change feed.

pub mod gateway;
pub mod local;
pub mod records;

pub use gateway::MemoryGateway;
pub use local::{ConversationView, LocalConversationStore, StoreUpdate};
pub use records::{ConversationRecord, MessageDraft, MessageRecord};
