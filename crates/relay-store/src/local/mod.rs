//! Local conversation state

mod conversation_store;

pub use conversation_store::{ConversationView, LocalConversationStore, StoreUpdate};
