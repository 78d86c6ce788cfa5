//! Test fixtures and data generators

use std::sync::atomic::{AtomicU64, Ordering};

use relay_core::{ChannelKind, ClientRef, Conversation, ConversationId, PrincipalId};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Build an open conversation owned by `principal` with a unique client ref
pub fn conversation_for(principal: PrincipalId, channel: ChannelKind) -> Conversation {
    let suffix = unique_suffix();
    Conversation::new(
        ConversationId::generate(),
        channel,
        ClientRef::new(format!("client-{suffix}")),
        principal,
    )
}

/// Unique message content
pub fn unique_content(prefix: &str) -> String {
    format!("{prefix} {}", unique_suffix())
}
