//! Local conversation store
//!
//! In-memory, reactive view of conversations and their messages; the
//! single owner of UI-visible state. Three writers share it (send
//! coordinator, sync engine, manual refresh), so every mutation goes
//! through the merge rules here: last-write-wins keyed by entity id,
//! message lists kept non-decreasing in `created_at`, and no writer may
//! regress a `Confirmed` message back to `Optimistic`.

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use relay_core::{
    Conversation, ConversationId, DeliveryState, Message, MessageId,
};

/// One conversation plus its ordered message list
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Store mutation notifications for view-layer reactivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreUpdate {
    ConversationChanged(ConversationId),
    MessagesChanged(ConversationId),
}

/// In-memory reactive map of conversations and messages
pub struct LocalConversationStore {
    conversations: DashMap<ConversationId, ConversationView>,
    updates: broadcast::Sender<StoreUpdate>,
}

impl LocalConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            conversations: DashMap::new(),
            updates,
        }
    }

    /// Get a receiver for store update notifications
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<StoreUpdate> {
        self.updates.subscribe()
    }

    fn notify(&self, update: StoreUpdate) {
        // No receivers is fine; views subscribe lazily
        let _ = self.updates.send(update);
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Merge a conversation record (last-write-wins by id, messages kept)
    pub fn upsert_conversation(&self, conversation: Conversation) {
        let id = conversation.id;
        self.conversations
            .entry(id)
            .and_modify(|view| view.conversation = conversation.clone())
            .or_insert_with(|| ConversationView {
                conversation,
                messages: Vec::new(),
            });
        self.notify(StoreUpdate::ConversationChanged(id));
    }

    /// Get a conversation snapshot
    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.conversations.get(&id).map(|v| v.conversation.clone())
    }

    /// Bump a conversation's last-activity timestamp (monotone)
    pub fn bump_last_activity(&self, id: ConversationId, at: chrono::DateTime<chrono::Utc>) {
        if let Some(mut view) = self.conversations.get_mut(&id) {
            view.conversation.bump_activity(at);
            drop(view);
            self.notify(StoreUpdate::ConversationChanged(id));
        }
    }

    /// Number of conversations currently held
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Insert an optimistic message at its timestamp position.
    pub fn insert_optimistic(&self, message: Message) {
        let conversation_id = message.conversation_id;
        let mut view = match self.conversations.get_mut(&conversation_id) {
            Some(view) => view,
            None => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "Optimistic insert into unknown conversation dropped"
                );
                return;
            }
        };

        Self::insert_ordered(&mut view.messages, message);
        drop(view);
        self.notify(StoreUpdate::MessagesChanged(conversation_id));
    }

    /// Merge a remotely observed message (insert or update event).
    ///
    /// Idempotent: an id already present merges in place instead of
    /// appending a duplicate. An update for an unseen id is treated as an
    /// insert. A `Confirmed` entry never regresses to `Optimistic`.
    pub fn merge_remote_message(&self, message: Message) {
        let conversation_id = message.conversation_id;
        let mut view = match self.conversations.get_mut(&conversation_id) {
            Some(view) => view,
            None => {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    "Remote message for unknown conversation dropped"
                );
                return;
            }
        };

        if let Some(slot) = view.messages.iter_mut().find(|m| m.id == message.id) {
            let keep_confirmed = slot.delivery == DeliveryState::Confirmed
                && message.delivery == DeliveryState::Optimistic;
            let delivery = if keep_confirmed {
                DeliveryState::Confirmed
            } else {
                message.delivery
            };
            *slot = Message { delivery, ..message };
            let messages = std::mem::take(&mut view.messages);
            view.messages = Self::reorder(messages);
        } else {
            Self::insert_ordered(&mut view.messages, message);
        }

        drop(view);
        self.notify(StoreUpdate::MessagesChanged(conversation_id));
    }

    /// Replace an optimistic entry with its confirmed counterpart, in the
    /// same slot. Returns `false` if the local id is no longer present.
    ///
    /// If the durable id was already merged through the change feed, the
    /// optimistic entry is removed instead of replaced, so exactly one
    /// entry exists either way.
    pub fn reconcile(
        &self,
        conversation_id: ConversationId,
        local_id: MessageId,
        confirmed: Message,
    ) -> bool {
        let mut view = match self.conversations.get_mut(&conversation_id) {
            Some(view) => view,
            None => return false,
        };

        let Some(index) = view.messages.iter().position(|m| m.id == local_id) else {
            return false;
        };
        if view.messages.iter().any(|m| m.id == confirmed.id) {
            view.messages.remove(index);
        } else {
            view.messages[index] = confirmed;
            let messages = std::mem::take(&mut view.messages);
            view.messages = Self::reorder(messages);
        }
        drop(view);

        self.notify(StoreUpdate::MessagesChanged(conversation_id));
        true
    }

    /// Remove a message entry (optimistic rollback). Returns the removed
    /// message so the caller can restore the compose buffer.
    pub fn remove_message(
        &self,
        conversation_id: ConversationId,
        id: MessageId,
    ) -> Option<Message> {
        let mut view = self.conversations.get_mut(&conversation_id)?;
        let index = view.messages.iter().position(|m| m.id == id)?;
        let removed = view.messages.remove(index);
        drop(view);

        self.notify(StoreUpdate::MessagesChanged(conversation_id));
        Some(removed)
    }

    /// Force an entry into the `Failed` state (send watchdog). Returns
    /// `false` if the entry is gone or already reconciled.
    pub fn mark_failed(&self, conversation_id: ConversationId, id: MessageId) -> bool {
        let mut view = match self.conversations.get_mut(&conversation_id) {
            Some(view) => view,
            None => return false,
        };

        let Some(slot) = view.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if slot.delivery != DeliveryState::Optimistic {
            return false;
        }
        slot.delivery = DeliveryState::Failed;
        drop(view);

        self.notify(StoreUpdate::MessagesChanged(conversation_id));
        true
    }

    /// Snapshot of a conversation's messages, in render order
    pub fn messages(&self, conversation_id: ConversationId) -> Vec<Message> {
        self.conversations
            .get(&conversation_id)
            .map(|v| v.messages.clone())
            .unwrap_or_default()
    }

    /// Look up a single message by id
    pub fn message(&self, conversation_id: ConversationId, id: MessageId) -> Option<Message> {
        self.conversations
            .get(&conversation_id)?
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Check whether a durable message id is already known
    pub fn contains_durable(&self, conversation_id: ConversationId, durable_id: Uuid) -> bool {
        self.conversations
            .get(&conversation_id)
            .is_some_and(|view| {
                view.messages
                    .iter()
                    .any(|m| !m.id.is_local() && m.id.as_uuid() == durable_id)
            })
    }

    /// Drop all local state (sign-out)
    pub fn clear(&self) {
        self.conversations.clear();
    }

    // =========================================================================
    // Ordering helpers
    // =========================================================================

    fn insert_ordered(messages: &mut Vec<Message>, message: Message) {
        // Equal timestamps keep arrival order
        let index = messages.partition_point(|m| m.created_at <= message.created_at);
        messages.insert(index, message);
    }

    fn reorder(mut messages: Vec<Message>) -> Vec<Message> {
        messages.sort_by_key(|m| m.created_at);
        messages
    }
}

impl Default for LocalConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalConversationStore")
            .field("conversations", &self.conversations.len())
            .finish()
    }
}
