//! Dedup window - recent-acceptance tracking
//!
//! A request identical (by trimmed content and conversation) to one
//! accepted within the window is dropped. This is a correctness feature
//! against double key-presses and overlapping debounce cycles, not an
//! optimization.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use relay_core::ConversationId;

struct Acceptance {
    content: String,
    conversation_id: ConversationId,
    at: Instant,
}

/// Bounded window of recently accepted sends
pub struct DedupWindow {
    window: Duration,
    capacity: usize,
    recent: Mutex<VecDeque<Acceptance>>,
}

impl DedupWindow {
    /// Create a window of the given duration, retaining at most
    /// `capacity` acceptances.
    #[must_use]
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Offer a request. Returns `true` and records the acceptance when the
    /// request is new; returns `false` when it duplicates a recent one.
    pub fn accept(&self, content: &str, conversation_id: ConversationId) -> bool {
        let trimmed = content.trim();
        let now = Instant::now();
        let mut recent = self.recent.lock();

        // Expired entries leave the window first
        while recent
            .front()
            .is_some_and(|a| now.duration_since(a.at) >= self.window)
        {
            recent.pop_front();
        }

        let duplicate = recent
            .iter()
            .any(|a| a.conversation_id == conversation_id && a.content == trimmed);
        if duplicate {
            return false;
        }

        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(Acceptance {
            content: trimmed.to_string(),
            conversation_id,
            at: now,
        });
        true
    }

    /// Number of acceptances currently retained
    pub fn len(&self) -> usize {
        self.recent.lock().len()
    }

    /// Check whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.recent.lock().is_empty()
    }
}
