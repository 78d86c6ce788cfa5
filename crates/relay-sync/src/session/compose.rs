//! Compose buffer
//!
//! The draft text bound to the message input. The send coordinator clears
//! it the moment a message is optimistically displayed and restores it on
//! rollback, so a failed send never loses typed content.

use parking_lot::Mutex;

/// Shared draft text for the message input
#[derive(Default)]
pub struct ComposeBuffer {
    text: Mutex<String>,
}

impl ComposeBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the draft text
    pub fn set(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }

    /// Clear the draft text
    pub fn clear(&self) {
        self.text.lock().clear();
    }

    /// Put content back after a rolled-back send
    pub fn restore(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }

    /// Take the draft text, leaving the buffer empty
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.text.lock())
    }

    /// Current draft text
    #[must_use]
    pub fn snapshot(&self) -> String {
        self.text.lock().clone()
    }

    /// Check whether the buffer holds only whitespace
    pub fn is_blank(&self) -> bool {
        self.text.lock().trim().is_empty()
    }
}
