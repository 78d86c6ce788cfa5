//! Send gate - dedup window and trailing-edge debounce
//!
//! Guards the entry point of the send pipeline: bursts of invocation
//! collapse into at most one underlying call, and a request identical to
//! one recently accepted is silently dropped. Suppressed calls are never
//! queued.

mod debounce;
mod dedup;

pub use debounce::Debouncer;
pub use dedup::DedupWindow;

use std::future::Future;

use relay_core::ConversationId;

/// Payload flowing through the gate into the send pipeline
#[derive(Debug, Clone)]
pub struct GatedSend {
    pub conversation_id: ConversationId,
    pub content: String,
}

/// Composed pipeline gate: dedup first, then trailing-edge debounce.
pub struct SendGate {
    dedup: DedupWindow,
    debouncer: Debouncer<GatedSend>,
}

impl SendGate {
    /// Create a gate with the given dedup window/capacity and debounce delay
    #[must_use]
    pub fn new(
        dedup_window: std::time::Duration,
        dedup_capacity: usize,
        debounce: std::time::Duration,
    ) -> Self {
        Self {
            dedup: DedupWindow::new(dedup_window, dedup_capacity),
            debouncer: Debouncer::new(debounce),
        }
    }

    /// Offer a send to the gate.
    ///
    /// Returns `false` if the request was dropped as a duplicate. Returns
    /// `true` if it was accepted into the debounce cycle; `fire` runs with
    /// the payload of the *last* accepted call once the burst settles.
    pub fn trigger<F, Fut>(&self, send: GatedSend, fire: F) -> bool
    where
        F: FnOnce(GatedSend) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.dedup.accept(&send.content, send.conversation_id) {
            tracing::debug!(
                conversation_id = %send.conversation_id,
                "Duplicate send dropped by dedup window"
            );
            return false;
        }

        self.debouncer.call(send, fire);
        true
    }

    /// Stop the gate, aborting any pending debounce timer.
    pub fn stop(&self) {
        self.debouncer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn send(conversation_id: ConversationId, content: &str) -> GatedSend {
        GatedSend {
            conversation_id,
            content: content.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_burst_fires_once() {
        let gate = SendGate::new(Duration::from_secs(2), 64, Duration::from_millis(500));
        let fired = Arc::new(AtomicUsize::new(0));
        let convo = ConversationId::generate();

        for _ in 0..2 {
            let fired = fired.clone();
            gate.trigger(send(convo, "Hola"), move |_| async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evolving_burst_fires_with_last_content() {
        let gate = SendGate::new(Duration::from_secs(2), 64, Duration::from_millis(500));
        let seen: Arc<parking_lot::Mutex<Vec<String>>> = Arc::default();
        let convo = ConversationId::generate();

        for i in 0..5 {
            let seen = seen.clone();
            let accepted = gate.trigger(send(convo, &format!("draft {i}")), move |s| async move {
                seen.lock().push(s.content);
            });
            assert!(accepted);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        let seen = seen.lock();
        assert_eq!(seen.as_slice(), ["draft 4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_suppresses_pending_fire() {
        let gate = SendGate::new(Duration::from_secs(2), 64, Duration::from_millis(500));
        let fired = Arc::new(AtomicUsize::new(0));
        let convo = ConversationId::generate();

        let fired_inner = fired.clone();
        gate.trigger(send(convo, "Hola"), move |_| async move {
            fired_inner.fetch_add(1, Ordering::SeqCst);
        });
        gate.stop();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
