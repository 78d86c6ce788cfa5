//! Trailing-edge debouncer
//!
//! Owns its timer handle and the pending payload explicitly: each call
//! replaces the payload and restarts the timer, so only the last call in
//! a burst fires. Earlier calls are discarded, never queued.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Trailing-edge debouncer over payloads of type `T`
pub struct Debouncer<T>
where
    T: Send + 'static,
{
    delay: Duration,
    pending: Arc<Mutex<Option<T>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Debouncer<T>
where
    T: Send + 'static,
{
    /// Create a debouncer with the given trailing delay
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
        }
    }

    /// Register a call. The timer restarts; once it elapses without a
    /// newer call, `fire` runs with the most recent payload.
    pub fn call<F, Fut>(&self, payload: T, fire: F)
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.pending.lock() = Some(payload);

        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached: aborting this handle can only cancel the sleep,
            // never a fire that has already taken its payload
            let payload = pending.lock().take();
            if let Some(payload) = payload {
                tokio::spawn(fire(payload));
            }
        }));
    }

    /// Cancel the pending timer and discard any unfired payload.
    /// Idempotent.
    pub fn stop(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        self.pending.lock().take();
    }

    /// Check whether a fire is pending
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl<T> Drop for Debouncer<T>
where
    T: Send + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}
