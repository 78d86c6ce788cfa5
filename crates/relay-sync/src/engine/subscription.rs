//! Subscription handle and connection status

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Connection status of a realtime subscription, surfaced to the caller
/// so views can show connectivity feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Handle over a running subscription worker.
///
/// Cancellation is synchronous: once `cancel` returns, the worker can no
/// longer mutate the local store. Dropping the handle cancels too, so a
/// superseded subscription cannot leak its task.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
    status: watch::Receiver<ConnectionStatus>,
    cancelled: AtomicBool,
}

impl SubscriptionHandle {
    pub(crate) fn new(task: JoinHandle<()>, status: watch::Receiver<ConnectionStatus>) -> Self {
        Self {
            task,
            status,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Stop the subscription worker. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.task.abort();
        }
    }

    /// Current connection status
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        if self.cancelled.load(Ordering::SeqCst) {
            return ConnectionStatus::Disconnected;
        }
        *self.status.borrow()
    }

    /// Watch receiver for status transitions
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Check whether the subscription has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("status", &self.status())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
