//! # relay-sync
//!
//! Application layer for the send pipeline and realtime synchronization:
//! the dedup/debounce gate guarding the pipeline entry, the optimistic
//! send coordinator, the sync engine that merges remote change events into
//! local state, and the session facade exposed to views.

pub mod engine;
pub mod gate;
pub mod send;
pub mod session;

pub use engine::{ConnectionStatus, SubscriptionHandle, SyncEngine};
pub use gate::{DedupWindow, Debouncer, GatedSend, SendGate};
pub use send::{SendCoordinator, SendEvent, SendReceipt};
pub use session::{ChatSession, ComposeBuffer};
