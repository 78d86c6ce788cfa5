//! Optimistic send pipeline

mod coordinator;

pub use coordinator::{OutboundDraft, SendCoordinator, SendEvent, SendReceipt};
