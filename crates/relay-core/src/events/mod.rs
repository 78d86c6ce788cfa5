//! Change events emitted by the backing store subscription primitive

mod change_event;

pub use change_event::{ChangeEvent, ChangeFeed, ChangeKind, FeedError};
