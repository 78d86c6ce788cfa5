//! # relay-channels
//!
//! Channel management: the gateway-backed connection registry (instance
//! labeling, soft and hard disconnect, orphan cleanup) and the
//! verification challenge lifecycle (code issuance, completion polling,
//! expiry sweeping).

pub mod records;
pub mod registry;
pub mod verification;

pub use records::{ChallengeRecord, ConnectionRecord};
pub use registry::{
    ChannelSnapshot, ConnectionRegistry, HardDeleteConfirmation, InstanceRole, LabeledConnection,
};
pub use verification::{VerificationEvent, VerificationManager};
