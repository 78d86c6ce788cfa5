//! Integration test utilities for the sync core
//!
//! Wires the full stack in process: in-memory gateway, local store,
//! session (gate, coordinator, engine), connection registry, and
//! verification manager.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
