//! # relay-common
//!
//! Cross-cutting utilities shared by the sync core: environment-based
//! configuration, tracing setup, and the registry that owns background
//! task handles so timers are swept deterministically on teardown.

pub mod config;
pub mod tasks;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, SyncConfig, VerificationConfig};
pub use tasks::TaskRegistry;
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig};
