//! # Probe Agent
//!
//! Consumes task envelopes from its region topic, fans each task's checks
//! out to concurrent probe runners under per-kind and overall deadlines,
//! and publishes one result envelope per check back to the result topic.

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod executor;
pub mod geocache;
pub mod probes;

pub use config::AgentConfig;
pub use executor::Executor;
