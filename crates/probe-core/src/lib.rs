//! # Probe Core
//!
//! Domain model shared between the API tier and the probe agents:
//! check statuses and regions, the bus wire envelopes, and the
//! per-kind probe parameter types with their tolerant normalization.
//!
//! ## Modules
//!
//! - [`status`] - Check status and region enums
//! - [`envelope`] - Task / result wire envelopes and topic naming
//! - [`params`] - Probe parameter types and normalization
//! - [`error`] - Core error types

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod envelope;
pub mod error;
pub mod params;
pub mod status;

pub use envelope::{
    check_topic, parse_task, CheckSpec, ClientContext, GeoContext, ResultEnvelope, TaskEnvelope,
    TaskRequest, DEADLINE_EXCEEDED_ERROR,
};
pub use error::{Error, Result};
pub use params::{DnsParams, HttpParams, PingParams, TcpParams, TracerouteParams};
pub use status::{CheckStatus, Region};
