//! # Probe Server
//!
//! The API tier of the probe service: accepts check requests, resolves
//! the client's region, persists the request together with its outbox
//! rows in one transaction, publishes staged tasks to the bus, ingests
//! agent results, and serves the aggregated results over HTTP and a
//! streaming socket.

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod api;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod inbox;
pub mod outbox;

pub use config::Config;
pub use dispatch::{DispatchError, Dispatcher};
