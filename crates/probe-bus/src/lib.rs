//! # Probe Bus
//!
//! Thin wrappers over the Kafka client exposing exactly the two seams the
//! pipeline needs: a [`Producer`] that pushes key/value pairs to a topic
//! with full acknowledgement, and a [`ConsumerGroupRunner`] that surfaces
//! consumed messages on a channel and commits offsets when the handler
//! marks them. Nothing outside this crate touches the Kafka client types.

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod consumer;
pub mod error;
pub mod producer;

pub use consumer::{BusMessage, ConsumerGroupRunner};
pub use error::{BusError, Result};
pub use producer::Producer;
