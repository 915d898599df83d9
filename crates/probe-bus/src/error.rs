//! Error types for probe-bus

use thiserror::Error;

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Message bus error types
#[derive(Error, Debug)]
pub enum BusError {
    /// Kafka client error
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}
