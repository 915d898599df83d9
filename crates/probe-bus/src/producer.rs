//! Kafka producer wrapper

use crate::Result;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::debug;

/// Producer pushing key/value messages to a topic.
///
/// Configured with `acks=all` so a publish only succeeds once every
/// in-sync replica has the message. Partitioning is by message key, which
/// keeps all messages for one task in order on one partition.
#[derive(Clone)]
pub struct Producer {
    inner: FutureProducer,
}

impl Producer {
    /// Create a producer against the given brokers.
    pub fn new(brokers: &[String]) -> Result<Self> {
        let inner: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("acks", "all")
            .set("message.timeout.ms", "10000")
            .create()?;

        Ok(Self { inner })
    }

    /// Publish one message; resolves once the broker acknowledged it.
    /// Returns the partition and offset it landed on.
    pub async fn push(&self, key: &[u8], payload: &[u8], topic: &str) -> Result<(i32, i64)> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.inner.send(record, Timeout::Never).await {
            Ok((partition, offset)) => {
                debug!(topic, partition, offset, "message published");
                Ok((partition, offset))
            }
            Err((err, _message)) => Err(err.into()),
        }
    }
}
