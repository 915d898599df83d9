//! Kafka consumer-group wrapper

use crate::Result;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::stream_consumer::StreamConsumer;
use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::message::Message as _;
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Offset acknowledgement sent back by a message handler.
#[derive(Debug, Clone)]
struct Ack {
    topic: String,
    partition: i32,
    offset: i64,
}

/// A consumed message plus its acknowledgement hook.
///
/// Handlers call [`BusMessage::mark`] once the message is durably
/// processed; unmarked messages are redelivered after a rebalance or
/// restart.
#[derive(Debug)]
pub struct BusMessage {
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    acks: mpsc::UnboundedSender<Ack>,
}

impl BusMessage {
    /// Acknowledge the message so its offset is committed.
    pub fn mark(&self) {
        let _ = self.acks.send(Ack {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
        });
    }
}

/// Consumer-group reader that forwards messages to a channel and commits
/// offsets for marked messages.
pub struct ConsumerGroupRunner {
    consumer: StreamConsumer,
    ack_tx: mpsc::UnboundedSender<Ack>,
    ack_rx: mpsc::UnboundedReceiver<Ack>,
    group_id: String,
}

impl ConsumerGroupRunner {
    /// Join a consumer group subscribed to the given topics. Offsets are
    /// committed only through [`BusMessage::mark`].
    pub fn new(brokers: &[String], group_id: &str, topics: &[&str]) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(topics)?;

        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        Ok(Self {
            consumer,
            ack_tx,
            ack_rx,
            group_id: group_id.to_string(),
        })
    }

    /// Consume until shutdown, forwarding every message into `messages`.
    ///
    /// Consume errors bubble up so the caller can reconnect; send failures
    /// on `messages` mean the receiving pool is gone and the runner exits
    /// cleanly.
    pub async fn run(
        self,
        messages: mpsc::Sender<BusMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let Self {
            consumer,
            ack_tx,
            mut ack_rx,
            group_id,
        } = self;

        info!(group_id = %group_id, "consumer group running");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(group_id = %group_id, "consumer group stopping");
                    return Ok(());
                }
                Some(ack) = ack_rx.recv() => {
                    if let Err(err) = commit(&consumer, &ack) {
                        warn!(topic = %ack.topic, offset = ack.offset, error = %err, "offset commit failed");
                    }
                }
                received = consumer.recv() => {
                    match received {
                        Ok(message) => {
                            let bus_message = BusMessage {
                                key: message.key().map(<[u8]>::to_vec).unwrap_or_default(),
                                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                                topic: message.topic().to_string(),
                                partition: message.partition(),
                                offset: message.offset(),
                                acks: ack_tx.clone(),
                            };

                            if messages.send(bus_message).await.is_err() {
                                info!(group_id = %group_id, "message channel closed, consumer exiting");
                                return Ok(());
                            }
                        }
                        Err(err) => {
                            error!(group_id = %group_id, error = %err, "consume failed");
                            return Err(err.into());
                        }
                    }
                }
            }
        }
    }
}

fn commit(consumer: &StreamConsumer, ack: &Ack) -> Result<()> {
    let mut list = TopicPartitionList::new();
    list.add_partition_offset(&ack.topic, ack.partition, Offset::Offset(ack.offset + 1))?;
    consumer.commit(&list, CommitMode::Async)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_enqueues_one_ack() {
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        let message = BusMessage {
            key: vec![1],
            payload: vec![2],
            topic: "check-results".to_string(),
            partition: 3,
            offset: 42,
            acks: ack_tx,
        };

        message.mark();

        let ack = ack_rx.recv().await.unwrap();
        assert_eq!(ack.topic, "check-results");
        assert_eq!(ack.partition, 3);
        assert_eq!(ack.offset, 42);
    }
}
