//! Outbox publisher
//!
//! Polls unsent outbox rows in batches and fans them out to a worker pool
//! that publishes each row to its topic and marks it sent. A row is only
//! marked after the broker acknowledged the publish, so a crash between
//! publish and mark results in a duplicate publish, never a loss.

use crate::config::ProducerConfig;
use probe_bus::Producer;
use probe_db::{OutboxMessageRow, OutboxRepo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info};

const CHANNEL_CAPACITY_MULTIPLIER: usize = 5;

/// Publisher pool settings.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub batch_size: usize,
}

impl From<&ProducerConfig> for PublisherSettings {
    fn from(cfg: &ProducerConfig) -> Self {
        Self {
            worker_count: cfg.worker_count,
            poll_interval: cfg.poll_interval(),
            batch_size: cfg.batch_size,
        }
    }
}

/// Durable at-least-once publisher from outbox rows to the bus.
pub struct OutboxPublisher {
    settings: PublisherSettings,
    producer: Producer,
    outbox: OutboxRepo,
}

impl OutboxPublisher {
    /// Create a new publisher
    pub fn new(settings: PublisherSettings, producer: Producer, outbox: OutboxRepo) -> Self {
        Self {
            settings,
            producer,
            outbox,
        }
    }

    /// Poll and publish until shutdown, then drain the in-flight batch.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let capacity = self.settings.batch_size.max(1) * CHANNEL_CAPACITY_MULTIPLIER;
        let (tx, rx) = mpsc::channel::<OutboxMessageRow>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.worker_count.max(1) {
            let rx = Arc::clone(&rx);
            let producer = self.producer.clone();
            let outbox = self.outbox.clone();
            workers.spawn(worker(worker_id, rx, producer, outbox));
        }

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("outbox publisher stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let batch = match self.outbox.select_unsent_batch(self.settings.batch_size as i64).await {
                        Ok(batch) => batch,
                        Err(err) => {
                            error!(error = %err, "failed to select unsent messages");
                            continue;
                        }
                    };

                    for message in batch {
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }

        drop(tx);
        while workers.join_next().await.is_some() {}
        info!("outbox publisher stopped");
    }
}

async fn worker(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<OutboxMessageRow>>>,
    producer: Producer,
    outbox: OutboxRepo,
) {
    info!(worker_id, "outbox worker started");

    loop {
        let message = { rx.lock().await.recv().await };
        let Some(message) = message else {
            info!(worker_id, "outbox worker stopping");
            return;
        };

        match send_and_mark(&producer, &outbox, &message).await {
            Ok((partition, offset)) => {
                info!(message_id = %message.id, partition, offset, "message sent");
            }
            Err(err) => {
                // Row stays unsent; the next poll retries it
                error!(message_id = %message.id, error = %err, "failed to send message");
            }
        }
    }
}

async fn send_and_mark(
    producer: &Producer,
    outbox: &OutboxRepo,
    message: &OutboxMessageRow,
) -> anyhow::Result<(i32, i64)> {
    let (partition, offset) = producer
        .push(message.id.as_bytes(), &message.payload, &message.topic)
        .await?;

    outbox.mark_sent(message.id).await?;

    Ok((partition, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let cfg = ProducerConfig {
            worker_count: 3,
            poll_interval_ms: 250,
            batch_size: 40,
        };

        let settings = PublisherSettings::from(&cfg);
        assert_eq!(settings.worker_count, 3);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.batch_size, 40);
    }
}
