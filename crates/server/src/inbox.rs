//! Inbox subscriber
//!
//! Consumes agent results from the bus and persists, per message, the
//! inbox deduplication row and the domain check result in one
//! transaction. The bus offset is only acknowledged after commit, so a
//! crash mid-ingest leads to redelivery, never loss. Unparseable
//! messages are acknowledged and skipped.

use chrono::Utc;
use probe_bus::{BusMessage, ConsumerGroupRunner};
use probe_core::{CheckStatus, ResultEnvelope};
use probe_db::{CheckResultRow, DbError, InboxMessageRow, InboxRepo, RequestRepo};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

const MESSAGE_PIPE_BUFFER: usize = 1000;

/// Subscriber pool settings.
#[derive(Debug, Clone)]
pub struct SubscriberSettings {
    pub worker_count: usize,
    pub topic: String,
}

/// Idempotent consumer of agent result messages.
#[derive(Clone)]
pub struct InboxSubscriber {
    settings: SubscriberSettings,
    inbox: InboxRepo,
    requests: RequestRepo,
}

impl InboxSubscriber {
    /// Create a new subscriber
    pub fn new(settings: SubscriberSettings, inbox: InboxRepo, requests: RequestRepo) -> Self {
        Self {
            settings,
            inbox,
            requests,
        }
    }

    /// Consume and ingest until shutdown.
    pub async fn run(self, runner: ConsumerGroupRunner, shutdown: watch::Receiver<bool>) {
        let (tx, rx) = mpsc::channel::<BusMessage>(MESSAGE_PIPE_BUFFER);
        let rx = Arc::new(Mutex::new(rx));

        let consumer = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                if let Err(err) = runner.run(tx, shutdown).await {
                    error!(error = %err, "result consumer failed");
                }
            }
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.worker_count.max(1) {
            let rx = Arc::clone(&rx);
            let subscriber = self.clone();
            workers.spawn(async move { subscriber.worker(worker_id, rx).await });
        }

        while workers.join_next().await.is_some() {}
        let _ = consumer.await;
        info!("inbox subscriber stopped");
    }

    async fn worker(self, worker_id: usize, rx: Arc<Mutex<mpsc::Receiver<BusMessage>>>) {
        info!(worker_id, "inbox worker started");

        loop {
            let message = { rx.lock().await.recv().await };
            let Some(message) = message else {
                info!(worker_id, "inbox worker stopping");
                return;
            };

            let task_id = match Uuid::from_slice(&message.key) {
                Ok(id) => id,
                Err(err) => {
                    warn!(worker_id, error = %err, "unparseable message key, skipping");
                    message.mark();
                    continue;
                }
            };

            let envelope = match serde_json::from_slice::<ResultEnvelope>(&message.payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(worker_id, task_id = %task_id, error = %err, "unparseable result envelope, skipping");
                    message.mark();
                    continue;
                }
            };

            match self.persist(task_id, &envelope, &message.payload).await {
                Ok(()) => {
                    info!(task_id = %task_id, check_index = envelope.check_index, kind = %envelope.kind, "result ingested");
                    message.mark();
                }
                Err(err) => {
                    // No ack; the broker redelivers after rebalance
                    error!(worker_id, task_id = %task_id, error = %err, "failed to persist result");
                }
            }
        }
    }

    async fn persist(
        &self,
        task_id: Uuid,
        envelope: &ResultEnvelope,
        raw: &[u8],
    ) -> Result<(), DbError> {
        let inbox_row = InboxMessageRow {
            id: task_id,
            topic: self.settings.topic.clone(),
            payload: raw.to_vec(),
            created_at: Utc::now(),
            processed: false,
            processed_at: None,
        };

        // assignment_id carries the task id from the message key; the
        // results view joins on request_id accordingly
        let result_row = CheckResultRow {
            id: Uuid::new_v4(),
            assignment_id: task_id,
            kind: envelope.kind.clone(),
            status: status_for(envelope).as_str().to_string(),
            started_at: envelope.started_at,
            finished_at: Utc::now(),
            payload: raw.to_vec(),
        };

        let mut tx = self.requests.pool().begin().await?;
        self.inbox.insert(&mut *tx, &inbox_row).await?;
        self.requests.insert_check_result(&mut *tx, &result_row).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}

/// Map an agent result to its stored status: success is DONE, a
/// deadline-labelled failure is TIMEOUT, everything else FAILED.
pub(crate) fn status_for(envelope: &ResultEnvelope) -> CheckStatus {
    if envelope.ok {
        CheckStatus::Done
    } else if envelope.is_deadline_exceeded() {
        CheckStatus::Timeout
    } else {
        CheckStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::DEADLINE_EXCEEDED_ERROR;

    fn envelope(ok: bool, error: Option<&str>) -> ResultEnvelope {
        ResultEnvelope {
            task_id: Uuid::nil(),
            check_index: 0,
            kind: "http".to_string(),
            target: "example.com".to_string(),
            started_at: Utc::now(),
            duration_ms: 10,
            ok,
            error: error.map(str::to_string),
            payload: None,
        }
    }

    #[test]
    fn test_ok_maps_to_done() {
        assert_eq!(status_for(&envelope(true, None)), CheckStatus::Done);
    }

    #[test]
    fn test_failure_maps_to_failed() {
        assert_eq!(
            status_for(&envelope(false, Some("connection refused"))),
            CheckStatus::Failed
        );
        assert_eq!(status_for(&envelope(false, None)), CheckStatus::Failed);
    }

    #[test]
    fn test_deadline_label_maps_to_timeout() {
        assert_eq!(
            status_for(&envelope(false, Some(DEADLINE_EXCEEDED_ERROR))),
            CheckStatus::Timeout
        );
    }
}
