//! Outbox staging table

use crate::models::OutboxMessageRow;
use crate::{DbPool, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Repository for the durable outbox.
#[derive(Debug, Clone)]
pub struct OutboxRepo {
    pool: DbPool,
}

impl OutboxRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Stage a message for publication. Idempotent on id.
    pub async fn insert(
        &self,
        ex: impl PgExecutor<'_>,
        message: &OutboxMessageRow,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages.outbox_messages (id, topic, payload)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(message.id)
        .bind(message.topic.as_str())
        .bind(&message.payload)
        .execute(ex)
        .await?;
        Ok(())
    }

    /// Mark a message as published. Once set, the row is never selected
    /// for publication again.
    pub async fn mark_sent(&self, message_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE messages.outbox_messages
             SET sent = true, sent_at = now()
             WHERE id = $1",
        )
        .bind(message_id)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Oldest unsent messages, up to `batch_size`.
    pub async fn select_unsent_batch(&self, batch_size: i64) -> Result<Vec<OutboxMessageRow>> {
        let rows = sqlx::query_as::<_, OutboxMessageRow>(
            "SELECT id, topic, payload, created_at, sent, sent_at
             FROM messages.outbox_messages
             WHERE sent = false
             ORDER BY created_at
             LIMIT $1",
        )
        .bind(batch_size)
        .fetch_all(self.pool.inner())
        .await?;
        Ok(rows)
    }
}
