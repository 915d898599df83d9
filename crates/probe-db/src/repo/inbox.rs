//! Inbox deduplication table

use crate::models::InboxMessageRow;
use crate::{DbPool, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Repository for the durable inbox.
#[derive(Debug, Clone)]
pub struct InboxRepo {
    pool: DbPool,
}

impl InboxRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a consumed message. Duplicate deliveries are silently
    /// ignored on id.
    pub async fn insert(&self, ex: impl PgExecutor<'_>, message: &InboxMessageRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages.inbox_messages (id, topic, payload)
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

    /// Mark a message as processed.
    pub async fn mark_processed(&self, message_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE messages.inbox_messages
             SET processed = true, processed_at = now()
             WHERE id = $1",
        )
        .bind(message_id)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Oldest unprocessed messages, up to `batch_size`.
    pub async fn select_unprocessed_batch(&self, batch_size: i64) -> Result<Vec<InboxMessageRow>> {
        let rows = sqlx::query_as::<_, InboxMessageRow>(
            "SELECT id, topic, payload, created_at, processed, processed_at
             FROM messages.inbox_messages
             WHERE processed = false
             ORDER BY created_at
             LIMIT $1",
        )
        .bind(batch_size)
        .fetch_all(self.pool.inner())
        .await?;
        Ok(rows)
    }
}
