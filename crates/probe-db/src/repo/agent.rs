//! Registered probe agents

use crate::models::AgentRow;
use crate::{DbPool, Result};
use sqlx::PgExecutor;

/// Repository for the agent registry.
#[derive(Debug, Clone)]
pub struct AgentRepo {
    pool: DbPool,
}

impl AgentRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Every known agent.
    pub async fn select_all(&self, ex: impl PgExecutor<'_>) -> Result<Vec<AgentRow>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            "SELECT id, region, asn, online, updated_at
             FROM domain.agents",
        )
        .fetch_all(ex)
        .await?;
        Ok(rows)
    }

    /// The agent serving a region, if any.
    pub async fn select_by_region(
        &self,
        ex: impl PgExecutor<'_>,
        region: &str,
    ) -> Result<Option<AgentRow>> {
        let row = sqlx::query_as::<_, AgentRow>(
            "SELECT id, region, asn, online, updated_at
             FROM domain.agents
             WHERE region = $1",
        )
        .bind(region)
        .fetch_optional(ex)
        .await?;
        Ok(row)
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
