//! Requests, assignments and check results

use crate::models::{AssignmentRow, CheckResultRow, CheckResultViewRow, RequestRow};
use crate::{DbPool, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Repository for check requests and their owned rows.
#[derive(Debug, Clone)]
pub struct RequestRepo {
    pool: DbPool,
}

impl RequestRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for starting transactions.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Insert a request. Status and timestamps come back from database
    /// defaults and are written into the row.
    pub async fn insert_request(
        &self,
        ex: impl PgExecutor<'_>,
        request: &mut RequestRow,
    ) -> Result<()> {
        let (status, created_at, updated_at) = sqlx::query_as::<
            _,
            (String, DateTime<Utc>, DateTime<Utc>),
        >(
            "INSERT INTO domain.requests (id,
                                          target,
                                          timeout_seconds,
                                          broadcast,
                                          client_ip,
                                          user_agent,
                                          client_asn,
                                          client_cc,
                                          client_region,
                                          checks_types,
                                          request_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING status::TEXT, created_at, updated_at",
        )
        .bind(request.id)
        .bind(&request.target)
        .bind(request.timeout_seconds)
        .bind(request.broadcast)
        .bind(&request.client_ip)
        .bind(&request.user_agent)
        .bind(request.client_asn)
        .bind(&request.client_cc)
        .bind(&request.client_region)
        .bind(&request.checks_types)
        .bind(&request.request_json)
        .fetch_one(ex)
        .await?;

        request.status = status;
        request.created_at = created_at;
        request.updated_at = updated_at;
        Ok(())
    }

    /// Insert an assignment row.
    pub async fn insert_assignment(
        &self,
        ex: impl PgExecutor<'_>,
        assignment: &AssignmentRow,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO domain.assignments (id, request_id, agent_id, agent_region, outbox_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(assignment.id)
        .bind(assignment.request_id)
        .bind(assignment.agent_id)
        .bind(assignment.agent_region.as_str())
        .bind(assignment.outbox_id)
        .execute(ex)
        .await?;
        Ok(())
    }

    /// Insert a check result row.
    pub async fn insert_check_result(
        &self,
        ex: impl PgExecutor<'_>,
        result: &CheckResultRow,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO domain.check_results (id, assignment_id, type, status, started_at, finished_at, payload)
             VALUES ($1, $2, $3, $4::domain.check_status, $5, $6, $7)",
        )
        .bind(result.id)
        .bind(result.assignment_id)
        .bind(result.kind.as_str())
        .bind(result.status.as_str())
        .bind(result.started_at)
        .bind(result.finished_at)
        .bind(&result.payload)
        .execute(ex)
        .await?;
        Ok(())
    }

    /// Aggregated result view for a request.
    ///
    /// `check_results.assignment_id` carries the originating request id,
    /// not the assignment id, so the join is on `a.request_id`. Under
    /// broadcast this multiplies each result across the request's
    /// assignments; callers must tolerate the duplication.
    pub async fn select_results(&self, request_id: Uuid) -> Result<Vec<CheckResultViewRow>> {
        let rows = sqlx::query_as::<_, CheckResultViewRow>(
            "SELECT a.request_id,
                    a.agent_id,
                    a.agent_region,
                    c.type,
                    c.status::TEXT AS status,
                    c.started_at,
                    c.finished_at,
                    c.payload
             FROM domain.assignments a
             JOIN domain.check_results c ON a.request_id = c.assignment_id
             WHERE a.request_id = $1
             ORDER BY a.agent_id",
        )
        .bind(request_id)
        .fetch_all(self.pool.inner())
        .await?;
        Ok(rows)
    }
}
