//! Check request dispatcher
//!
//! Resolves the client's region, derives the task envelope, and persists
//! the request, its assignments and their outbox rows in one transaction
//! so that no published task can reference a request a reader cannot see.

use probe_core::{check_topic, ClientContext, GeoContext, TaskEnvelope, TaskRequest};
use probe_db::{
    AgentRepo, AssignmentRow, CheckResultViewRow, OutboxMessageRow, OutboxRepo, RequestRepo,
    RequestRow,
};
use probe_geo::{GeoDb, GeoInfo};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Dispatch error types
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Malformed request; never retried
    #[error("validation failed: {0}")]
    Validation(String),

    /// No agent registered for the selected region
    #[error("no agent available in region {0}")]
    AgentUnavailable(String),

    /// Transaction failure; everything rolled back
    #[error("dispatch failed: {0}")]
    Db(#[from] probe_db::DbError),

    /// Envelope serialization failure
    #[error("dispatch failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Dispatcher service behind the check endpoints.
pub struct Dispatcher {
    geo: Arc<GeoDb>,
    requests: RequestRepo,
    outbox: OutboxRepo,
    agents: AgentRepo,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(geo: Arc<GeoDb>, requests: RequestRepo, outbox: OutboxRepo, agents: AgentRepo) -> Self {
        Self {
            geo,
            requests,
            outbox,
            agents,
        }
    }

    /// Validate and persist a check request, staging one task message per
    /// selected agent. Returns the stored request row.
    pub async fn dispatch(
        &self,
        req: TaskRequest,
        client_ip: Option<IpAddr>,
        user_agent: &str,
    ) -> Result<RequestRow, DispatchError> {
        validate(&req)?;

        let geo = self.geo.lookup(client_ip);
        let id = Uuid::new_v4();
        let envelope = build_envelope(id, &req, &geo, client_ip, user_agent);
        let payload = serde_json::to_vec(&envelope)?;

        let mut request = request_row(id, &req, &geo, client_ip, user_agent, payload.clone());

        let mut tx = self.requests.pool().begin().await?;
        self.requests.insert_request(&mut *tx, &mut request).await?;

        if req.broadcast {
            let agents = self.agents.select_all(&mut *tx).await?;
            if agents.is_empty() {
                return Err(DispatchError::AgentUnavailable("any".to_string()));
            }
            for agent in &agents {
                let message = OutboxMessageRow::new(check_topic(&agent.region), payload.clone());
                self.outbox.insert(&mut *tx, &message).await?;
                let assignment = AssignmentRow::new(id, agent.id, &agent.region, message.id);
                self.requests.insert_assignment(&mut *tx, &assignment).await?;
            }
            info!(request_id = %id, agents = agents.len(), "broadcast request staged");
        } else {
            let region = geo.region.as_str();
            let agent = self
                .agents
                .select_by_region(&mut *tx, region)
                .await?
                .ok_or_else(|| DispatchError::AgentUnavailable(region.to_string()))?;

            let message = OutboxMessageRow::new(check_topic(region), payload);
            self.outbox.insert(&mut *tx, &message).await?;
            let assignment = AssignmentRow::new(id, agent.id, &agent.region, message.id);
            self.requests.insert_assignment(&mut *tx, &assignment).await?;
            info!(request_id = %id, region, "request staged");
        }

        tx.commit().await.map_err(probe_db::DbError::from)?;
        Ok(request)
    }

    /// Current aggregated results for a request; empty when nothing has
    /// arrived yet or the request is unknown.
    pub async fn results(&self, request_id: Uuid) -> Result<Vec<CheckResultViewRow>, DispatchError> {
        Ok(self.requests.select_results(request_id).await?)
    }
}

fn validate(req: &TaskRequest) -> Result<(), DispatchError> {
    if req.target.trim().is_empty() {
        return Err(DispatchError::Validation("target must not be empty".to_string()));
    }
    if req.timeout_seconds <= 0 {
        return Err(DispatchError::Validation(
            "timeoutSeconds must be positive".to_string(),
        ));
    }
    if req.checks.is_empty() {
        return Err(DispatchError::Validation("checks must not be empty".to_string()));
    }
    Ok(())
}

fn build_envelope(
    id: Uuid,
    req: &TaskRequest,
    geo: &GeoInfo,
    client_ip: Option<IpAddr>,
    user_agent: &str,
) -> TaskEnvelope {
    let region = geo.region.as_str().to_string();
    TaskEnvelope {
        id,
        target: req.target.clone(),
        timeout_seconds: req.timeout_seconds,
        client_context: ClientContext {
            ip: client_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            asn: geo.asn,
            geo: GeoContext {
                region: region.clone(),
                continent: geo.continent.clone(),
            },
            user_agent: user_agent.to_string(),
        },
        checks: req.checks.clone(),
        metadata: BTreeMap::from([
            ("origin".to_string(), "api".to_string()),
            ("region".to_string(), region),
        ]),
    }
}

fn request_row(
    id: Uuid,
    req: &TaskRequest,
    geo: &GeoInfo,
    client_ip: Option<IpAddr>,
    user_agent: &str,
    payload: Vec<u8>,
) -> RequestRow {
    RequestRow {
        id,
        target: req.target.clone(),
        timeout_seconds: req.timeout_seconds,
        broadcast: req.broadcast,
        client_ip: client_ip.map(|ip| ip.to_string()).unwrap_or_default(),
        user_agent: user_agent.to_string(),
        client_asn: geo.asn,
        client_cc: geo.cc.clone(),
        client_region: geo.region.as_str().to_string(),
        status: String::new(),
        checks_types: req.checks.iter().map(|c| c.kind.clone()).collect(),
        request_json: payload,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}
