//! Database row types
//!
//! JSON field names on API-visible rows follow the wire contract
//! (camelCase); column names stay snake_case via sqlx renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted check request. Status and timestamps are filled from
/// database defaults on insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestRow {
    pub id: Uuid,
    pub target: String,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: i64,
    pub broadcast: bool,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    #[serde(rename = "clientASN")]
    pub client_asn: i64,
    #[serde(rename = "clientCC")]
    pub client_cc: String,
    #[serde(rename = "clientRegion")]
    pub client_region: String,
    pub status: String,
    #[serde(rename = "checkTypes")]
    pub checks_types: Vec<String>,
    #[serde(rename = "requestJSON", with = "bytes_as_string")]
    pub request_json: Vec<u8>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// One agent's work item for a request.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id: Uuid,
    #[serde(rename = "requestId")]
    pub request_id: Uuid,
    #[serde(rename = "agentId")]
    pub agent_id: Uuid,
    #[serde(rename = "agentRegion")]
    pub agent_region: String,
    pub status: String,
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at: DateTime<Utc>,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(rename = "errorText")]
    pub error_text: String,
    #[serde(rename = "outboxId")]
    pub outbox_id: Uuid,
}

impl AssignmentRow {
    /// New assignment in its initial state.
    pub fn new(request_id: Uuid, agent_id: Uuid, agent_region: &str, outbox_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            agent_id,
            agent_region: agent_region.to_string(),
            status: "PENDING".to_string(),
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_text: String::new(),
            outbox_id,
        }
    }
}

/// A registered probe agent.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgentRow {
    pub id: Uuid,
    pub region: String,
    pub asn: i64,
    pub online: bool,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Outbox staging row awaiting publication.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxMessageRow {
    pub id: Uuid,
    pub topic: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxMessageRow {
    /// New unsent outbox message.
    pub fn new(topic: String, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            payload,
            created_at: Utc::now(),
            sent: false,
            sent_at: None,
        }
    }
}

/// Inbox deduplication row keyed by the producer's task id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InboxMessageRow {
    pub id: Uuid,
    pub topic: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A single probe's terminal result.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckResultRow {
    pub id: Uuid,
    pub assignment_id: Uuid,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// Aggregated result view joined across assignments and check results,
/// as returned by the query and streaming endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckResultViewRow {
    #[serde(rename = "requestId")]
    pub request_id: Uuid,
    #[serde(rename = "agentId")]
    pub agent_id: Uuid,
    #[serde(rename = "agentRegion")]
    pub agent_region: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "finishedAt")]
    pub finished_at: DateTime<Utc>,
    #[serde(with = "bytes_as_json")]
    pub payload: Vec<u8>,
}

/// Serialize raw bytes holding UTF-8 JSON text as a JSON string.
mod bytes_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(de)?.into_bytes())
    }
}

/// Serialize stored result payload bytes as the JSON value they contain.
mod bytes_as_json {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        let value: Value = serde_json::from_slice(bytes).unwrap_or(Value::Null);
        value.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let value = Value::deserialize(de)?;
        serde_json::to_vec(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_request_row_json_names() {
        let row = RequestRow {
            id: Uuid::nil(),
            target: "example.com".to_string(),
            timeout_seconds: 20,
            broadcast: false,
            client_ip: "203.0.113.57".to_string(),
            user_agent: "probe-test".to_string(),
            client_asn: 12345,
            client_cc: "FI".to_string(),
            client_region: "EU".to_string(),
            status: "PENDING".to_string(),
            checks_types: vec!["http".to_string()],
            request_json: b"{\"id\":1}".to_vec(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["timeoutSeconds"], json!(20));
        assert_eq!(value["clientIP"], json!("203.0.113.57"));
        assert_eq!(value["clientASN"], json!(12345));
        assert_eq!(value["checkTypes"], json!(["http"]));
        assert_eq!(value["requestJSON"], json!("{\"id\":1}"));
    }

    #[test]
    fn test_result_view_payload_embeds_json() {
        let row = CheckResultViewRow {
            request_id: Uuid::nil(),
            agent_id: Uuid::nil(),
            agent_region: "EU".to_string(),
            kind: "http".to_string(),
            status: "DONE".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            payload: serde_json::to_vec(&json!({"ok": true, "status": 200})).unwrap(),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["payload"]["status"], json!(200));
        assert_eq!(value["type"], json!("http"));
        assert_eq!(value["agentRegion"], json!("EU"));
    }

    #[test]
    fn test_result_view_tolerates_bad_payload_bytes() {
        let row = CheckResultViewRow {
            request_id: Uuid::nil(),
            agent_id: Uuid::nil(),
            agent_region: "EU".to_string(),
            kind: "tcp".to_string(),
            status: "FAILED".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            payload: b"\xff\xfe not json".to_vec(),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["payload"], Value::Null);
    }

    #[test]
    fn test_assignment_row_initial_state() {
        let request_id = Uuid::new_v4();
        let agent_id = Uuid::new_v4();
        let outbox_id = Uuid::new_v4();
        let row = AssignmentRow::new(request_id, agent_id, "APAC", outbox_id);

        assert_eq!(row.request_id, request_id);
        assert_eq!(row.agent_id, agent_id);
        assert_eq!(row.agent_region, "APAC");
        assert_eq!(row.status, "PENDING");
        assert_eq!(row.outbox_id, outbox_id);
        assert!(row.started_at.is_none());
    }

    #[test]
    fn test_outbox_row_starts_unsent() {
        let row = OutboxMessageRow::new("hosts-check-EU".to_string(), vec![1, 2, 3]);
        assert!(!row.sent);
        assert!(row.sent_at.is_none());
        assert_eq!(row.topic, "hosts-check-EU");
    }
}
