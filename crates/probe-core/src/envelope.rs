//! Task and result wire envelopes
//!
//! JSON shapes exchanged over the bus. Field names are part of the wire
//! contract and must not change.

use crate::error::{Error, Result};
use crate::params::normalize_check;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Topic prefix for task dispatch; the agent region is appended.
pub const BASE_CHECK_TOPIC: &str = "hosts-check";

/// Error label carried by results whose deadline expired before or during
/// the probe. The inbox maps this label to the TIMEOUT status.
pub const DEADLINE_EXCEEDED_ERROR: &str = "context deadline exceeded";

/// Dispatch topic for a region, e.g. `hosts-check-EU`.
pub fn check_topic(region: &str) -> String {
    format!("{BASE_CHECK_TOPIC}-{region}")
}

/// Incoming API request body describing a set of probes against one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub target: String,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub broadcast: bool,
    pub checks: Vec<CheckSpec>,
}

/// One probe with its kind-specific parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Client geography forwarded to the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoContext {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub continent: String,
}

/// Information about the client that initiated the check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientContext {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub asn: i64,
    #[serde(default)]
    pub geo: GeoContext,
    #[serde(rename = "userAgent", default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Task message published to an agent topic.
///
/// Metadata is a sorted mapping so repeated serialization of the same task
/// yields identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub target: String,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: i64,
    #[serde(rename = "clientContext")]
    pub client_context: ClientContext,
    pub checks: Vec<CheckSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Terminal result of one probe, published back by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "taskId")]
    pub task_id: Uuid,
    #[serde(rename = "checkIndex")]
    pub check_index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "durationMs")]
    pub duration_ms: i64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ResultEnvelope {
    /// Whether the error label marks a deadline-expired probe.
    pub fn is_deadline_exceeded(&self) -> bool {
        self.error.as_deref() == Some(DEADLINE_EXCEEDED_ERROR)
    }
}

/// Decode a task envelope from bus payload bytes and normalize every
/// check's parameters to its kind-specific shape.
///
/// An unknown check kind does not fail the task: the check is left as-is
/// and the executor emits a synthetic failure envelope for it, so every
/// check still produces exactly one result.
pub fn parse_task(data: &[u8]) -> Result<TaskEnvelope> {
    let mut task: TaskEnvelope =
        serde_json::from_slice(data).map_err(|e| Error::validation(format!("bad task json: {e}")))?;
    for (i, check) in task.checks.iter_mut().enumerate() {
        match normalize_check(check) {
            Ok(()) | Err(Error::UnsupportedCheck(_)) => {}
            Err(e) => return Err(Error::check_params(i, check.kind.clone(), e.to_string())),
        }
    }
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_topic() {
        assert_eq!(check_topic("EU"), "hosts-check-EU");
        assert_eq!(check_topic("APAC"), "hosts-check-APAC");
    }

    #[test]
    fn test_envelope_field_names() {
        let envelope = TaskEnvelope {
            id: Uuid::nil(),
            target: "example.com".to_string(),
            timeout_seconds: 20,
            client_context: ClientContext {
                ip: "203.0.113.57".to_string(),
                asn: 12345,
                geo: GeoContext {
                    region: "EU".to_string(),
                    continent: "EU".to_string(),
                },
                user_agent: "probe-test/1.0".to_string(),
            },
            checks: vec![],
            metadata: BTreeMap::from([("origin".to_string(), "api".to_string())]),
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["timeoutSeconds"], json!(20));
        assert_eq!(value["clientContext"]["userAgent"], json!("probe-test/1.0"));
        assert_eq!(value["clientContext"]["geo"]["region"], json!("EU"));
        assert_eq!(value["metadata"]["origin"], json!("api"));
    }

    #[test]
    fn test_envelope_serialization_is_stable() {
        let mut metadata = BTreeMap::new();
        metadata.insert("region".to_string(), "EU".to_string());
        metadata.insert("origin".to_string(), "api".to_string());
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            target: "example.com".to_string(),
            timeout_seconds: 20,
            client_context: ClientContext::default(),
            checks: vec![],
            metadata,
        };

        let first = serde_json::to_vec(&envelope).unwrap();
        let second = serde_json::to_vec(&envelope).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_result_envelope_field_names() {
        let res = ResultEnvelope {
            task_id: Uuid::nil(),
            check_index: 2,
            kind: "http".to_string(),
            target: "example.com".to_string(),
            started_at: Utc::now(),
            duration_ms: 42,
            ok: true,
            error: None,
            payload: Some(json!({"status": 200})),
        };

        let value = serde_json::to_value(&res).unwrap();
        assert_eq!(value["checkIndex"], json!(2));
        assert_eq!(value["durationMs"], json!(42));
        assert_eq!(value["type"], json!("http"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_deadline_label() {
        let mut res = ResultEnvelope {
            task_id: Uuid::nil(),
            check_index: 0,
            kind: "tcp".to_string(),
            target: "example.com".to_string(),
            started_at: Utc::now(),
            duration_ms: 0,
            ok: false,
            error: Some(DEADLINE_EXCEEDED_ERROR.to_string()),
            payload: None,
        };
        assert!(res.is_deadline_exceeded());

        res.error = Some("connection refused".to_string());
        assert!(!res.is_deadline_exceeded());
    }

    #[test]
    fn test_parse_task_normalizes_checks() {
        let data = json!({
            "id": Uuid::new_v4(),
            "target": "example.com",
            "timeoutSeconds": 20,
            "clientContext": {"ip": "203.0.113.57"},
            "checks": [
                {"type": "http", "params": {"expectedStatusRange": "[200,299]"}}
            ]
        });

        let task = parse_task(&serde_json::to_vec(&data).unwrap()).unwrap();
        assert_eq!(task.checks.len(), 1);
        assert_eq!(
            task.checks[0].params["expectedStatusRange"],
            json!([200, 299])
        );
    }

    #[test]
    fn test_parse_task_rejects_bad_json() {
        assert!(parse_task(b"not json").is_err());
    }

    #[test]
    fn test_parse_task_keeps_unknown_kind() {
        let data = json!({
            "id": Uuid::new_v4(),
            "target": "example.com",
            "timeoutSeconds": 20,
            "clientContext": {},
            "checks": [{"type": "smtp", "params": {"x": 1}}]
        });

        // The check survives untouched; the executor answers it with a
        // synthetic unsupported-type failure
        let task = parse_task(&serde_json::to_vec(&data).unwrap()).unwrap();
        assert_eq!(task.checks[0].kind, "smtp");
        assert_eq!(task.checks[0].params["x"], json!(1));
    }

    #[test]
    fn test_parse_task_rejects_malformed_params() {
        let data = json!({
            "id": Uuid::new_v4(),
            "target": "example.com",
            "timeoutSeconds": 20,
            "clientContext": {},
            "checks": [{"type": "http", "params": {"expectedStatusRange": [200]}}]
        });

        let err = parse_task(&serde_json::to_vec(&data).unwrap()).unwrap_err();
        assert!(err.to_string().contains("check 0"));
    }
}
