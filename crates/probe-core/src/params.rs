//! Probe parameter types and normalization
//!
//! Parameters arrive from clients in loosely typed JSON: numbers may be
//! strings, ranges may be `"[a,b]"` strings, headers may be a JSON-encoded
//! object. The agent only ever sees the normalized shape produced here.

use crate::error::{Error, Result};
use crate::envelope::CheckSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Parameters for the HTTP probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpParams {
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(rename = "expectedStatusRange", default)]
    pub expected_status_range: [i64; 2],
    #[serde(rename = "followRedirects", default)]
    pub follow_redirects: bool,
    #[serde(rename = "maxBodyBytes", default)]
    pub max_body_bytes: i64,
}

/// Parameters for the ping probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingParams {
    #[serde(default)]
    pub count: i64,
    #[serde(rename = "intervalMs", default)]
    pub interval_ms: i64,
}

/// Parameters for the TCP connect probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TcpParams {
    #[serde(default)]
    pub port: i64,
    #[serde(rename = "connectTimeoutMs", default)]
    pub connect_timeout_ms: i64,
}

/// Parameters for the traceroute probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TracerouteParams {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub port: i64,
    #[serde(rename = "maxHops", default)]
    pub max_hops: i64,
    #[serde(default)]
    pub paris: bool,
}

/// Parameters for the DNS probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsParams {
    #[serde(default)]
    pub records: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resolver: String,
}

/// Normalize a check's raw parameter map into the canonical shape for its
/// kind, applying defaults. Unknown kinds return
/// [`Error::UnsupportedCheck`] and leave the parameters untouched.
pub fn normalize_check(check: &mut CheckSpec) -> Result<()> {
    match check.kind.to_lowercase().as_str() {
        "http" => normalize_http(&mut check.params),
        "ping" => normalize_ping(&mut check.params),
        "tcp" => normalize_tcp(&mut check.params),
        "traceroute" => normalize_traceroute(&mut check.params),
        "dns" => normalize_dns(&mut check.params),
        _ => Err(Error::UnsupportedCheck(check.kind.clone())),
    }
}

fn normalize_http(params: &mut Map<String, Value>) -> Result<()> {
    // expectedStatusRange: "[a,b]" string or [a,b] array, default [200,299]
    let range = match params.get("expectedStatusRange").cloned() {
        Some(Value::String(s)) => parse_range(&s)
            .map_err(|e| Error::validation(format!("expectedStatusRange: {e}")))?,
        Some(Value::Array(items)) => {
            if items.len() != 2 {
                return Err(Error::validation(
                    "expectedStatusRange must have 2 elements",
                ));
            }
            [to_i64(&items[0]), to_i64(&items[1])]
        }
        _ => [200, 299],
    };
    params.insert("expectedStatusRange".to_string(), range_value(range));

    // headers: "" drops the key; a JSON-object string is parsed
    let raw_headers = params
        .get("headers")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string());
    if let Some(trimmed) = raw_headers {
        if trimmed.starts_with('{') {
            match serde_json::from_str::<HashMap<String, String>>(&trimmed) {
                Ok(map) => {
                    params.insert(
                        "headers".to_string(),
                        serde_json::to_value(map).unwrap_or(Value::Null),
                    );
                }
                Err(_) => {
                    params.remove("headers");
                }
            }
        } else {
            params.remove("headers");
        }
    }

    coerce_ints(params, &["maxBodyBytes"]);

    let mut p: HttpParams = decode_loose(params)?;
    if p.scheme.is_empty() {
        p.scheme = "https".to_string();
    }
    if p.path.is_empty() {
        p.path = "/".to_string();
    }
    if p.expected_status_range == [0, 0] {
        p.expected_status_range = [200, 299];
    }
    *params = to_map(&p)?;
    Ok(())
}

fn normalize_ping(params: &mut Map<String, Value>) -> Result<()> {
    coerce_ints(params, &["count", "intervalMs"]);

    let mut p: PingParams = decode_loose(params)?;
    if p.count <= 0 {
        p.count = 4;
    }
    if p.interval_ms <= 0 {
        p.interval_ms = 1000;
    }
    *params = to_map(&p)?;
    Ok(())
}

fn normalize_tcp(params: &mut Map<String, Value>) -> Result<()> {
    coerce_ints(params, &["port", "connectTimeoutMs"]);

    let mut p: TcpParams = decode_loose(params)?;
    if p.connect_timeout_ms <= 0 {
        p.connect_timeout_ms = 3000;
    }
    *params = to_map(&p)?;
    Ok(())
}

fn normalize_traceroute(params: &mut Map<String, Value>) -> Result<()> {
    coerce_ints(params, &["port", "maxHops"]);

    let mut p: TracerouteParams = decode_loose(params)?;
    if p.max_hops <= 0 {
        p.max_hops = 30;
    }
    if p.mode.is_empty() {
        p.mode = "udp".to_string();
    }
    *params = to_map(&p)?;
    Ok(())
}

fn normalize_dns(params: &mut Map<String, Value>) -> Result<()> {
    // records may arrive as a JSON-encoded array string
    let raw_records = params
        .get("records")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(s) = raw_records {
        if let Ok(records) = serde_json::from_str::<Vec<String>>(&s) {
            params.insert(
                "records".to_string(),
                serde_json::to_value(records).unwrap_or(Value::Null),
            );
        }
    }

    let mut p: DnsParams = decode_loose(params)?;
    if p.records.is_empty() {
        p.records = vec!["A".to_string()];
    }
    *params = to_map(&p)?;
    Ok(())
}

fn decode_loose<T: serde::de::DeserializeOwned>(params: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone())).map_err(Error::from)
}

fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Parse a `"[a,b]"` style range into two integers.
fn parse_range(s: &str) -> std::result::Result<[i64; 2], String> {
    let inner = s
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let parts: Vec<&str> = inner.split(',').collect();
    if parts.len() != 2 {
        return Err("range must be like [a,b]".to_string());
    }
    let a = parts[0]
        .trim()
        .parse::<i64>()
        .map_err(|e| e.to_string())?;
    let b = parts[1]
        .trim()
        .parse::<i64>()
        .map_err(|e| e.to_string())?;
    Ok([a, b])
}

fn range_value(range: [i64; 2]) -> Value {
    Value::Array(vec![Value::from(range[0]), Value::from(range[1])])
}

/// Best-effort integer conversion for loose JSON values.
fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

/// Rewrite numeric fields that arrived as strings into JSON numbers.
fn coerce_ints(params: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        let parsed = params
            .get(*key)
            .and_then(Value::as_str)
            .and_then(|s| s.trim().parse::<i64>().ok());
        if let Some(n) = parsed {
            params.insert((*key).to_string(), Value::from(n));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(kind: &str, params: Value) -> CheckSpec {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        CheckSpec {
            kind: kind.to_string(),
            params,
        }
    }

    #[test]
    fn test_http_range_string_form() {
        let mut c = check("http", json!({"expectedStatusRange": "[200,299]"}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["expectedStatusRange"], json!([200, 299]));
    }

    #[test]
    fn test_http_range_array_form() {
        let mut c = check("http", json!({"expectedStatusRange": [301, "302"]}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["expectedStatusRange"], json!([301, 302]));
    }

    #[test]
    fn test_http_range_absent_defaults() {
        let mut c = check("http", json!({}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["expectedStatusRange"], json!([200, 299]));
        assert_eq!(c.params["scheme"], json!("https"));
        assert_eq!(c.params["path"], json!("/"));
    }

    #[test]
    fn test_http_range_wrong_arity() {
        let mut c = check("http", json!({"expectedStatusRange": [200]}));
        assert!(normalize_check(&mut c).is_err());
    }

    #[test]
    fn test_http_headers_json_string() {
        let mut c = check(
            "http",
            json!({"headers": "{\"X-Probe\":\"1\"}"}),
        );
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["headers"]["X-Probe"], json!("1"));
    }

    #[test]
    fn test_http_headers_empty_string_dropped() {
        let mut c = check("http", json!({"headers": "  "}));
        normalize_check(&mut c).unwrap();
        assert!(c.params.get("headers").is_none());
    }

    #[test]
    fn test_http_headers_garbage_string_dropped() {
        let mut c = check("http", json!({"headers": "not-a-map"}));
        normalize_check(&mut c).unwrap();
        assert!(c.params.get("headers").is_none());
    }

    #[test]
    fn test_ping_defaults() {
        let mut c = check("ping", json!({"count": 0}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["count"], json!(4));
        assert_eq!(c.params["intervalMs"], json!(1000));
    }

    #[test]
    fn test_ping_numeric_strings() {
        let mut c = check("ping", json!({"count": "3", "intervalMs": "500"}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["count"], json!(3));
        assert_eq!(c.params["intervalMs"], json!(500));
    }

    #[test]
    fn test_tcp_defaults() {
        let mut c = check("tcp", json!({"port": 443}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["port"], json!(443));
        assert_eq!(c.params["connectTimeoutMs"], json!(3000));
    }

    #[test]
    fn test_traceroute_defaults() {
        let mut c = check("traceroute", json!({}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["maxHops"], json!(30));
        assert_eq!(c.params["mode"], json!("udp"));
    }

    #[test]
    fn test_traceroute_keeps_explicit_mode() {
        let mut c = check("traceroute", json!({"mode": "tcp", "port": "443", "maxHops": 12}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["mode"], json!("tcp"));
        assert_eq!(c.params["port"], json!(443));
        assert_eq!(c.params["maxHops"], json!(12));
    }

    #[test]
    fn test_dns_records_string_form() {
        let mut c = check("dns", json!({"records": "[\"A\",\"MX\"]"}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["records"], json!(["A", "MX"]));
    }

    #[test]
    fn test_dns_records_default() {
        let mut c = check("dns", json!({}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["records"], json!(["A"]));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut c = check("smtp", json!({}));
        let err = normalize_check(&mut c).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCheck(_)));
    }

    #[test]
    fn test_kind_matching_is_case_insensitive() {
        let mut c = check("HTTP", json!({}));
        normalize_check(&mut c).unwrap();
        assert_eq!(c.params["scheme"], json!("https"));
    }

    #[test]
    fn test_parse_range_rejects_junk() {
        assert!(parse_range("[200]").is_err());
        assert!(parse_range("[a,b]").is_err());
        assert_eq!(parse_range(" [ 200 , 299 ] ").unwrap(), [200, 299]);
    }
}
