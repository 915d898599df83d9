//! Check request handlers

use super::ApiState;
use crate::dispatch::DispatchError;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use probe_core::TaskRequest;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use tracing::error;
use uuid::Uuid;

pub(crate) const STATUS_SUCCESS: &str = "success";
pub(crate) const STATUS_ERR: &str = "error";

/// Success envelope wrapping response data.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: STATUS_SUCCESS,
            data,
        }
    }
}

/// Error envelope with a human-readable message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn error(message: impl ToString) -> Self {
        Self {
            status: STATUS_ERR,
            message: message.to_string(),
        }
    }
}

/// POST /check/task
///
/// Accepts a task, resolves the client region from the connecting IP, and
/// returns the persisted request.
pub async fn create_check(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<TaskRequest>,
) -> Response {
    let ip = client_ip(&headers, Some(peer));
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match state.dispatcher.dispatch(body, ip, user_agent).await {
        Ok(request) => (StatusCode::CREATED, Json(DataResponse::new(request))).into_response(),
        Err(err @ DispatchError::Validation(_)) => {
            (StatusCode::BAD_REQUEST, Json(MessageResponse::error(err))).into_response()
        }
        Err(err) => {
            error!(error = %err, "dispatch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::error(err)),
            )
                .into_response()
        }
    }
}

/// GET /check/{request_id}
///
/// Returns the current result list for a request. An unknown id yields an
/// empty list, indistinguishable from "no results yet".
pub async fn get_results(
    State(state): State<ApiState>,
    Path(request_id): Path<String>,
) -> Response {
    let request_id = match Uuid::parse_str(&request_id) {
        Ok(id) => id,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, Json(MessageResponse::error(err))).into_response()
        }
    };

    match state.dispatcher.results(request_id).await {
        Ok(results) => (StatusCode::OK, Json(DataResponse::new(results))).into_response(),
        Err(err) => {
            error!(error = %err, request_id = %request_id, "result query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::error(err)),
            )
                .into_response()
        }
    }
}

/// Resolve the originating client IP, preferring proxy headers over the
/// peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = real_ip.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }

    peer.map(|p| p.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.57, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));

        let ip = client_ip(&headers, Some(addr("192.0.2.1:4444")));
        assert_eq!(ip.unwrap().to_string(), "203.0.113.57");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));

        let ip = client_ip(&headers, Some(addr("192.0.2.1:4444")));
        assert_eq!(ip.unwrap().to_string(), "198.51.100.4");
    }

    #[test]
    fn test_client_ip_uses_peer_when_headers_absent() {
        let headers = HeaderMap::new();
        let ip = client_ip(&headers, Some(addr("192.0.2.1:4444")));
        assert_eq!(ip.unwrap().to_string(), "192.0.2.1");
    }

    #[test]
    fn test_client_ip_ignores_garbage_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));

        let ip = client_ip(&headers, None);
        assert!(ip.is_none());
    }

    #[test]
    fn test_response_envelopes() {
        let ok = serde_json::to_value(DataResponse::new(vec![1, 2])).unwrap();
        assert_eq!(ok["status"], "success");
        assert_eq!(ok["data"], serde_json::json!([1, 2]));

        let err = serde_json::to_value(MessageResponse::error("boom")).unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["message"], "boom");
    }
}
