//! Result streaming socket
//!
//! Pushes the aggregated result list for one request as deltas: a full
//! snapshot first, then an update whenever the content fingerprint
//! changes, and a final done frame once every result is terminal.

use super::ApiState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use probe_core::status::is_terminal_status;
use probe_db::CheckResultViewRow;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const READ_DEADLINE: Duration = Duration::from_secs(60);

type WsSender = SplitSink<WebSocket, Message>;

/// Outgoing stream frame.
#[derive(Debug, Serialize)]
struct WsFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a [CheckResultViewRow]>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    err: Option<String>,
}

impl<'a> WsFrame<'a> {
    fn snapshot(data: &'a [CheckResultViewRow]) -> Self {
        Self { kind: "snapshot", data: Some(data), err: None }
    }

    fn update(data: &'a [CheckResultViewRow]) -> Self {
        Self { kind: "update", data: Some(data), err: None }
    }

    fn done(data: Option<&'a [CheckResultViewRow]>) -> Self {
        Self { kind: "done", data, err: None }
    }

    fn error(message: impl ToString) -> Self {
        Self { kind: "error", data: None, err: Some(message.to_string()) }
    }
}

/// GET /check/ws/check/{request_id}
pub async fn stream_results(
    ws: WebSocketUpgrade,
    Path(request_id): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    ws.on_upgrade(move |socket| run_stream(socket, state, request_id))
}

async fn run_stream(socket: WebSocket, state: ApiState, raw_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let request_id = match Uuid::parse_str(&raw_id) {
        Ok(id) => id,
        Err(_) => {
            let _ = send(&mut sender, &WsFrame::error("invalid request_id")).await;
            return;
        }
    };

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut shutdown = state.shutdown.clone();
    let mut last_hash: Option<String> = None;
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = send(&mut sender, &WsFrame::done(None)).await;
                return;
            }
            incoming = receiver.next() => {
                match incoming {
                    // Pongs and client frames only refresh the deadline
                    Some(Ok(_)) => last_activity = Instant::now(),
                    Some(Err(_)) | None => return,
                }
            }
            _ = ticker.tick() => {
                if last_activity.elapsed() > READ_DEADLINE {
                    warn!(request_id = %request_id, "stream client unresponsive, closing");
                    return;
                }

                if tick(&mut sender, &state, request_id, &mut last_hash).await.is_break() {
                    return;
                }
            }
        }
    }
}

async fn tick(
    sender: &mut WsSender,
    state: &ApiState,
    request_id: Uuid,
    last_hash: &mut Option<String>,
) -> std::ops::ControlFlow<()> {
    use std::ops::ControlFlow::{Break, Continue};

    let results = match state.requests.select_results(request_id).await {
        Ok(results) => results,
        Err(err) => {
            // Keep polling; the client sees the error in-band
            return match send(sender, &WsFrame::error(err)).await {
                Ok(()) => Continue(()),
                Err(_) => Break(()),
            };
        }
    };

    let hash = fingerprint(&results);
    match last_hash.as_deref() {
        None => {
            if send(sender, &WsFrame::snapshot(&results)).await.is_err() {
                return Break(());
            }
            *last_hash = Some(hash);
        }
        Some(previous) if previous != hash => {
            if send(sender, &WsFrame::update(&results)).await.is_err() {
                return Break(());
            }
            *last_hash = Some(hash);
        }
        _ => {}
    }

    if all_terminal(&results) {
        let _ = send(sender, &WsFrame::done(Some(&results))).await;
        return Break(());
    }

    if sender.send(Message::Ping(b"ping".to_vec())).await.is_err() {
        return Break(());
    }

    Continue(())
}

async fn send(sender: &mut WsSender, frame: &WsFrame<'_>) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_else(|_| "{\"type\":\"error\"}".to_string());
    sender.send(Message::Text(text)).await
}

/// Stable content hash of a result list.
fn fingerprint(results: &[CheckResultViewRow]) -> String {
    let raw = serde_json::to_vec(results).unwrap_or_default();
    hex::encode(Sha256::digest(&raw))
}

/// Whether the stream can finish: at least one result, all terminal.
fn all_terminal(results: &[CheckResultViewRow]) -> bool {
    !results.is_empty() && results.iter().all(|r| is_terminal_status(&r.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(status: &str) -> CheckResultViewRow {
        CheckResultViewRow {
            request_id: Uuid::nil(),
            agent_id: Uuid::nil(),
            agent_region: "EU".to_string(),
            kind: "http".to_string(),
            status: status.to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            payload: b"{}".to_vec(),
        }
    }

    #[test]
    fn test_all_terminal_requires_nonempty_list() {
        assert!(!all_terminal(&[]));
    }

    #[test]
    fn test_all_terminal_statuses() {
        assert!(all_terminal(&[row("DONE"), row("FAILED")]));
        assert!(all_terminal(&[row("SUCCESS"), row("TIMEOUT"), row("CANCELLED")]));
        assert!(!all_terminal(&[row("DONE"), row("PENDING")]));
        assert!(!all_terminal(&[row("RUNNING")]));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let one = vec![row("DONE")];
        let two = vec![row("DONE"), row("FAILED")];

        assert_eq!(fingerprint(&one), fingerprint(&one));
        assert_ne!(fingerprint(&one), fingerprint(&two));
    }

    #[test]
    fn test_frame_shapes() {
        let results = vec![row("DONE")];

        let snapshot = serde_json::to_value(WsFrame::snapshot(&results)).unwrap();
        assert_eq!(snapshot["type"], "snapshot");
        assert!(snapshot["data"].is_array());
        assert!(snapshot.get("error").is_none());

        let done = serde_json::to_value(WsFrame::done(None)).unwrap();
        assert_eq!(done["type"], "done");
        assert!(done.get("data").is_none());

        let error = serde_json::to_value(WsFrame::error("invalid request_id")).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["error"], "invalid request_id");
    }
}
