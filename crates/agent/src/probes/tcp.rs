//! TCP connect probe

use super::ProbeOutcome;
use probe_core::TcpParams;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Dial the target and report the handshake time. The connection is
/// closed immediately after it succeeds.
pub async fn run(target: &str, params: &TcpParams) -> ProbeOutcome {
    let addr = host_port(target, params.port);
    let connect_timeout = Duration::from_millis(params.connect_timeout_ms.max(1) as u64);

    let started = Instant::now();
    match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => {
            let handshake = started.elapsed().as_millis() as i64;
            drop(stream);
            ProbeOutcome::success(json!({"addr": addr, "handshake": handshake}))
        }
        Ok(Err(err)) => ProbeOutcome::failure(err, Some(json!({"addr": addr}))),
        Err(_) => ProbeOutcome::failure(
            format!("dial tcp {addr}: i/o timeout"),
            Some(json!({"addr": addr})),
        ),
    }
}

/// Join host and port, bracketing bare IPv6 addresses.
fn host_port(host: &str, port: i64) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_port_forms() {
        assert_eq!(host_port("example.com", 443), "example.com:443");
        assert_eq!(host_port("192.0.2.1", 80), "192.0.2.1:80");
        assert_eq!(host_port("2001:db8::1", 443), "[2001:db8::1]:443");
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // TEST-NET-1 address; nothing should be listening
        let params = TcpParams {
            port: 9,
            connect_timeout_ms: 200,
        };

        let outcome = run("192.0.2.1", &params).await;

        assert!(!outcome.ok);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.payload.unwrap()["addr"], "192.0.2.1:9");
    }

    #[tokio::test]
    async fn test_connect_to_local_listener_succeeds() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port() as i64;

        let params = TcpParams {
            port,
            connect_timeout_ms: 3000,
        };

        let outcome = run("127.0.0.1", &params).await;

        assert!(outcome.ok);
        let payload = outcome.payload.unwrap();
        assert_eq!(payload["addr"], format!("127.0.0.1:{port}"));
        assert!(payload["handshake"].as_i64().unwrap() >= 0);
    }
}
