//! HTTP probe

use super::ProbeOutcome;
use probe_core::HttpParams;
use serde_json::json;
use std::time::{Duration, Instant};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// GET the target and judge the final status code against the expected
/// range.
pub async fn run(target: &str, params: &HttpParams) -> ProbeOutcome {
    let scheme = non_empty(&params.scheme, "https");
    let path = non_empty(&params.path, "/");
    let url = format!("{scheme}://{target}{path}");

    let redirects = if params.follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let client = match reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .redirect(redirects)
        .build()
    {
        Ok(client) => client,
        Err(err) => return ProbeOutcome::failure(err, Some(json!({"url": url}))),
    };

    let mut request = client.get(&url);
    for (name, value) in &params.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let started = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => return ProbeOutcome::failure(err, Some(json!({"url": url}))),
    };
    let latency_ms = started.elapsed().as_millis() as i64;

    let status = response.status().as_u16() as i64;
    let final_url = response.url().to_string();
    let ok = status >= params.expected_status_range[0] && status <= params.expected_status_range[1];

    let payload = json!({
        "url": url,
        "status": status,
        "latencyMs": latency_ms,
        "finalURL": final_url,
        "limitBytes": params.max_body_bytes,
    });

    ProbeOutcome {
        ok,
        error: None,
        payload: Some(payload),
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_fallbacks() {
        assert_eq!(non_empty("", "https"), "https");
        assert_eq!(non_empty("  ", "/"), "/");
        assert_eq!(non_empty("http", "https"), "http");
    }

    #[tokio::test]
    async fn test_unresolvable_host_fails_with_url_payload() {
        let params = HttpParams {
            scheme: "http".to_string(),
            path: "/".to_string(),
            expected_status_range: [200, 299],
            ..Default::default()
        };

        let outcome = run("host.invalid", &params).await;

        assert!(!outcome.ok);
        assert!(outcome.error.is_some());
        let payload = outcome.payload.unwrap();
        assert_eq!(payload["url"], "http://host.invalid/");
    }
}
