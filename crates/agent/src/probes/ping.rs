//! ICMP ping probe
//!
//! Shells out to the platform ping tool so the kernel's ICMP path is
//! exercised without raw-socket privileges.

use super::{combined_output, command_line, decode_console, tail, ProbeOutcome};
use probe_core::PingParams;
use serde_json::json;

const OUTPUT_TAIL: usize = 4096;

/// Run the platform ping tool; success is exit code zero.
pub async fn run(target: &str, params: &PingParams) -> ProbeOutcome {
    let (program, args) = build_args(target, params);
    let command = command_line(program, &args);

    let (exit_code, raw) = match combined_output(program, &args).await {
        Ok(result) => result,
        Err(err) => {
            return ProbeOutcome::failure(
                err,
                Some(json!({"command": command, "output": "", "exitCode": -1})),
            )
        }
    };

    let output = decode_console(&raw);
    let payload = json!({
        "command": command,
        "output": tail(&output, OUTPUT_TAIL),
        "exitCode": exit_code,
    });

    if exit_code == 0 {
        ProbeOutcome::success(payload)
    } else {
        ProbeOutcome::failure(format!("exit status {exit_code}"), Some(payload))
    }
}

/// Platform command line: `ping -n count` on Windows, `-c count -i
/// interval` elsewhere.
pub(crate) fn build_args(target: &str, params: &PingParams) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        (
            "ping",
            vec!["-n".to_string(), params.count.to_string(), target.to_string()],
        )
    } else {
        let interval = format!("{:.3}", params.interval_ms as f64 / 1000.0);
        (
            "ping",
            vec![
                "-c".to_string(),
                params.count.to_string(),
                "-i".to_string(),
                interval,
                target.to_string(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_unix_args() {
        let params = PingParams {
            count: 4,
            interval_ms: 1000,
        };
        let (program, args) = build_args("example.com", &params);

        assert_eq!(program, "ping");
        assert_eq!(args, vec!["-c", "4", "-i", "1.000", "example.com"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_subsecond_interval_formatting() {
        let params = PingParams {
            count: 2,
            interval_ms: 250,
        };
        let (_, args) = build_args("example.com", &params);
        assert_eq!(args[3], "0.250");
    }

    #[test]
    #[cfg(windows)]
    fn test_windows_args() {
        let params = PingParams {
            count: 4,
            interval_ms: 1000,
        };
        let (program, args) = build_args("example.com", &params);

        assert_eq!(program, "ping");
        assert_eq!(args, vec!["-n", "4", "example.com"]);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_ping_loopback() {
        let params = PingParams {
            count: 1,
            interval_ms: 200,
        };

        let outcome = run("127.0.0.1", &params).await;

        // Sandboxed environments may forbid ICMP; accept either outcome
        // but require the payload contract
        let payload = outcome.payload.unwrap();
        assert!(payload["command"].as_str().unwrap().starts_with("ping"));
        assert!(payload["exitCode"].is_i64());
        assert!(payload["output"].is_string());
    }
}
