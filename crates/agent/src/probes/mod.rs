//! Probe runners
//!
//! Each runner measures one aspect of the target and reports a
//! [`ProbeOutcome`]; the executor wraps outcomes into result envelopes.

pub mod dns;
pub mod http;
pub mod ping;
pub mod tcp;
pub mod traceroute;

use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;

/// Raw outcome of one probe run.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub error: Option<String>,
    pub payload: Option<Value>,
}

impl ProbeOutcome {
    /// Successful probe with its payload.
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            error: None,
            payload: Some(payload),
        }
    }

    /// Failed probe with a message and best-effort payload.
    pub fn failure(error: impl ToString, payload: Option<Value>) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
            payload,
        }
    }
}

/// Run a platform tool and capture exit code plus combined stdout/stderr.
///
/// The child is killed if the surrounding probe future is dropped by a
/// deadline.
pub(crate) async fn combined_output(
    program: &str,
    args: &[String],
) -> std::io::Result<(i32, Vec<u8>)> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    let mut bytes = output.stdout;
    bytes.extend_from_slice(&output.stderr);
    Ok((output.status.code().unwrap_or(-1), bytes))
}

/// Printable command line for result payloads.
pub(crate) fn command_line(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Last `max` bytes of a string, respecting char boundaries.
pub(crate) fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Decode console output. Windows tools emit legacy codepages.
#[cfg(windows)]
pub(crate) fn decode_console(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::IBM866.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    let (text, _, _) = encoding_rs::WINDOWS_1251.decode(bytes);
    text.into_owned()
}

/// Decode console output. Unix tools emit UTF-8.
#[cfg(not(windows))]
pub(crate) fn decode_console(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
