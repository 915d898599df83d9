//! Traceroute probe
//!
//! Shells out to the platform tool, extracts the IPv4 hops from its
//! output, and annotates public hops with coordinates through the hop
//! geo cache.

use super::{combined_output, command_line, decode_console, tail, ProbeOutcome};
use crate::geocache::GeoCache;
use probe_core::TracerouteParams;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

const OUTPUT_TAIL: usize = 8192;

/// One hop on the path, with coordinates when resolvable.
#[derive(Debug, Serialize)]
pub struct Hop {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// Run the platform traceroute tool; success is exit code zero.
pub async fn run(target: &str, params: &TracerouteParams, geo: &GeoCache) -> ProbeOutcome {
    let (program, args) = build_args(target, params);
    let command = command_line(program, &args);

    let (exit_code, raw) = match combined_output(program, &args).await {
        Ok(result) => result,
        Err(err) => {
            return ProbeOutcome::failure(
                err,
                Some(json!({"command": command, "output": "", "exitCode": -1, "hops": []})),
            )
        }
    };

    let output = decode_console(&raw);
    let ips = parse_hop_ips(&output);

    let mut hops = Vec::with_capacity(ips.len());
    for ip in &ips {
        if is_private_or_reserved(ip) {
            // Keep the hop, just without coordinates
            hops.push(Hop {
                ip: ip.to_string(),
                lat: None,
                lon: None,
            });
            continue;
        }

        match geo.resolve(&ip.to_string()).await {
            Ok((lat, lon)) => hops.push(Hop {
                ip: ip.to_string(),
                lat: Some(lat),
                lon: Some(lon),
            }),
            Err(_) => hops.push(Hop {
                ip: ip.to_string(),
                lat: None,
                lon: None,
            }),
        }
    }

    let payload = json!({
        "command": command,
        "output": tail(&output, OUTPUT_TAIL),
        "exitCode": exit_code,
        "hops": hops,
    });

    if exit_code == 0 {
        ProbeOutcome::success(payload)
    } else {
        ProbeOutcome::failure(format!("exit status {exit_code}"), Some(payload))
    }
}

/// Platform command line: `tracert -d -h N -w 1000` on Windows,
/// `traceroute -n -m N` with the mode flags elsewhere.
pub(crate) fn build_args(target: &str, params: &TracerouteParams) -> (&'static str, Vec<String>) {
    let max_hops = if params.max_hops <= 0 { 30 } else { params.max_hops };

    if cfg!(windows) {
        return (
            "tracert",
            vec![
                "-d".to_string(),
                "-h".to_string(),
                max_hops.to_string(),
                "-w".to_string(),
                "1000".to_string(),
                target.to_string(),
            ],
        );
    }

    let mut args = vec!["-n".to_string(), "-m".to_string(), max_hops.to_string()];
    match params.mode.to_lowercase().as_str() {
        "tcp" => {
            args.push("-T".to_string());
            if params.port > 0 {
                args.push("-p".to_string());
                args.push(params.port.to_string());
            }
        }
        "icmp" => args.push("-I".to_string()),
        _ => {}
    }
    args.push(target.to_string());

    ("traceroute", args)
}

fn ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3})\b").expect("static regex"))
}

/// Extract IPv4 hops from tool output, de-duplicating while preserving
/// first-seen order. Lines of bare asterisks are skipped.
pub(crate) fn parse_hop_ips(output: &str) -> Vec<Ipv4Addr> {
    let re = ipv4_regex();
    let mut seen = HashSet::new();
    let mut ips = Vec::new();

    for line in output.lines() {
        if line.matches('*').count() >= 3 && !re.is_match(line) {
            continue;
        }

        for found in re.find_iter(line) {
            let Ok(ip) = found.as_str().parse::<Ipv4Addr>() else {
                continue;
            };
            if seen.insert(ip) {
                ips.push(ip);
            }
        }
    }

    ips
}

/// Addresses that must not be sent to the geo backend.
pub(crate) fn is_private_or_reserved(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 10.0.0.0/8
    if octets[0] == 10 {
        return true;
    }
    // 172.16.0.0/12
    if octets[0] == 172 && octets[1] & 0xf0 == 16 {
        return true;
    }
    // 192.168.0.0/16
    if octets[0] == 192 && octets[1] == 168 {
        return true;
    }
    // Carrier-grade NAT 100.64.0.0/10
    if octets[0] == 100 && octets[1] & 0xc0 == 64 {
        return true;
    }
    // loopback 127.0.0.0/8
    if octets[0] == 127 {
        return true;
    }
    // link-local 169.254.0.0/16
    if octets[0] == 169 && octets[1] == 254 {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = "\
traceroute to example.com (93.184.216.34), 30 hops max, 60 byte packets
 1  192.168.1.1  0.5 ms  0.4 ms  0.4 ms
 2  10.0.0.1  1.2 ms  1.1 ms  1.0 ms
 3  * * *
 4  203.0.113.5  8.9 ms  9.0 ms  9.1 ms
 5  203.0.113.5  9.3 ms  9.2 ms  9.4 ms
 6  93.184.216.34  11.0 ms  10.9 ms  11.2 ms
";

    #[test]
    fn test_parse_hops_dedup_preserving_order() {
        let ips = parse_hop_ips(SAMPLE_OUTPUT);
        let as_strings: Vec<String> = ips.iter().map(|ip| ip.to_string()).collect();

        assert_eq!(
            as_strings,
            vec!["192.168.1.1", "10.0.0.1", "203.0.113.5", "93.184.216.34"]
        );
    }

    #[test]
    fn test_parse_hops_skips_star_lines() {
        let ips = parse_hop_ips(" 3  * * *\n");
        assert!(ips.is_empty());
    }

    #[test]
    fn test_parse_hops_rejects_invalid_octets() {
        let ips = parse_hop_ips(" 1  999.1.2.3  1.0 ms\n");
        assert!(ips.is_empty());
    }

    #[test]
    fn test_private_ranges() {
        for ip in ["10.1.2.3", "172.16.0.9", "172.31.255.1", "192.168.0.1",
                   "100.64.1.1", "100.127.0.1", "127.0.0.1", "169.254.10.10"] {
            assert!(is_private_or_reserved(&ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn test_public_ranges() {
        for ip in ["8.8.8.8", "93.184.216.34", "172.32.0.1", "100.128.0.1", "203.0.113.5"] {
            assert!(!is_private_or_reserved(&ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_unix_args_tcp_mode() {
        let params = TracerouteParams {
            mode: "tcp".to_string(),
            port: 443,
            max_hops: 30,
            paris: false,
        };
        let (program, args) = build_args("example.com", &params);

        assert_eq!(program, "traceroute");
        assert_eq!(args, vec!["-n", "-m", "30", "-T", "-p", "443", "example.com"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_unix_args_icmp_and_default_modes() {
        let icmp = TracerouteParams {
            mode: "icmp".to_string(),
            port: 0,
            max_hops: 12,
            paris: false,
        };
        let (_, args) = build_args("example.com", &icmp);
        assert_eq!(args, vec!["-n", "-m", "12", "-I", "example.com"]);

        let udp = TracerouteParams {
            mode: "udp".to_string(),
            port: 0,
            max_hops: 0,
            paris: false,
        };
        let (_, args) = build_args("example.com", &udp);
        assert_eq!(args, vec!["-n", "-m", "30", "example.com"]);
    }

    #[test]
    #[cfg(windows)]
    fn test_windows_args() {
        let params = TracerouteParams {
            mode: "tcp".to_string(),
            port: 443,
            max_hops: 30,
            paris: false,
        };
        let (program, args) = build_args("example.com", &params);

        assert_eq!(program, "tracert");
        assert_eq!(args, vec!["-d", "-h", "30", "-w", "1000", "example.com"]);
    }

    #[test]
    fn test_hop_serialization_omits_missing_coordinates() {
        let bare = Hop { ip: "10.0.0.1".to_string(), lat: None, lon: None };
        let value = serde_json::to_value(&bare).unwrap();
        assert_eq!(value, serde_json::json!({"ip": "10.0.0.1"}));

        let located = Hop { ip: "8.8.8.8".to_string(), lat: Some(37.4), lon: Some(-122.1) };
        let value = serde_json::to_value(&located).unwrap();
        assert_eq!(value["lat"], 37.4);
        assert_eq!(value["lon"], -122.1);
    }
}
