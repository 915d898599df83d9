//! DNS probe

use super::ProbeOutcome;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use probe_core::DnsParams;
use serde_json::{json, Map, Value};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Look up the requested record types. Per-record failures land in the
/// payload as `<TYPE>_error`; the probe is ok only when none occurred.
pub async fn run(target: &str, params: &DnsParams) -> ProbeOutcome {
    let resolver = match build_resolver(&params.resolver) {
        Ok(resolver) => resolver,
        Err(err) => return ProbeOutcome::failure(err, None),
    };

    let mut results = Map::new();
    let mut have_error = false;

    for record in &params.records {
        let record = record.to_uppercase();
        match record.as_str() {
            "A" => match resolver.lookup_ip(target).await {
                Ok(lookup) => {
                    let addrs: Vec<String> = lookup
                        .iter()
                        .filter(IpAddr::is_ipv4)
                        .map(|ip| ip.to_string())
                        .collect();
                    results.insert("A".to_string(), json!(addrs));
                }
                Err(err) => {
                    results.insert("A_error".to_string(), json!(err.to_string()));
                    have_error = true;
                }
            },
            "AAAA" => match resolver.lookup_ip(target).await {
                Ok(lookup) => {
                    let addrs: Vec<String> = lookup
                        .iter()
                        .filter(IpAddr::is_ipv6)
                        .map(|ip| ip.to_string())
                        .collect();
                    results.insert("AAAA".to_string(), json!(addrs));
                }
                Err(err) => {
                    results.insert("AAAA_error".to_string(), json!(err.to_string()));
                    have_error = true;
                }
            },
            "MX" => match resolver.mx_lookup(target).await {
                Ok(lookup) => {
                    let records: Vec<Value> = lookup
                        .iter()
                        .map(|mx| {
                            json!({
                                "host": mx.exchange().to_string(),
                                "pref": mx.preference(),
                            })
                        })
                        .collect();
                    results.insert("MX".to_string(), json!(records));
                }
                Err(err) => {
                    results.insert("MX_error".to_string(), json!(err.to_string()));
                    have_error = true;
                }
            },
            other => {
                results.insert(format!("{other}_error"), json!("unsupported record type"));
                have_error = true;
            }
        }
    }

    ProbeOutcome {
        ok: !have_error,
        error: None,
        payload: Some(Value::Object(results)),
    }
}

/// A resolver over UDP:53 at the given address, or the system resolver
/// when no address is configured.
fn build_resolver(address: &str) -> Result<TokioAsyncResolver, String> {
    let query_opts = || {
        let mut opts = ResolverOpts::default();
        opts.timeout = QUERY_TIMEOUT;
        opts
    };

    let address = address.trim();
    if address.is_empty() {
        return Ok(TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
            TokioAsyncResolver::tokio(ResolverConfig::default(), query_opts())
        }));
    }

    let ip: IpAddr = address
        .parse()
        .map_err(|err| format!("bad resolver address {address:?}: {err}"))?;

    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig::new(SocketAddr::new(ip, 53), Protocol::Udp));
    Ok(TokioAsyncResolver::tokio(config, query_opts()))
}
