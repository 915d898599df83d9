//! Server configuration

use anyhow::Context;
use probe_db::DbConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default config location when neither the CLI argument nor CONFIG_PATH
/// is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/server.yaml";

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http_server: HttpServerConfig,
    pub database: DbConfig,
    pub kafka: KafkaConfig,
    pub geo: GeoConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

/// Kafka connectivity plus the outbox/inbox pool sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default)]
    pub producer: ProducerConfig,
    pub subscriber: SubscriberConfig,
}

/// Outbox publisher pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl ProducerConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

/// Inbox subscriber settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    pub topic: String,
    pub group_id: String,
}

/// Offline geo database locations. The ASN path may stay empty.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    pub country_db_path: String,
    #[serde(default)]
    pub asn_db_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_worker_count() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    100
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Resolve the config path: CLI argument, then CONFIG_PATH, then default.
pub fn config_path(arg: Option<String>) -> String {
    arg.or_else(|| std::env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}
