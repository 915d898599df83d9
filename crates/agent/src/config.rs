//! Agent configuration

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

/// Default config location when neither the CLI argument nor CONFIG_PATH
/// is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/agent.yaml";

/// Top-level agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub app: AppConfig,
    pub subscriber: SubscriberConfig,
    pub publisher: PublisherConfig,
}

/// Agent identity.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub agent_id: Uuid,
    pub region: String,
}

/// Task topic consumption settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberConfig {
    pub brokers: Vec<String>,
    pub group_id: String,
    pub topic: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Result topic publication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    pub brokers: Vec<String>,
    pub topic: String,
}

fn default_buffer_size() -> usize {
    1000
}

impl AgentConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AgentConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Resolve the config path: CLI argument, then CONFIG_PATH, then default.
pub fn config_path(arg: Option<String>) -> String {
    arg.or_else(|| std::env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}
