//! Probe server entry point

use probe_server::config::{self, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = config::config_path(std::env::args().nth(1));
    info!(path = %path, "loading configuration");
    let cfg = Config::load(&path)?;

    info!("probe server {} starting", probe_server::VERSION);
    probe_server::app::run(cfg).await
}
