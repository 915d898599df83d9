//! Probe agent entry point

use probe_agent::config::{self, AgentConfig};
use probe_agent::Executor;
use probe_bus::{ConsumerGroupRunner, Producer};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = config::config_path(std::env::args().nth(1));
    info!(path = %path, "loading configuration");
    let cfg = AgentConfig::load(&path)?;

    info!(
        agent_id = %cfg.app.agent_id,
        region = %cfg.app.region,
        topic = %cfg.subscriber.topic,
        "probe agent {} starting",
        probe_agent::VERSION
    );

    let consumer = ConsumerGroupRunner::new(
        &cfg.subscriber.brokers,
        &cfg.subscriber.group_id,
        &[cfg.subscriber.topic.as_str()],
    )?;
    let producer = Producer::new(&cfg.publisher.brokers)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let executor = Arc::new(Executor::new(producer, cfg.publisher.topic.clone()));
    executor
        .run(consumer, cfg.subscriber.buffer_size, shutdown_rx)
        .await;

    info!("probe agent stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
