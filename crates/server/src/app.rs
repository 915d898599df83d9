//! Application wiring and lifecycle

use crate::api::{router, ApiState};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::inbox::{InboxSubscriber, SubscriberSettings};
use crate::outbox::{OutboxPublisher, PublisherSettings};
use probe_bus::{ConsumerGroupRunner, Producer};
use probe_db::{AgentRepo, DbPool, InboxRepo, OutboxRepo, RequestRepo};
use probe_geo::GeoDb;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Bring up every component and run until a shutdown signal.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let db = DbPool::connect(&cfg.database).await?;
    info!("database initialized");

    let asn_path = (!cfg.geo.asn_db_path.is_empty()).then(|| Path::new(cfg.geo.asn_db_path.as_str()));
    let geo = Arc::new(GeoDb::open(&cfg.geo.country_db_path, asn_path)?);
    info!("geo databases opened");

    let requests = RequestRepo::new(db.clone());
    let outbox_repo = OutboxRepo::new(db.clone());
    let inbox_repo = InboxRepo::new(db.clone());
    let agents = AgentRepo::new(db.clone());

    let producer = Producer::new(&cfg.kafka.brokers)?;
    let consumer = ConsumerGroupRunner::new(
        &cfg.kafka.brokers,
        &cfg.kafka.subscriber.group_id,
        &[cfg.kafka.subscriber.topic.as_str()],
    )?;
    info!(brokers = ?cfg.kafka.brokers, "bus clients initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&geo),
        requests.clone(),
        outbox_repo.clone(),
        agents,
    ));

    let publisher = OutboxPublisher::new(
        PublisherSettings::from(&cfg.kafka.producer),
        producer,
        outbox_repo,
    );
    let publisher_task = tokio::spawn(publisher.run(shutdown_rx.clone()));

    let subscriber = InboxSubscriber::new(
        SubscriberSettings {
            worker_count: cfg.kafka.subscriber.worker_count,
            topic: cfg.kafka.subscriber.topic.clone(),
        },
        inbox_repo,
        requests.clone(),
    );
    let subscriber_task = tokio::spawn(subscriber.run(consumer, shutdown_rx.clone()));

    let state = ApiState {
        dispatcher,
        requests,
        shutdown: shutdown_rx.clone(),
    };

    let addr: SocketAddr = format!("{}:{}", cfg.http_server.host, cfg.http_server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "probe server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
    .await?;

    // Shutdown failures are collected so one teardown error cannot mask
    // another; the pools drain their in-flight work first.
    let mut failures = Vec::new();
    if let Err(err) = publisher_task.await {
        failures.push(format!("outbox publisher: {err}"));
    }
    if let Err(err) = subscriber_task.await {
        failures.push(format!("inbox subscriber: {err}"));
    }

    db.close().await;
    info!("database closed");
    drop(geo);
    info!("geo databases closed");

    if failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("shutdown errors: {}", failures.join(", "))
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.changed().await;
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
