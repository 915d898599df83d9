//! Per-task check executor
//!
//! Every consumed task fans out one concurrent worker per check. Each
//! worker is bounded by a per-kind deadline clipped to the task's overall
//! deadline, and always publishes exactly one result envelope, including
//! a synthetic failure when the deadline fired before the probe ran.

use crate::geocache::GeoCache;
use crate::probes::{self, ProbeOutcome};
use chrono::{DateTime, Utc};
use probe_bus::{BusMessage, ConsumerGroupRunner, Producer};
use probe_core::{
    parse_task, CheckSpec, DnsParams, HttpParams, PingParams, ResultEnvelope, TaskEnvelope,
    TcpParams, TracerouteParams, DEADLINE_EXCEEDED_ERROR,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

const WORKER_COUNT: usize = 5;
const DEFAULT_TIMEOUT_SECONDS: i64 = 20;
const GEO_CACHE_TTL: Duration = Duration::from_secs(3600);
const GEO_RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Task consumer and check runner.
pub struct Executor {
    producer: Producer,
    produce_topic: String,
    geo: Arc<GeoCache>,
}

impl Executor {
    /// Create a new executor publishing results to the given topic.
    pub fn new(producer: Producer, produce_topic: String) -> Self {
        Self {
            producer,
            produce_topic,
            geo: Arc::new(GeoCache::new(GEO_CACHE_TTL, GEO_RESOLVE_TIMEOUT)),
        }
    }

    /// Consume tasks until shutdown.
    pub async fn run(
        self: Arc<Self>,
        runner: ConsumerGroupRunner,
        buffer_size: usize,
        shutdown: watch::Receiver<bool>,
    ) {
        let (tx, rx) = mpsc::channel::<BusMessage>(buffer_size.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let consumer = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                if let Err(err) = runner.run(tx, shutdown).await {
                    error!(error = %err, "task consumer failed");
                }
            }
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..WORKER_COUNT {
            let rx = Arc::clone(&rx);
            let executor = Arc::clone(&self);
            workers.spawn(async move { executor.worker(worker_id, rx).await });
        }

        while workers.join_next().await.is_some() {}
        let _ = consumer.await;
        info!("executor stopped");
    }

    async fn worker(&self, worker_id: usize, rx: Arc<Mutex<mpsc::Receiver<BusMessage>>>) {
        info!(worker_id, "worker started");

        loop {
            let message = { rx.lock().await.recv().await };
            let Some(message) = message else {
                info!(worker_id, "worker stopping");
                return;
            };

            let task_id = match Uuid::from_slice(&message.key) {
                Ok(id) => id,
                Err(err) => {
                    warn!(worker_id, error = %err, "unparseable message key, skipping");
                    message.mark();
                    continue;
                }
            };

            match parse_task(&message.payload) {
                Ok(task) => {
                    self.run_check(task).await;
                }
                Err(err) => {
                    error!(worker_id, task_id = %task_id, error = %err, "unparseable task, skipping");
                }
            }

            message.mark();
        }
    }

    /// Run every check of one task concurrently and publish each result.
    pub async fn run_check(&self, task: TaskEnvelope) {
        let timeout_seconds = if task.timeout_seconds <= 0 {
            DEFAULT_TIMEOUT_SECONDS
        } else {
            task.timeout_seconds
        };
        let deadline = Instant::now() + Duration::from_secs(timeout_seconds as u64);

        let mut jobs = JoinSet::new();
        for (index, check) in task.checks.iter().enumerate() {
            let check = check.clone();
            let target = task.target.clone();
            let task_id = task.id;
            let producer = self.producer.clone();
            let topic = self.produce_topic.clone();
            let geo = Arc::clone(&self.geo);

            jobs.spawn(async move {
                let result = run_single(task_id, index, &check, &target, deadline, &geo).await;
                publish(&producer, &topic, &result).await;
            });
        }

        while jobs.join_next().await.is_some() {}
    }
}

async fn run_single(
    task_id: Uuid,
    index: usize,
    check: &CheckSpec,
    target: &str,
    deadline: Instant,
    geo: &GeoCache,
) -> ResultEnvelope {
    let started_at = Utc::now();
    let now = Instant::now();

    // Deadline already gone: report without running the probe
    if now >= deadline {
        return make_result(
            task_id,
            index,
            &check.kind,
            target,
            started_at,
            ProbeOutcome::failure(DEADLINE_EXCEEDED_ERROR, None),
        );
    }

    let per_check = per_check_timeout(&check.kind).min(deadline - now);
    let outcome = match tokio::time::timeout(per_check, run_probe(check, target, geo)).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::failure(DEADLINE_EXCEEDED_ERROR, None),
    };

    make_result(task_id, index, &check.kind, target, started_at, outcome)
}

async fn run_probe(check: &CheckSpec, target: &str, geo: &GeoCache) -> ProbeOutcome {
    match check.kind.to_lowercase().as_str() {
        "http" => probes::http::run(target, &decode::<HttpParams>(&check.params)).await,
        "ping" => probes::ping::run(target, &decode::<PingParams>(&check.params)).await,
        "tcp" => probes::tcp::run(target, &decode::<TcpParams>(&check.params)).await,
        "traceroute" => {
            probes::traceroute::run(target, &decode::<TracerouteParams>(&check.params), geo).await
        }
        "dns" => probes::dns::run(target, &decode::<DnsParams>(&check.params)).await,
        other => ProbeOutcome::failure(format!("unsupported check type {other:?}"), None),
    }
}

fn decode<T: serde::de::DeserializeOwned + Default>(params: &serde_json::Map<String, Value>) -> T {
    serde_json::from_value(Value::Object(params.clone())).unwrap_or_default()
}

/// Upper bound for one probe, independent of the task deadline.
pub(crate) fn per_check_timeout(kind: &str) -> Duration {
    match kind.to_lowercase().as_str() {
        "http" => Duration::from_secs(5),
        "tcp" => Duration::from_secs(3),
        "ping" => Duration::from_secs(6),
        "dns" => Duration::from_secs(4),
        "traceroute" => Duration::from_secs(16),
        _ => Duration::from_secs(5),
    }
}

fn make_result(
    task_id: Uuid,
    check_index: usize,
    kind: &str,
    target: &str,
    started_at: DateTime<Utc>,
    outcome: ProbeOutcome,
) -> ResultEnvelope {
    ResultEnvelope {
        task_id,
        check_index,
        kind: kind.to_lowercase(),
        target: target.to_string(),
        started_at,
        duration_ms: (Utc::now() - started_at).num_milliseconds(),
        ok: outcome.ok,
        error: outcome.error,
        payload: outcome.payload,
    }
}

async fn publish(producer: &Producer, topic: &str, result: &ResultEnvelope) {
    let payload = match serde_json::to_vec(result) {
        Ok(payload) => payload,
        Err(err) => {
            error!(task_id = %result.task_id, error = %err, "failed to serialize result");
            return;
        }
    };

    match producer.push(result.task_id.as_bytes(), &payload, topic).await {
        Ok((partition, offset)) => {
            info!(task_id = %result.task_id, check_index = result.check_index, partition, offset, "result published");
        }
        Err(err) => {
            error!(task_id = %result.task_id, error = %err, "failed to publish result");
        }
    }
}
