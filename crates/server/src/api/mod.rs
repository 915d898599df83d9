//! HTTP API surface

pub mod handlers;
pub mod stream;

use crate::dispatch::Dispatcher;
use axum::routing::{get, post};
use axum::Router;
use probe_db::RequestRepo;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub requests: RequestRepo,
    pub shutdown: watch::Receiver<bool>,
}

/// Build the check API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/check/task", post(handlers::create_check))
        .route("/check/:request_id", get(handlers::get_results))
        .route("/check/ws/check/:request_id", get(stream::stream_results))
        .with_state(state)
        .layer(CorsLayer::permissive())
}
