//! HTTP transport (Cold Path)
//!
//! `/` turns each request into a queued item; `/api/stats` and `/health`
//! expose the pipeline's state. Runs under a [`TransportHandle`] so the
//! shutdown coordinator can stop it before the workers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::core::{BoundedQueue, Item};
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::metrics::PipelineMetrics;
use crate::pipeline::intake::{IntakeAdapter, Rejected};
use crate::pipeline::limiter::AdmissionLimiter;
use crate::pipeline::shutdown::{ShutdownStatus, TransportHandle};
use crate::{PipelineError, Result};

const WELCOME: &str = "Welcome to my website!";

/// Pipeline counters plus live queue and worker state
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub state: &'static str,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub workers_running: usize,
    pub workers_limit: usize,
    pub last_seq: u64,
    pub requests: u64,
    pub accepted: u64,
    pub rejected_full: u64,
    pub rejected_shutdown: u64,
    pub processed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub panicked: u64,
    pub accept_rate: f64,
    pub uptime_seconds: u64,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<IntakeAdapter>,
    pub queue: Arc<BoundedQueue<Item>>,
    pub metrics: Arc<PipelineMetrics>,
    pub status: ShutdownStatus,
    pub limiter: AdmissionLimiter,
}

/// Build the router over shared state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(submit_default).post(submit_body))
        .route("/api/stats", get(get_stats))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the listener for `config`
pub async fn bind(config: &ApiConfig) -> Result<TcpListener> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PipelineError::Transport(format!("failed to bind {}: {}", addr, e)))?;
    Ok(listener)
}

/// Serve `state` on `listener` until the handle is stopped
///
/// In-flight requests finish before the task resolves.
pub fn spawn_transport(listener: TcpListener, state: AppState) -> TransportHandle {
    TransportHandle::spawn("http", move |stop| async move {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("API Server listening on {}", addr);
        }
        axum::serve(listener, router(state))
            .with_graceful_shutdown(stop.cancelled_owned())
            .await
            .map_err(PipelineError::Io)
    })
}

/// Handler for GET /
async fn submit_default(State(state): State<AppState>) -> Response {
    respond(state.intake.submit())
}

/// Handler for POST /
/// A non-empty body becomes the item's message
async fn submit_body(State(state): State<AppState>, body: String) -> Response {
    if body.is_empty() {
        respond(state.intake.submit())
    } else {
        respond(state.intake.submit_message(body))
    }
}

fn respond(outcome: std::result::Result<u64, Rejected>) -> Response {
    match outcome {
        Ok(_) => (StatusCode::OK, WELCOME).into_response(),
        Err(Rejected::QueueFull { .. }) => {
            (StatusCode::SERVICE_UNAVAILABLE, "Queue full, try again later").into_response()
        }
        Err(Rejected::ShuttingDown) => {
            (StatusCode::SERVICE_UNAVAILABLE, "Shutting down").into_response()
        }
    }
}

/// Handler for /api/stats
async fn get_stats(State(state): State<AppState>) -> Json<StatsDto> {
    let snapshot = state.metrics.snapshot();

    Json(StatsDto {
        state: state.status.get().as_str(),
        queue_len: state.queue.len(),
        queue_capacity: state.queue.capacity(),
        workers_running: state.limiter.in_use(),
        workers_limit: state.limiter.limit(),
        last_seq: state.intake.last_seq(),
        requests: snapshot.requests,
        accepted: snapshot.accepted,
        rejected_full: snapshot.rejected_full,
        rejected_shutdown: snapshot.rejected_shutdown,
        processed: snapshot.processed,
        failed: snapshot.failed,
        timed_out: snapshot.timed_out,
        panicked: snapshot.panicked,
        accept_rate: snapshot.accept_rate,
        uptime_seconds: snapshot.uptime_seconds,
    })
}

/// Handler for /health
async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.status.is_running() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, state.status.get().as_str())
    }
}
