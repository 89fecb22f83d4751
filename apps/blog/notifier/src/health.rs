//! Health, readiness and metrics endpoints
//!
//! - `GET /health`, `/healthz`: liveness, always OK while the process serves
//! - `GET /ready`, `/readyz`: pings PostgreSQL
//! - `GET /queue/info`: buffered tasks and dead letters
//! - `GET /metrics`: Prometheus text format

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use domain_notifications::DispatchTask;
use queue_worker::{DeadLetterQueue, JobProducer, render_metrics};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct HealthState {
    pub db: DatabaseConnection,
    pub app_name: String,
    pub app_version: String,
    pub queue: JobProducer<DispatchTask>,
    pub dead_letters: DeadLetterQueue<DispatchTask>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: String,
    pub version: String,
}

async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: state.app_name,
        version: state.app_version,
    })
}

async fn ready_handler(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "checks": { "postgres": "ok" } })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": { "postgres": format!("error: {}", e) } })),
        ),
    }
}

async fn queue_info_handler(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({
        "queue": state.queue.queue_name(),
        "depth": state.queue.depth(),
        "dead_letters": state.dead_letters.len().await,
    }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_metrics(),
    )
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/queue/info", get(queue_info_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub async fn serve_health(state: HealthState, port: u16) -> eyre::Result<()> {
    use eyre::WrapErr;

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port, "Health server listening");

    axum::serve(listener, health_router(state))
        .await
        .wrap_err("Health server failed")
}
