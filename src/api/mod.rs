//! HTTP API for the web front end
//!
//! JSON endpoints mirroring the controller operations. Mutating routes answer
//! `{"success": bool}` with 200 on success and 500 on failure.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::controller::{StatusSnapshot, TieController};

/// Shared state for API handlers
pub struct ApiState {
    pub controller: TieController,
}

/// Body of every mutating route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn outcome(success: bool) -> (StatusCode, Json<SuccessResponse>) {
    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(SuccessResponse { success }))
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .route("/toggle_auto_key", post(toggle_auto_key))
        .route("/toggle_tie", post(toggle_tie))
        .route("/smart_tie_toggle", post(smart_tie_toggle))
        .route("/toggle_auto_tie", post(toggle_auto_tie))
        .route("/set_dsk", post(set_dsk))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Html(include_str!("../../static/index.html"))
}

/// GET /status - Current controller snapshot
async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusSnapshot> {
    Json(state.controller.status().await)
}

/// GET /logs - Operator log lines, oldest first
async fn logs(State(state): State<Arc<ApiState>>) -> Json<Vec<String>> {
    Json(state.controller.log().lines())
}

async fn toggle_auto_key(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    outcome(state.controller.toggle_auto_key().await)
}

async fn toggle_tie(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    outcome(state.controller.toggle_tie().await)
}

/// POST /smart_tie_toggle - Always reports success; failures land in the log
async fn smart_tie_toggle(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.controller.toggle_smart_tie().await;
    outcome(true)
}

async fn toggle_auto_tie(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    outcome(state.controller.toggle_auto_tie().await)
}

async fn set_dsk(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    outcome(state.controller.set_dsk_configuration().await)
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Serve the API on `addr` until `shutdown` resolves
pub async fn start_server(
    state: Arc<ApiState>,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind web server on {}", addr))?;

    info!("Web UI available at http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Web server error")?;

    Ok(())
}
