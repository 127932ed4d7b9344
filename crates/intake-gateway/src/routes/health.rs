//! Liveness and metrics endpoints.

use super::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "intake-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Counter snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}
