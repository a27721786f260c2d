//! Liveness and introspection endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::SERVER_NAME;
use crate::state::AppState;

use super::types::{HealthResponse, ServerInfo};

/// Root endpoint.
pub async fn server_info() -> Json<ServerInfo> {
    Json(ServerInfo {
        name: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: format!("Welcome to {SERVER_NAME}"),
    })
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
    })
}
