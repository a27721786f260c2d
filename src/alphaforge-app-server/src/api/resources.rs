//! Resource listing and fetch endpoints.

use std::sync::Arc;

use alphaforge_mcp_server::ResourceDefinition;
use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;

use crate::error::AppResult;
use crate::state::AppState;

/// List available resources.
pub async fn list_resources(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ResourceDefinition>> {
    Json(state.resources.definitions())
}

/// Fetch a resource. Unavailable data is still a 200 with a failure payload.
pub async fn fetch_resource(state: Arc<AppState>, name: &str) -> AppResult<Json<Value>> {
    let data = state.resources.fetch(name).await?;
    Ok(Json(data.into_value()))
}

/// Fallback for names with no mounted route.
pub async fn unknown_resource(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    fetch_resource(state, &name).await
}
