//! Tool listing and invocation endpoints.

use std::sync::Arc;

use alphaforge_mcp_server::ToolDefinition;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::Value;

use crate::auth::bearer_token;
use crate::error::AppResult;
use crate::state::AppState;

/// List available tools.
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolDefinition>> {
    Json(state.tools.definitions())
}

/// Invoke a registered tool.
///
/// A body that is not a JSON object is treated as an empty parameter map.
pub async fn invoke_tool(
    state: Arc<AppState>,
    name: &str,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let params = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    let result = state
        .tools
        .invoke(name, params, bearer_token(&headers))
        .await?;
    Ok(Json(result))
}

/// Fallback for names with no mounted route.
pub async fn unknown_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    invoke_tool(state, &name, headers, body).await
}
