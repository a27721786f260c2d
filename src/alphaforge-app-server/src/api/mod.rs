//! REST API routes and handlers.
//!
//! Every registered tool and resource gets its own route, built once from the
//! registries when the router is created. Each route owns a copy of its name,
//! so a handler always serves the entry it was mounted for.

mod health;
mod resources;
mod tools;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Uri},
    routing::{get, post},
};

use crate::error::AppError;
use crate::state::AppState;

pub use types::{HealthResponse, ServerInfo};

/// Create the API routes for the tools and resources registered in `state`.
pub fn routes(state: &AppState) -> Router<Arc<AppState>> {
    let mut router = Router::new()
        // Liveness and introspection
        .route("/", get(health::server_info))
        .route("/health", get(health::health_check))
        // Tools
        .route("/tools", get(tools::list_tools))
        .route("/tools/{name}", post(tools::unknown_tool))
        // Resources
        .route("/resources", get(resources::list_resources))
        .route("/resources/{name}", get(resources::unknown_resource));

    for name in state.tools.names() {
        let tool = name.to_string();
        router = router.route(
            &format!("/tools/{name}"),
            post(
                move |State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes| {
                    let tool = tool.clone();
                    async move { tools::invoke_tool(state, &tool, headers, body).await }
                },
            ),
        );
        tracing::debug!(tool = %name, "Mounted tool route");
    }

    for name in state.resources.names() {
        let resource = name.to_string();
        router = router.route(
            &format!("/resources/{name}"),
            get(move |State(state): State<Arc<AppState>>| {
                let resource = resource.clone();
                async move { resources::fetch_resource(state, &resource).await }
            }),
        );
        tracing::debug!(resource = %name, "Mounted resource route");
    }

    router
}

/// Fallback for paths with no route.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
