//! AlphaForge App Server - HTTP surface for the AlphaForge tools.
//!
//! This crate provides:
//! - The tool set that drives the LEAN CLI (`cloud_backtest`, `push_project`, ...)
//! - The cloud backtest pipeline (validate, publish, submit, extract)
//! - Read-only resources (`cloud_projects`, `risk_parameters`)
//! - Authentication strategies (open, API key, JWT) behind the registry's authorizer
//! - An axum router mounting one route per registered tool and resource
//!
//! Configuration is read once at startup into `ServerConfig` and passed to
//! every collaborator; nothing reads the environment after that.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lean;
pub mod locks;
pub mod middleware;
pub mod pipeline;
pub mod resources;
pub mod state;
pub mod tools;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Name reported by the root endpoint.
pub const SERVER_NAME: &str = "AlphaForge MCP Server";

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config.listen_addr.parse()?;
    let grace = Duration::from_secs(config.shutdown_timeout);
    let state = Arc::new(AppState::new(config)?);
    info!(
        tools = state.tools.len(),
        resources = state.resources.len(),
        "Starting {} on {}",
        SERVER_NAME,
        addr
    );

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, grace, shutdown).await
}

/// Serve on a bound listener until `shutdown` resolves.
///
/// In-flight requests get `grace` to finish after the signal; whatever is
/// still running then is dropped, which also kills its child processes.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    grace: Duration,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    };

    let server = axum::serve(listener, create_router_with_state(state))
        .with_graceful_shutdown(shutdown)
        .into_future();
    let deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => result?,
        () = deadline => {
            warn!(grace_secs = grace.as_secs(), "Shutdown grace period expired, dropping in-flight requests");
        }
    }

    info!("Server shut down");
    Ok(())
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    api::routes(&state)
        .fallback(api::not_found)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
