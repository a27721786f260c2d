//! Application state management.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alphaforge_exec::{CommandBridge, CommandRunner};
use alphaforge_mcp_server::{ResourceRegistry, ToolRegistry};
use tracing::info;

use crate::auth::build_authorizer;
use crate::config::ServerConfig;
use crate::lean::LeanClient;
use crate::locks::ProjectLocks;
use crate::pipeline::SymbolValidator;
use crate::resources;
use crate::tools::{self, StrategyParser, ToolContext, UnconfiguredParser};

/// Application state shared across request handlers.
///
/// Both registries are filled here and never change afterwards.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Registered tools.
    pub tools: ToolRegistry,
    /// Registered resources.
    pub resources: ResourceRegistry,
    /// Start time.
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl AppState {
    /// State backed by the real LEAN CLI and no strategy parser.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let mut bridge = CommandBridge::new(&config.lean.cli_path)
            .with_timeout(config.lean.command_timeout_duration());
        if let Some(dir) = &config.lean.projects_dir {
            bridge = bridge.with_workdir(dir);
        }
        Self::with_components(config, Arc::new(bridge), Arc::new(UnconfiguredParser))
    }

    /// State with an explicit command runner and strategy parser.
    pub fn with_components(
        config: ServerConfig,
        runner: Arc<dyn CommandRunner>,
        parser: Arc<dyn StrategyParser>,
    ) -> anyhow::Result<Self> {
        let ctx = ToolContext {
            lean: LeanClient::new(&config.lean.cli_path, runner),
            validator: Arc::new(SymbolValidator::new(&config.allowed_symbols)),
            locks: Arc::new(ProjectLocks::new()),
            parser,
            default_algorithm: config.default_algorithm.clone(),
        };

        let mut tool_registry = ToolRegistry::new(build_authorizer(&config.auth)?);
        tools::register_all(&mut tool_registry, &ctx)?;

        let mut resource_registry = ResourceRegistry::new();
        resources::register_all(&mut resource_registry, &config)?;

        info!(
            tools = tool_registry.len(),
            resources = resource_registry.len(),
            "Registries initialized"
        );

        Ok(Self {
            config,
            tools: tool_registry,
            resources: resource_registry,
            start_time: Instant::now(),
        })
    }

    /// Get server uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
