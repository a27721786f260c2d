//! AlphaForge tool definitions.
//!
//! Every tool is described once here and registered at startup. Handlers
//! return their own JSON contract; input problems come back as a
//! `Validation Error` payload without any external call.

mod backtest;
mod params;
mod project;
mod strategy;

pub use backtest::{BacktestStrategy, CloudBacktest, StrategyBacktest};
pub use project::{BacktestStatus, CreateProject, ProjectStatus, PushProject};
pub use strategy::{FnStrategyParser, StrategyParseError, StrategyParser, UnconfiguredParser};

use std::sync::Arc;

use alphaforge_mcp_server::{
    ParamKind, ParamSpec, RegistryResult, ToolDescriptor, ToolFailure, ToolRegistry,
};
use serde::Serialize;
use serde_json::Value;

use crate::lean::LeanClient;
use crate::locks::ProjectLocks;
use crate::pipeline::{BacktestPipeline, SymbolValidator};

pub const CLOUD_BACKTEST: &str = "cloud_backtest";
pub const PUSH_PROJECT: &str = "push_project";
pub const CREATE_PROJECT: &str = "create_project";
pub const PROJECT_STATUS: &str = "project_status";
pub const BACKTEST_STATUS: &str = "backtest_status";
pub const BACKTEST_STRATEGY: &str = "backtest_strategy";

/// Collaborators shared by the tool handlers.
#[derive(Clone)]
pub struct ToolContext {
    pub lean: LeanClient,
    pub validator: Arc<SymbolValidator>,
    pub locks: Arc<ProjectLocks>,
    pub parser: Arc<dyn StrategyParser>,
    pub default_algorithm: String,
}

impl ToolContext {
    pub fn pipeline(&self) -> BacktestPipeline {
        BacktestPipeline::new(
            self.lean.clone(),
            self.validator.clone(),
            self.locks.clone(),
        )
    }
}

/// Descriptors of every AlphaForge tool.
pub fn descriptors(ctx: &ToolContext) -> Vec<ToolDescriptor> {
    let project_name = || ParamSpec::string().required();

    vec![
        ToolDescriptor::new(
            CLOUD_BACKTEST,
            "Run a backtest on QuantConnect Cloud after pushing project changes",
        )
        .param("project_name", project_name())
        .param("strategy_parameters", ParamSpec::object())
        .param("backtest_name", ParamSpec::string())
        .requires_auth(true)
        .handler(Arc::new(CloudBacktest::new(Arc::new(ctx.pipeline())))),
        ToolDescriptor::new(
            PUSH_PROJECT,
            "Sync local project changes with QuantConnect Cloud",
        )
        .param("project_name", project_name())
        .requires_auth(true)
        .handler(Arc::new(PushProject::new(ctx.lean.clone(), ctx.locks.clone()))),
        ToolDescriptor::new(CREATE_PROJECT, "Create a new QuantConnect project")
            .param("project_name", project_name())
            .param("language", ParamSpec::string())
            .requires_auth(true)
            .handler(Arc::new(CreateProject::new(ctx.lean.clone()))),
        ToolDescriptor::new(PROJECT_STATUS, "Get the current status of a cloud project")
            .param("project_name", project_name())
            .handler(Arc::new(ProjectStatus::new(ctx.lean.clone()))),
        ToolDescriptor::new(BACKTEST_STATUS, "Check the status of a cloud backtest")
            .param("project_name", project_name())
            .param("backtest_id", ParamSpec::new(ParamKind::String).required())
            .handler(Arc::new(BacktestStatus::new(ctx.lean.clone()))),
        ToolDescriptor::new(
            BACKTEST_STRATEGY,
            "Run a local LEAN backtest from a natural language strategy description",
        )
        .param("strategy_description", ParamSpec::string().required())
        .requires_auth(true)
        .handler(Arc::new(BacktestStrategy::new(
            ctx.lean.clone(),
            ctx.parser.clone(),
            ctx.validator.clone(),
            ctx.default_algorithm.clone(),
        ))),
    ]
}

/// Register every AlphaForge tool.
pub fn register_all(registry: &mut ToolRegistry, ctx: &ToolContext) -> RegistryResult<()> {
    for descriptor in descriptors(ctx) {
        registry.register(descriptor)?;
    }
    Ok(())
}

/// Serialize a tool body's result, or its caller-visible failure.
fn reply<T: Serialize>(result: Result<T, ToolFailure>) -> anyhow::Result<Value> {
    match result {
        Ok(value) => Ok(serde_json::to_value(value)?),
        Err(failure) => Ok(failure.to_value()),
    }
}
