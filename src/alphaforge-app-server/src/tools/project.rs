//! Single-call project tools.

use std::sync::Arc;

use alphaforge_exec::CommandResult;
use alphaforge_mcp_server::{Params, ToolFailure, ToolHandler, context};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::params::{optional_str, required_arg};
use super::reply;
use crate::lean::{LeanClient, ProjectLanguage};
use crate::locks::ProjectLocks;

/// `cloud push <project>`.
pub struct PushProject {
    lean: LeanClient,
    locks: Arc<ProjectLocks>,
}

impl PushProject {
    pub fn new(lean: LeanClient, locks: Arc<ProjectLocks>) -> Self {
        Self { lean, locks }
    }

    async fn run(&self, params: &Params) -> Result<CommandResult, ToolFailure> {
        let project = required_arg(params, "project_name")?;
        let _guard = self.locks.lock(project).await;
        info!(project = %project, "Pushing project");
        Ok(self.lean.push(project).await)
    }
}

#[async_trait]
impl ToolHandler for PushProject {
    async fn call(&self, params: Params) -> Result<Value> {
        reply(self.run(&params).await)
    }
}

/// `project-create <name> --language <lang>`.
pub struct CreateProject {
    lean: LeanClient,
}

impl CreateProject {
    pub fn new(lean: LeanClient) -> Self {
        Self { lean }
    }

    async fn run(&self, params: &Params) -> Result<CommandResult, ToolFailure> {
        let name = required_arg(params, "project_name")?;
        let language = match optional_str(params, "language")? {
            Some(raw) => raw
                .parse::<ProjectLanguage>()
                .map_err(|e| ToolFailure::new(context::VALIDATION, e))?,
            None => ProjectLanguage::default(),
        };
        info!(project = %name, language = %language, "Creating project");
        Ok(self.lean.create_project(name, language).await)
    }
}

#[async_trait]
impl ToolHandler for CreateProject {
    async fn call(&self, params: Params) -> Result<Value> {
        reply(self.run(&params).await)
    }
}

/// `cloud status <project>`.
pub struct ProjectStatus {
    lean: LeanClient,
}

impl ProjectStatus {
    pub fn new(lean: LeanClient) -> Self {
        Self { lean }
    }
}

#[async_trait]
impl ToolHandler for ProjectStatus {
    async fn call(&self, params: Params) -> Result<Value> {
        let result = match required_arg(&params, "project_name") {
            Ok(project) => Ok(self.lean.project_status(project).await),
            Err(failure) => Err(failure),
        };
        reply(result)
    }
}

/// `cloud status <project> --backtest-id <id>`.
pub struct BacktestStatus {
    lean: LeanClient,
}

impl BacktestStatus {
    pub fn new(lean: LeanClient) -> Self {
        Self { lean }
    }

    async fn run(&self, params: &Params) -> Result<CommandResult, ToolFailure> {
        let project = required_arg(params, "project_name")?;
        let backtest_id = required_arg(params, "backtest_id")?;
        Ok(self.lean.backtest_status(project, backtest_id).await)
    }
}

#[async_trait]
impl ToolHandler for BacktestStatus {
    async fn call(&self, params: Params) -> Result<Value> {
        reply(self.run(&params).await)
    }
}
