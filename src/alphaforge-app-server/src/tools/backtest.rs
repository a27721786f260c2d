//! Backtest tools.

use std::sync::Arc;

use alphaforge_exec::CommandResult;
use alphaforge_mcp_server::{OutcomeStatus, Params, ToolFailure, ToolHandler, context};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::params::{cli_argument, required_str};
use super::reply;
use super::strategy::StrategyParser;
use crate::lean::LeanClient;
use crate::pipeline::{BacktestPipeline, BacktestRequest, SymbolValidator};

/// Push then submit a cloud backtest.
pub struct CloudBacktest {
    pipeline: Arc<BacktestPipeline>,
}

impl CloudBacktest {
    pub fn new(pipeline: Arc<BacktestPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ToolHandler for CloudBacktest {
    async fn call(&self, params: Params) -> Result<Value> {
        let request = match BacktestRequest::from_params(params) {
            Ok(request) => request,
            Err(failure) => return Ok(failure.to_value()),
        };
        Ok(self.pipeline.run(&request).await.into_value())
    }
}

/// Reply of `backtest_strategy`.
#[derive(Debug, Serialize)]
pub struct StrategyBacktest {
    pub status: OutcomeStatus,
    pub algorithm: String,
    pub details: CommandResult,
}

/// Parse a free-text strategy and run it as a local backtest.
pub struct BacktestStrategy {
    lean: LeanClient,
    parser: Arc<dyn StrategyParser>,
    validator: Arc<SymbolValidator>,
    default_algorithm: String,
}

impl BacktestStrategy {
    pub fn new(
        lean: LeanClient,
        parser: Arc<dyn StrategyParser>,
        validator: Arc<SymbolValidator>,
        default_algorithm: impl Into<String>,
    ) -> Self {
        Self {
            lean,
            parser,
            validator,
            default_algorithm: default_algorithm.into(),
        }
    }

    async fn run(&self, params: &Params) -> Result<StrategyBacktest, ToolFailure> {
        let description = required_str(params, "strategy_description")?;
        let parsed = self
            .parser
            .parse(description)
            .await
            .map_err(|e| ToolFailure::new(context::STRATEGY_PARSE, e.to_string()))?;

        match parsed.get("symbols") {
            None | Some(Value::Null) => {}
            Some(Value::Array(symbols)) => {
                for symbol in symbols {
                    self.check_symbol(symbol)?;
                }
            }
            Some(symbol) => self.check_symbol(symbol)?,
        }

        let algorithm = parsed
            .get("algorithm_path")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.default_algorithm)
            .to_string();
        cli_argument("algorithm_path", &algorithm)?;

        info!(algorithm = %algorithm, "Running local backtest");
        let details = self.lean.backtest(&algorithm).await;
        Ok(StrategyBacktest {
            status: if details.success {
                OutcomeStatus::Success
            } else {
                OutcomeStatus::Error
            },
            algorithm,
            details,
        })
    }

    fn check_symbol(&self, symbol: &Value) -> Result<(), ToolFailure> {
        self.validator
            .validate_value(symbol)
            .map_err(|e| ToolFailure::new(context::VALIDATION, e.to_string()))
    }
}

#[async_trait]
impl ToolHandler for BacktestStrategy {
    async fn call(&self, params: Params) -> Result<Value> {
        reply(self.run(&params).await)
    }
}
