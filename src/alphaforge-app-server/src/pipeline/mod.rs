//! Cloud backtest orchestration.
//!
//! A run moves through VALIDATE, PUBLISH, SUBMIT, EXTRACT and RESPOND in
//! that order, short-circuiting to RESPOND on the first failure:
//!
//! - VALIDATE rejects a bad `symbol` before any external call is made.
//! - PUBLISH pushes the project; a failed push ends the run with
//!   `Push failed` and SUBMIT never runs.
//! - SUBMIT requests the cloud backtest; a failed submit ends the run with
//!   `status: error`, no identifier and the full submit result as details.
//! - EXTRACT scans a successful submit's output for the backtest ID. A
//!   missing ID is not an error.

mod extract;
mod validate;

pub use extract::extract_backtest_id;
pub use validate::{SymbolValidator, ValidationError, validate_cli_argument};

use std::fmt;
use std::sync::Arc;

use alphaforge_exec::CommandResult;
use alphaforge_mcp_server::{OutcomeStatus, Params, ToolFailure, context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::lean::LeanClient;
use crate::locks::ProjectLocks;

/// Longest output excerpt quoted in a push failure message.
const PUSH_OUTPUT_EXCERPT: usize = 200;

/// Parameters of one cloud backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    #[serde(alias = "project_identifier", alias = "projectIdentifier", alias = "projectName")]
    pub project_name: String,

    #[serde(default, alias = "strategyParameters")]
    pub strategy_parameters: Map<String, Value>,

    #[serde(default, alias = "backtestName")]
    pub backtest_name: Option<String>,
}

impl BacktestRequest {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            strategy_parameters: Map::new(),
            backtest_name: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.strategy_parameters.insert(name.into(), value);
        self
    }

    pub fn with_backtest_name(mut self, name: impl Into<String>) -> Self {
        self.backtest_name = Some(name.into());
        self
    }

    /// Build a request from tool parameters.
    pub fn from_params(params: Params) -> Result<Self, ToolFailure> {
        let mut request: Self = serde_json::from_value(Value::Object(params)).map_err(|e| {
            ToolFailure::new(context::VALIDATION, format!("Invalid backtest request: {e}"))
        })?;
        request.project_name = request.project().to_string();
        if request.project_name.is_empty() {
            return Err(ToolFailure::new(
                context::VALIDATION,
                "Missing required parameter 'project_name'",
            ));
        }
        Ok(request)
    }

    /// Project name as passed to the CLI and used as the lock key.
    pub fn project(&self) -> &str {
        self.project_name.trim()
    }

    /// Run name, treating an empty string as absent.
    pub fn run_name(&self) -> Option<&str> {
        self.backtest_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Terminal result of a run that reached SUBMIT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub status: OutcomeStatus,
    pub backtest_id: Option<String>,
    /// Result of the submit call.
    pub details: CommandResult,
}

/// Pipeline stage, used in logs and to report where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Publish,
    Submit,
    Extract,
    Respond,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Publish => "publish",
            Self::Submit => "submit",
            Self::Extract => "extract",
            Self::Respond => "respond",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// SUBMIT was reached; status reflects the submit call.
    Completed(BacktestOutcome),
    /// Stopped before SUBMIT.
    Rejected { stage: Stage, failure: ToolFailure },
}

impl PipelineOutcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Completed(outcome) => outcome.status,
            Self::Rejected { .. } => OutcomeStatus::Error,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Completed(outcome) => serde_json::to_value(outcome).unwrap_or(Value::Null),
            Self::Rejected { failure, .. } => failure.to_value(),
        }
    }
}

/// Drives a cloud backtest run through the LEAN CLI.
#[derive(Debug, Clone)]
pub struct BacktestPipeline {
    lean: LeanClient,
    validator: Arc<SymbolValidator>,
    locks: Arc<ProjectLocks>,
}

impl BacktestPipeline {
    pub fn new(lean: LeanClient, validator: Arc<SymbolValidator>, locks: Arc<ProjectLocks>) -> Self {
        Self {
            lean,
            validator,
            locks,
        }
    }

    pub async fn run(&self, request: &BacktestRequest) -> PipelineOutcome {
        let project = request.project();

        debug!(stage = %Stage::Validate, project = %project, "Pipeline stage");
        if let Err(e) = self.validate(request) {
            return PipelineOutcome::Rejected {
                stage: Stage::Validate,
                failure: ToolFailure::new(context::VALIDATION, e.to_string()),
            };
        }
        debug!(parameters = ?request.strategy_parameters, "Strategy parameters accepted");

        // Publish and submit for one project never interleave
        let _guard = self.locks.lock(project).await;

        debug!(stage = %Stage::Publish, project = %project, "Pipeline stage");
        let push = self.lean.push(project).await;
        if !push.success {
            return PipelineOutcome::Rejected {
                stage: Stage::Publish,
                failure: ToolFailure::new(context::PUSH_FAILED, push_failure_message(&push))
                    .with_details(&push),
            };
        }
        info!(project = %project, "Project pushed");

        debug!(stage = %Stage::Submit, project = %project, "Pipeline stage");
        let submit = self.lean.submit_backtest(project, request.run_name()).await;
        if !submit.success {
            warn!(
                project = %project,
                exit_code = submit.exit_code,
                error = %submit.error_output,
                "Backtest submission failed"
            );
            return PipelineOutcome::Completed(BacktestOutcome {
                status: OutcomeStatus::Error,
                backtest_id: None,
                details: submit,
            });
        }

        debug!(stage = %Stage::Extract, project = %project, "Pipeline stage");
        let backtest_id = extract_backtest_id(&submit.output);
        match &backtest_id {
            Some(id) => info!(project = %project, backtest_id = %id, "Backtest submitted"),
            None => warn!(project = %project, "Backtest submitted but no identifier found in output"),
        }

        debug!(stage = %Stage::Respond, project = %project, "Pipeline stage");
        PipelineOutcome::Completed(BacktestOutcome {
            status: OutcomeStatus::Success,
            backtest_id,
            details: submit,
        })
    }

    fn validate(&self, request: &BacktestRequest) -> Result<(), ValidationError> {
        validate_cli_argument("project_name", request.project())?;
        if let Some(name) = request.run_name() {
            validate_cli_argument("backtest_name", name)?;
        }

        match request.strategy_parameters.get("symbol") {
            None | Some(Value::Null) => {
                warn!(project = %request.project(), "No symbol provided in strategy parameters");
                Ok(())
            }
            Some(symbol) => self.validator.validate_value(symbol),
        }
    }
}

fn push_failure_message(push: &CommandResult) -> String {
    let mut message = if push.error_output.trim().is_empty() {
        "Unknown push error".to_string()
    } else {
        push.error_output.trim().to_string()
    };
    if !push.output.is_empty() {
        let excerpt: String = push.output.chars().take(PUSH_OUTPUT_EXCERPT).collect();
        message.push_str(&format!(" | Output: {excerpt}..."));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphaforge_exec::{CommandLine, CommandRunner};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned results and records every command it was asked to run.
    #[derive(Default)]
    struct ScriptedRunner {
        results: Mutex<VecDeque<CommandResult>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn new(results: impl IntoIterator<Item = CommandResult>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into_iter().collect()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn execute(&self, command: &CommandLine) -> CommandResult {
            self.calls
                .lock()
                .unwrap()
                .push(command.argv().map(String::from).collect());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| CommandResult::failed("unscripted call"))
        }
    }

    fn pipeline(runner: Arc<ScriptedRunner>) -> BacktestPipeline {
        BacktestPipeline::new(
            LeanClient::new("lean", runner),
            Arc::new(SymbolValidator::new(["SPY", "QQQ", "BTCUSD"])),
            Arc::new(ProjectLocks::new()),
        )
    }

    fn request(symbol: &str) -> BacktestRequest {
        BacktestRequest::new("Proj A").with_parameter("symbol", json!(symbol))
    }

    fn rejected(outcome: PipelineOutcome) -> (Stage, ToolFailure) {
        match outcome {
            PipelineOutcome::Rejected { stage, failure } => (stage, failure),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    fn completed(outcome: PipelineOutcome) -> BacktestOutcome {
        match outcome {
            PipelineOutcome::Completed(outcome) => outcome,
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disallowed_symbol_makes_no_external_call() {
        let runner = ScriptedRunner::new([]);
        let (stage, failure) = rejected(pipeline(runner.clone()).run(&request("MSFT")).await);

        assert_eq!(stage, Stage::Validate);
        assert_eq!(failure.context, "Validation Error");
        assert!(failure.message.contains("MSFT"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_symbol_makes_no_external_call() {
        let runner = ScriptedRunner::new([]);
        let outcome = pipeline(runner.clone())
            .run(&BacktestRequest::new("Proj A").with_parameter("symbol", json!(["SPY"])))
            .await;

        let (_, failure) = rejected(outcome);
        assert!(failure.message.starts_with("Invalid symbol format"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_skips_submit() {
        let runner = ScriptedRunner::new([CommandResult::from_exit(
            1,
            "Project not found in cloud".into(),
            "Error: push rejected".into(),
        )]);
        let (stage, failure) = rejected(pipeline(runner.clone()).run(&request("SPY")).await);

        assert_eq!(stage, Stage::Publish);
        assert_eq!(failure.context, "Push failed");
        assert_eq!(
            failure.message,
            "Error: push rejected | Output: Project not found in cloud..."
        );
        assert_eq!(failure.details.as_ref().unwrap()["exit_code"], 1);
        assert_eq!(runner.calls(), vec![vec!["cloud", "push", "Proj A"]]);
    }

    #[tokio::test]
    async fn test_push_failure_without_diagnostics() {
        let runner = ScriptedRunner::new([CommandResult::from_exit(2, String::new(), String::new())]);
        let (_, failure) = rejected(pipeline(runner).run(&request("SPY")).await);
        assert_eq!(failure.message, "Unknown push error");
    }

    #[tokio::test]
    async fn test_push_output_excerpt_is_truncated() {
        let runner = ScriptedRunner::new([CommandResult::from_exit(1, "x".repeat(500), "bad".into())]);
        let (_, failure) = rejected(pipeline(runner).run(&request("SPY")).await);
        assert_eq!(
            failure.message,
            format!("bad | Output: {}...", "x".repeat(200))
        );
    }

    #[tokio::test]
    async fn test_successful_submit_extracts_id() {
        let runner = ScriptedRunner::new([
            CommandResult::ok("Pushed"),
            CommandResult::ok("Started backtest with backtestId BT-12345"),
        ]);
        let outcome = completed(pipeline(runner).run(&request("SPY")).await);

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.backtest_id.as_deref(), Some("BT-12345"));
    }

    #[tokio::test]
    async fn test_missing_id_is_still_success() {
        let runner = ScriptedRunner::new([
            CommandResult::ok("Pushed"),
            CommandResult::ok("Backtest queued"),
        ]);
        let outcome = completed(pipeline(runner).run(&request("SPY")).await);

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.backtest_id, None);
    }

    #[tokio::test]
    async fn test_submit_failure_carries_full_result() {
        let failure = CommandResult::from_exit(3, "partial".into(), "quota exceeded".into());
        let runner = ScriptedRunner::new([CommandResult::ok("Pushed"), failure.clone()]);
        let outcome = pipeline(runner).run(&request("SPY")).await;

        assert_eq!(outcome.status(), OutcomeStatus::Error);
        let value = outcome.into_value();
        assert_eq!(value["status"], "error");
        assert!(value["backtest_id"].is_null());
        assert_eq!(value["details"], serde_json::to_value(&failure).unwrap());
    }

    #[tokio::test]
    async fn test_absent_symbol_is_tolerated() {
        let runner = ScriptedRunner::new([
            CommandResult::ok("Pushed"),
            CommandResult::ok("BacktestId: BT-1"),
        ]);
        let outcome = completed(pipeline(runner.clone()).run(&BacktestRequest::new("Proj A")).await);

        assert_eq!(outcome.backtest_id.as_deref(), Some("BT-1"));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let runner = ScriptedRunner::new([
            CommandResult::ok("Successfully pushed 'Proj A'"),
            CommandResult::ok("Started backtest named 'Run1' for project 'Proj A' with backtestId BT-999"),
        ]);
        let params = json!({
            "projectIdentifier": "Proj A",
            "strategyParameters": { "symbol": "SPY" },
            "backtestName": "Run1"
        });
        let Value::Object(params) = params else {
            unreachable!()
        };
        let request = BacktestRequest::from_params(params).unwrap();

        let value = pipeline(runner.clone()).run(&request).await.into_value();

        assert_eq!(value["status"], "success");
        assert_eq!(value["backtest_id"], "BT-999");
        assert_eq!(value["details"]["success"], true);
        assert_eq!(
            runner.calls(),
            vec![
                vec!["cloud", "push", "Proj A"],
                vec!["cloud", "backtest", "Proj A", "--backtest-name", "Run1"],
            ]
        );
    }

    #[tokio::test]
    async fn test_run_waits_for_project_lock() {
        let runner = ScriptedRunner::new([CommandResult::ok(""), CommandResult::ok("")]);
        let locks = Arc::new(ProjectLocks::new());
        let pipeline = BacktestPipeline::new(
            LeanClient::new("lean", runner.clone()),
            Arc::new(SymbolValidator::new(["SPY"])),
            locks.clone(),
        );

        let guard = locks.lock("Proj A").await;
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            pipeline.run(&request("SPY")),
        )
        .await;
        assert!(blocked.is_err());
        assert!(runner.calls().is_empty());

        drop(guard);
        let outcome = completed(pipeline.run(&request("SPY")).await);
        assert_eq!(outcome.status, OutcomeStatus::Success);
    }

    #[tokio::test]
    async fn test_padded_project_name_shares_lock() {
        let runner = ScriptedRunner::new([CommandResult::ok(""), CommandResult::ok("")]);
        let locks = Arc::new(ProjectLocks::new());
        let pipeline = BacktestPipeline::new(
            LeanClient::new("lean", runner.clone()),
            Arc::new(SymbolValidator::new(["SPY"])),
            locks.clone(),
        );
        let padded = BacktestRequest::new(" Proj A ").with_parameter("symbol", json!("SPY"));

        let guard = locks.lock("Proj A").await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), pipeline.run(&padded)).await;
        assert!(blocked.is_err());

        drop(guard);
        completed(pipeline.run(&padded).await);
        assert_eq!(runner.calls()[0], ["cloud", "push", "Proj A"]);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_option_like_arguments_are_rejected() {
        let runner = ScriptedRunner::new([]);
        let pipeline = pipeline(runner.clone());

        let (stage, failure) = rejected(pipeline.run(&BacktestRequest::new("--help")).await);
        assert_eq!(stage, Stage::Validate);
        assert_eq!(failure.context, "Validation Error");
        assert!(failure.message.contains("project_name"));

        let request = BacktestRequest::new("Proj A").with_backtest_name("--lean-config=/x");
        let (stage, failure) = rejected(pipeline.run(&request).await);
        assert_eq!(stage, Stage::Validate);
        assert!(failure.message.contains("backtest_name"));

        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_request_validation() {
        let params = |v: Value| match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let err = BacktestRequest::from_params(params(json!({}))).unwrap_err();
        assert_eq!(err.context, "Validation Error");

        let err = BacktestRequest::from_params(params(json!({ "project_name": "  " }))).unwrap_err();
        assert!(err.message.contains("project_name"));

        let request = BacktestRequest::from_params(params(json!({
            "project_name": "P",
            "backtest_name": ""
        })))
        .unwrap();
        assert_eq!(request.run_name(), None);

        let request =
            BacktestRequest::from_params(params(json!({ "projectIdentifier": " Proj A " }))).unwrap();
        assert_eq!(request.project_name, "Proj A");
    }
}
