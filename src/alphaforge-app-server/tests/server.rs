use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alphaforge_app_server::config::AuthMode;
use alphaforge_app_server::middleware::REQUEST_ID_HEADER;
use alphaforge_app_server::tools::UnconfiguredParser;
use alphaforge_app_server::{AppState, ServerConfig, create_router, serve};
use alphaforge_exec::{CommandLine, CommandResult, CommandRunner};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, oneshot};
use tower::ServiceExt;

/// Replays canned results in order and records what it was asked to run.
#[derive(Default)]
struct ScriptedRunner {
    results: Mutex<VecDeque<CommandResult>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    fn with(results: impl IntoIterator<Item = CommandResult>) -> Arc<Self> {
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
        let mut argv = vec![command.program().to_string()];
        argv.extend(command.argv().map(String::from));
        self.calls.lock().unwrap().push(argv);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| CommandResult::ok(""))
    }
}

fn app(config: ServerConfig, runner: Arc<ScriptedRunner>) -> Router {
    let state = AppState::with_components(config, runner, Arc::new(UnconfiguredParser)).unwrap();
    create_router(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.into()).unwrap()
}

fn api_key_config(keys: &[&str]) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.auth.mode = AuthMode::ApiKey;
    config.auth.api_keys = keys.iter().map(|k| k.to_string()).collect();
    config
}

#[tokio::test]
async fn test_root_and_health() {
    let app = app(ServerConfig::default(), ScriptedRunner::with([]));

    let (status, body) = send(app.clone(), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "AlphaForge MCP Server");
    assert_eq!(body["message"], "Welcome to AlphaForge MCP Server");

    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_tool_listing() {
    let app = app(ServerConfig::default(), ScriptedRunner::with([]));

    let (status, body) = send(app, get("/tools")).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(names.contains(&"cloud_backtest"));
    assert!(names.contains(&"push_project"));
    assert!(names.contains(&"backtest_status"));
}

#[tokio::test]
async fn test_unknown_tool_is_not_found() {
    let app = app(ServerConfig::default(), ScriptedRunner::with([]));

    let (status, body) = send(app, post("/tools/launch_rockets", Some("t"), "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["context"], "Tool not found");
}

#[tokio::test]
async fn test_protected_tool_requires_token() {
    let runner = ScriptedRunner::with([]);
    let app = app(ServerConfig::default(), runner.clone());

    let (status, body) = send(app, post("/tools/push_project", None, r#"{"project_name":"P"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["context"], "Authentication Error");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_api_key_mode_rejects_unknown_key() {
    let runner = ScriptedRunner::with([]);
    let app = app(api_key_config(&["good-key"]), runner.clone());

    let (status, _) = send(
        app.clone(),
        post("/tools/push_project", Some("bad-key"), r#"{"project_name":"P"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(runner.calls().is_empty());

    let (status, body) = send(
        app,
        post("/tools/push_project", Some("good-key"), r#"{"project_name":"P"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(runner.calls(), vec![vec!["lean", "cloud", "push", "P"]]);
}

#[tokio::test]
async fn test_missing_capability_is_forbidden() {
    let mut config = api_key_config(&["good-key", "ops-key"]);
    config.auth.auto_approve_tools = vec![];
    config
        .auth
        .token_capabilities
        .insert("ops-key".to_string(), vec!["push_project".to_string()]);
    let runner = ScriptedRunner::with([]);
    let app = app(config, runner.clone());

    let (status, body) = send(
        app.clone(),
        post("/tools/push_project", Some("good-key"), r#"{"project_name":"P"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["context"], "Authorization Error");
    assert!(runner.calls().is_empty());

    let (status, _) = send(
        app,
        post("/tools/push_project", Some("ops-key"), r#"{"project_name":"P"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unprotected_tool_needs_no_token() {
    let runner = ScriptedRunner::with([CommandResult::ok("Project P: 3 backtests")]);
    let app = app(api_key_config(&["good-key"]), runner.clone());

    let (status, body) = send(
        app,
        post("/tools/project_status", None, r#"{"project_name":"P"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "Project P: 3 backtests");
    assert_eq!(runner.calls(), vec![vec!["lean", "cloud", "status", "P"]]);
}

#[tokio::test]
async fn test_cloud_backtest_end_to_end() {
    let runner = ScriptedRunner::with([
        CommandResult::ok("Pushed"),
        CommandResult::ok("Started backtest. Backtest ID: n/a\nBacktestId: BT-999"),
    ]);
    let app = app(ServerConfig::default(), runner.clone());

    let body = json!({
        "project_name": "Proj A",
        "strategy_parameters": { "symbol": "spy" },
        "backtest_name": "Run1",
    });
    let (status, body) = send(
        app,
        post("/tools/cloud_backtest", Some("any"), body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["backtest_id"], "BT-999");
    assert_eq!(
        runner.calls(),
        vec![
            vec!["lean", "cloud", "push", "Proj A"],
            vec!["lean", "cloud", "backtest", "Proj A", "--backtest-name", "Run1"],
        ]
    );
}

#[tokio::test]
async fn test_cloud_backtest_rejects_symbol_before_calling_lean() {
    let runner = ScriptedRunner::with([]);
    let app = app(ServerConfig::default(), runner.clone());

    let body = json!({
        "project_name": "Proj A",
        "strategy_parameters": { "symbol": "TSLA" },
    });
    let (status, body) = send(
        app,
        post("/tools/cloud_backtest", Some("any"), body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["context"], "Validation Error");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_non_json_body_is_empty_params() {
    let runner = ScriptedRunner::with([]);
    let app = app(ServerConfig::default(), runner.clone());

    let (status, body) = send(app, post("/tools/push_project", Some("any"), "not json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["context"], "Validation Error");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_resources() {
    let dir = tempfile::tempdir().unwrap();
    let risk = dir.path().join("risk_settings.json");
    std::fs::write(&risk, r#"{"max_drawdown": 0.2, "max_position": 0.05}"#).unwrap();

    let mut config = ServerConfig::default();
    config.risk_settings_path = risk;
    let app = app(config, ScriptedRunner::with([]));

    let (status, body) = send(app.clone(), get("/resources")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(app.clone(), get("/resources/risk_parameters")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_drawdown"], 0.2);

    // No projects workspace configured
    let (status, body) = send(app.clone(), get("/resources/cloud_projects")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["context"], "Resource not available");

    let (status, body) = send(app, get("/resources/account_balance")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["context"], "Resource not found");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = app(ServerConfig::default(), ScriptedRunner::with([]));

    let (status, body) = send(app, get("/admin")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["context"], "Not Found");
}

#[tokio::test]
async fn test_request_id_header() {
    let app = app(ServerConfig::default(), ScriptedRunner::with([]));

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    let generated = response.headers().get(REQUEST_ID_HEADER).unwrap();
    assert!(!generated.is_empty());

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
}

/// Never finishes on its own; reports when a call has started.
struct HangingRunner {
    started: Notify,
}

#[async_trait::async_trait]
impl CommandRunner for HangingRunner {
    async fn execute(&self, _command: &CommandLine) -> CommandResult {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(60)).await;
        CommandResult::ok("")
    }
}

#[tokio::test]
async fn test_shutdown_grace_period_is_enforced() {
    let runner = Arc::new(HangingRunner {
        started: Notify::new(),
    });
    let state = AppState::with_components(
        ServerConfig::default(),
        runner.clone(),
        Arc::new(UnconfiguredParser),
    )
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(
        listener,
        Arc::new(state),
        Duration::from_millis(200),
        async move {
            let _ = stop_rx.await;
        },
    ));

    let body = r#"{"project_name":"P"}"#;
    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(
            format!(
                "POST /tools/project_status HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    runner.started.notified().await;

    stop_tx.send(()).unwrap();
    let finished = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(finished.is_ok(), "server kept waiting on the in-flight request");
    finished.unwrap().unwrap().unwrap();
}
