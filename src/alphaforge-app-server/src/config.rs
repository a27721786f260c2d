//! Server configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Server configuration.
///
/// Built once at startup and shared read-only with every collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Symbols the backtest tools may target.
    #[serde(default = "default_allowed_symbols")]
    pub allowed_symbols: Vec<String>,

    /// LEAN CLI configuration.
    #[serde(default)]
    pub lean: LeanConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Backing store of the `risk_parameters` resource.
    #[serde(default = "default_risk_settings_path")]
    pub risk_settings_path: PathBuf,

    /// Algorithm run by `backtest_strategy` when the parser names none.
    #[serde(default = "default_algorithm")]
    pub default_algorithm: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_allowed_symbols() -> Vec<String> {
    ["SPY", "QQQ", "AAPL", "GOOG", "BTCUSD", "ETHUSD"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_risk_settings_path() -> PathBuf {
    PathBuf::from("./config/risk_settings.json")
}

fn default_algorithm() -> String {
    "BasicTemplateAlgorithm".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            allowed_symbols: default_allowed_symbols(),
            lean: LeanConfig::default(),
            auth: AuthConfig::default(),
            risk_settings_path: default_risk_settings_path(),
            default_algorithm: default_algorithm(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source. Unset and empty values keep
    /// their defaults; malformed values are an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = var("ALPHAFORGE_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(symbols) = var("ALLOWED_SYMBOLS") {
            config.allowed_symbols = split_list(&symbols)
                .map(|s| s.to_uppercase())
                .collect();
        }
        if let Some(path) = var("LEAN_CLI_PATH") {
            config.lean.cli_path = path;
        }
        if let Some(dir) = var("QC_PROJECTS_DIR") {
            config.lean.projects_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = var("LEAN_COMMAND_TIMEOUT_SECS") {
            config.lean.command_timeout = secs
                .trim()
                .parse()
                .with_context(|| format!("LEAN_COMMAND_TIMEOUT_SECS is not a number: {secs}"))?;
        }
        if let Some(mode) = var("ALPHAFORGE_AUTH_MODE") {
            config.auth.mode = mode.parse()?;
        }
        if let Some(keys) = var("ALPHAFORGE_API_KEYS") {
            config.auth.api_keys = split_list(&keys).map(String::from).collect();
        }
        if let Some(secret) = var("ALPHAFORGE_JWT_SECRET") {
            config.auth.jwt_secret = Some(secret);
        }
        if let Some(tools) = var("ALPHAFORGE_AUTO_APPROVE_TOOLS") {
            config.auth.auto_approve_tools = split_list(&tools).map(String::from).collect();
        }
        if let Some(grants) = var("ALPHAFORGE_TOKEN_CAPABILITIES") {
            config.auth.token_capabilities = parse_token_capabilities(&grants)?;
        }
        if let Some(path) = var("ALPHAFORGE_RISK_SETTINGS_PATH") {
            config.risk_settings_path = PathBuf::from(path);
        }
        if let Some(algorithm) = var("ALPHAFORGE_DEFAULT_ALGORITHM") {
            config.default_algorithm = algorithm;
        }

        Ok(config)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parse `token=tool_a|tool_b;other=tool_c`.
fn parse_token_capabilities(raw: &str) -> anyhow::Result<HashMap<String, Vec<String>>> {
    let mut grants = HashMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (token, tools) = entry
            .split_once('=')
            .with_context(|| format!("ALPHAFORGE_TOKEN_CAPABILITIES entry lacks '=': {entry}"))?;
        let token = token.trim();
        anyhow::ensure!(
            !token.is_empty(),
            "ALPHAFORGE_TOKEN_CAPABILITIES entry has an empty token"
        );
        grants
            .entry(token.to_string())
            .or_insert_with(Vec::new)
            .extend(
                tools
                    .split('|')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from),
            );
    }
    Ok(grants)
}

/// LEAN CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeanConfig {
    /// Executable name or path.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Local project workspace; CLI calls run from here when set.
    #[serde(default)]
    pub projects_dir: Option<PathBuf>,

    /// Bounded wait per external call, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,
}

fn default_cli_path() -> String {
    "lean".to_string()
}

fn default_command_timeout() -> u64 {
    600
}

impl Default for LeanConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            projects_dir: None,
            command_timeout: default_command_timeout(),
        }
    }
}

impl LeanConfig {
    pub fn command_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}

/// How caller tokens are authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Any non-empty token.
    #[default]
    Open,
    /// One of `api_keys`.
    ApiKey,
    /// HS256 JWT signed with `jwt_secret`.
    Jwt,
}

impl FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "api_key" | "apikey" => Ok(Self::ApiKey),
            "jwt" => Ok(Self::Jwt),
            other => anyhow::bail!("unknown ALPHAFORGE_AUTH_MODE '{other}' (expected open, api_key or jwt)"),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    /// API keys accepted in `api_key` mode.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// JWT secret for `jwt` mode.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Tools any authenticated token may invoke.
    #[serde(default = "default_auto_approve_tools")]
    pub auto_approve_tools: Vec<String>,

    /// Extra tools granted to specific tokens.
    #[serde(default)]
    pub token_capabilities: HashMap<String, Vec<String>>,
}

fn default_auto_approve_tools() -> Vec<String> {
    [
        "cloud_backtest",
        "backtest_strategy",
        "push_project",
        "create_project",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            api_keys: vec![],
            jwt_secret: None,
            auto_approve_tools: default_auto_approve_tools(),
            token_capabilities: HashMap::new(),
        }
    }
}
