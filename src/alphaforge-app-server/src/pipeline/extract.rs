//! Backtest identifier extraction from submit output.
//!
//! Accepted formats, tried in order:
//! 1. the whole output is a JSON object with a string or numeric
//!    `backtestId` or `backtest_id` field;
//! 2. a case-insensitive `backtestId` label followed by `:` and/or
//!    whitespace and the identifier, e.g.
//!    `Started backtest for project 'X' with backtestId BT-12345` or
//!    `BacktestId: BT-12345`. The first match wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static BACKTEST_ID_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)backtestid[:\s]+(\S+)").expect("Invalid backtest id regex")
});

/// Find the backtest identifier in CLI output, if any.
pub fn extract_backtest_id(output: &str) -> Option<String> {
    from_json(output).or_else(|| from_text(output))
}

fn from_json(output: &str) -> Option<String> {
    let value: Value = serde_json::from_str(output.trim()).ok()?;
    ["backtestId", "backtest_id"]
        .iter()
        .find_map(|key| match value.get(key)? {
            Value::String(id) => Some(id.trim().to_string()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .filter(|id| !id.is_empty())
}

fn from_text(output: &str) -> Option<String> {
    BACKTEST_ID_LABEL
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
