//! Symbol validation.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// One to five letters, optionally quoted in USD (e.g. `SPY`, `BTCUSD`).
static SYMBOL_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,5}(USD)?$").expect("Invalid symbol regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid symbol format: {0}")]
    InvalidFormat(String),

    #[error("Symbol {0} not permitted in current configuration.")]
    NotPermitted(String),

    #[error("Parameter '{field}' must not start with '-': {value}")]
    OptionLike { field: String, value: String },
}

/// Reject a CLI argument the engine would read as an option.
///
/// Caller values reach LEAN as separate argv entries, so quoting cannot stop
/// `--help` or `--lean-config=...` from being parsed as flags.
pub fn validate_cli_argument(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim_start().starts_with('-') {
        return Err(ValidationError::OptionLike {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Checks symbols against the format rule and the configured allow-list.
#[derive(Debug, Clone)]
pub struct SymbolValidator {
    allowed: HashSet<String>,
}

impl SymbolValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .collect(),
        }
    }

    /// Validate one symbol; comparison is case-insensitive.
    pub fn validate(&self, symbol: &str) -> Result<(), ValidationError> {
        let normalized = symbol.trim().to_uppercase();
        if !SYMBOL_FORMAT.is_match(&normalized) {
            return Err(ValidationError::InvalidFormat(symbol.to_string()));
        }
        if !self.allowed.contains(&normalized) {
            return Err(ValidationError::NotPermitted(symbol.to_string()));
        }
        Ok(())
    }

    /// Validate a JSON value that should hold a symbol string.
    pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
        match value {
            Value::String(symbol) => self.validate(symbol),
            other => Err(ValidationError::InvalidFormat(other.to_string())),
        }
    }
}
