//! Structured response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Machine-readable context tags carried by every failure payload.
pub mod context {
    pub const VALIDATION: &str = "Validation Error";
    pub const PUSH_FAILED: &str = "Push failed";
    pub const NOT_FOUND: &str = "Not Found";
    pub const STRATEGY_PARSE: &str = "Strategy parse failed";
    pub const TOOL_NOT_FOUND: &str = "Tool not found";
    pub const RESOURCE_NOT_FOUND: &str = "Resource not found";
    pub const RESOURCE_UNAVAILABLE: &str = "Resource not available";
    pub const AUTHENTICATION: &str = "Authentication Error";
    pub const AUTHORIZATION: &str = "Authorization Error";
    pub const HANDLER_FAULT: &str = "Tool execution failed";
    pub const REGISTRATION: &str = "Registration Error";
}

/// Terminal status of a tool outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Failure payload returned to callers.
///
/// Diagnostics beyond `details` stay in the server log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub status: OutcomeStatus,
    pub context: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ToolFailure {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        let failure = Self {
            status: OutcomeStatus::Error,
            context: context.into(),
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        };
        warn!(context = %failure.context, message = %failure.message, "Tool failure");
        failure
    }

    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    pub fn to_value(&self) -> Value {
        // Plain struct of strings and JSON values, always serializable
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
