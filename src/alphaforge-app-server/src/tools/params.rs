//! Parameter extraction helpers.

use alphaforge_mcp_server::{Params, ToolFailure, context};
use serde_json::Value;

use crate::pipeline::validate_cli_argument;

/// A required, non-empty string parameter.
pub fn required_str<'a>(params: &'a Params, name: &str) -> Result<&'a str, ToolFailure> {
    optional_str(params, name)?.ok_or_else(|| {
        ToolFailure::new(
            context::VALIDATION,
            format!("Missing required parameter '{name}'"),
        )
    })
}

/// An optional string parameter. Null and blank values count as absent.
pub fn optional_str<'a>(params: &'a Params, name: &str) -> Result<Option<&'a str>, ToolFailure> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then_some(s))
        }
        Some(other) => Err(ToolFailure::new(
            context::VALIDATION,
            format!("Parameter '{name}' must be a string, got {other}"),
        )),
    }
}

/// A required string that is handed to the LEAN CLI as an argument.
pub fn required_arg<'a>(params: &'a Params, name: &str) -> Result<&'a str, ToolFailure> {
    let value = required_str(params, name)?;
    cli_argument(name, value)?;
    Ok(value)
}

/// Check a value bound for the LEAN CLI.
pub fn cli_argument(name: &str, value: &str) -> Result<(), ToolFailure> {
    validate_cli_argument(name, value)
        .map_err(|e| ToolFailure::new(context::VALIDATION, e.to_string()))
}
