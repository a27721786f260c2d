//! Natural-language strategy parsing seam.

use alphaforge_mcp_server::Params;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyParseError {
    #[error("strategy parser is not configured")]
    NotConfigured,

    #[error("{0}")]
    Invalid(String),
}

/// Turns a free-text strategy description into backtest parameters.
///
/// Recognized keys of the returned map: `algorithm_path` (string) and
/// `symbols` (array of strings, or a single string). Anything else is
/// passed through untouched.
#[async_trait]
pub trait StrategyParser: Send + Sync {
    async fn parse(&self, description: &str) -> Result<Params, StrategyParseError>;
}

/// Parser used when no language model is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredParser;

#[async_trait]
impl StrategyParser for UnconfiguredParser {
    async fn parse(&self, _description: &str) -> Result<Params, StrategyParseError> {
        Err(StrategyParseError::NotConfigured)
    }
}

/// A function-based strategy parser.
pub struct FnStrategyParser<F>
where
    F: Fn(&str) -> Result<Params, StrategyParseError> + Send + Sync,
{
    parser: F,
}

impl<F> FnStrategyParser<F>
where
    F: Fn(&str) -> Result<Params, StrategyParseError> + Send + Sync,
{
    pub fn new(parser: F) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl<F> StrategyParser for FnStrategyParser<F>
where
    F: Fn(&str) -> Result<Params, StrategyParseError> + Send + Sync,
{
    async fn parse(&self, description: &str) -> Result<Params, StrategyParseError> {
        (self.parser)(description)
    }
}
