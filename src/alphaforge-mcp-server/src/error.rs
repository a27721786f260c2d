//! Registry error types.

use thiserror::Error;

use crate::response::{ToolFailure, context};

/// Failures raised at the registry boundary.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is not registered")]
    ToolNotFound(String),

    #[error("Resource '{0}' is not registered")]
    ResourceNotFound(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("Tool '{tool}' failed: {message}")]
    HandlerFault { tool: String, message: String },

    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Resource '{0}' is already registered")]
    DuplicateResource(String),
}

impl RegistryError {
    /// Context tag reported to callers.
    pub fn context(&self) -> &'static str {
        match self {
            Self::ToolNotFound(_) => context::TOOL_NOT_FOUND,
            Self::ResourceNotFound(_) => context::RESOURCE_NOT_FOUND,
            Self::Authentication(_) => context::AUTHENTICATION,
            Self::Authorization(_) => context::AUTHORIZATION,
            Self::HandlerFault { .. } => context::HANDLER_FAULT,
            Self::DuplicateTool(_) | Self::DuplicateResource(_) => context::REGISTRATION,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::ResourceNotFound(_))
    }

    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure::new(self.context(), self.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
