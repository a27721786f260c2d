//! Error types for the app server.

use alphaforge_mcp_server::{RegistryError, ToolFailure, context};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Registry-level failure (not found, auth, handler fault).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No route for the requested path.
    #[error("No route for {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Registry(e) => match e {
                RegistryError::ToolNotFound(_) | RegistryError::ResourceNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                RegistryError::Authentication(_) => StatusCode::UNAUTHORIZED,
                RegistryError::Authorization(_) => StatusCode::FORBIDDEN,
                RegistryError::HandlerFault { .. }
                | RegistryError::DuplicateTool(_)
                | RegistryError::DuplicateResource(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Registry(e) => match e {
                RegistryError::ToolNotFound(_) => "tool_not_found",
                RegistryError::ResourceNotFound(_) => "resource_not_found",
                RegistryError::Authentication(_) => "authentication_failed",
                RegistryError::Authorization(_) => "not_authorized",
                RegistryError::HandlerFault { .. } => "handler_fault",
                RegistryError::DuplicateTool(_) | RegistryError::DuplicateResource(_) => {
                    "registration_error"
                }
            },
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Context tag of the failure payload.
    pub fn context(&self) -> &'static str {
        match self {
            Self::Registry(e) => e.context(),
            Self::NotFound(_) => context::NOT_FOUND,
            Self::Internal(_) => context::HANDLER_FAULT,
        }
    }

    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure::new(self.context(), self.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "Request rejected");
        }

        (status, Json(self.to_failure())).into_response()
    }
}

/// Result type for the app server.
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}
