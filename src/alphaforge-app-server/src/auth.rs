//! Authentication strategies and authorizer construction.

use std::sync::Arc;

use alphaforge_mcp_server::{
    AcceptAnyToken, Authenticator, Authorizer, CapabilityAuthorizer, CapabilityPolicy, Identity,
    StaticTokens,
};
use anyhow::Context;
use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AuthConfig, AuthMode};

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: u64,
    /// Tools this token may invoke beyond the auto-approved list.
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Validates HS256 JWTs; the `tools` claim becomes the identity's capabilities.
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator").finish_non_exhaustive()
    }
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn validate_token(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                warn!("JWT validation failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Option<Identity> {
        self.validate_token(token)
            .map(|claims| Identity::new(claims.sub).with_capabilities(claims.tools))
    }
}

/// Build the process-wide authorizer from configuration.
pub fn build_authorizer(config: &AuthConfig) -> anyhow::Result<Arc<dyn Authorizer>> {
    let authenticator: Arc<dyn Authenticator> = match config.mode {
        AuthMode::Open => {
            warn!("Server running in open auth mode!");
            warn!("Any non-empty bearer token is accepted.");
            warn!("Set ALPHAFORGE_AUTH_MODE=api_key or jwt to restrict access.");
            Arc::new(AcceptAnyToken)
        }
        AuthMode::ApiKey => {
            anyhow::ensure!(
                !config.api_keys.is_empty(),
                "api_key auth mode requires at least one key in ALPHAFORGE_API_KEYS"
            );
            info!(keys = config.api_keys.len(), "API key authentication enabled");
            Arc::new(StaticTokens::new(config.api_keys.iter().cloned()))
        }
        AuthMode::Jwt => {
            let secret = config
                .jwt_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .context("jwt auth mode requires ALPHAFORGE_JWT_SECRET")?;
            info!("JWT authentication enabled");
            Arc::new(JwtAuthenticator::new(secret))
        }
    };

    let policy = config.token_capabilities.iter().fold(
        CapabilityPolicy::auto_approve(config.auto_approve_tools.iter().cloned()),
        |policy, (token, tools)| policy.grant(token.clone(), tools.iter().cloned()),
    );

    Ok(Arc::new(CapabilityAuthorizer::new(authenticator, policy)))
}

/// Parse Bearer token from Authorization header.
pub fn parse_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
}

/// Extract the bearer token from request headers, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer_token)
}
