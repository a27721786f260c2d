//! Authentication and authorization seam.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Authenticates caller tokens and authorizes them per tool.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Is this token a valid credential at all?
    async fn authenticate(&self, token: &str) -> bool;

    /// May this token invoke the named tool?
    async fn authorize(&self, token: &str, tool_name: &str) -> bool;
}

/// Identity established from a valid token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    /// Tools the credential itself grants (e.g. from token claims).
    pub capabilities: Vec<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(tools.into_iter().map(Into::into));
        self
    }
}

/// Authentication strategy: turns a token into an identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Option<Identity>;
}

/// Accepts any non-empty token.
///
/// This is a placeholder policy for local development, not a security posture.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyToken;

#[async_trait]
impl Authenticator for AcceptAnyToken {
    async fn authenticate(&self, token: &str) -> Option<Identity> {
        (!token.trim().is_empty()).then(|| Identity::new("anonymous"))
    }
}

/// Accepts tokens from a fixed list.
#[derive(Clone)]
pub struct StaticTokens {
    tokens: Vec<String>,
}

impl std::fmt::Debug for StaticTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokens")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl StaticTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokens {
    async fn authenticate(&self, token: &str) -> Option<Identity> {
        self.tokens
            .iter()
            .position(|known| constant_time_compare(known.as_bytes(), token.as_bytes()))
            .map(|index| Identity::new(format!("api-key-{index}")))
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Process-wide capability configuration, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct CapabilityPolicy {
    auto_approved: HashSet<String>,
    per_token: HashMap<String, HashSet<String>>,
}

impl CapabilityPolicy {
    /// Tools any authenticated token may invoke.
    pub fn auto_approve<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            auto_approved: tools.into_iter().map(Into::into).collect(),
            per_token: HashMap::new(),
        }
    }

    /// Grant a specific token the listed tools.
    pub fn grant<I, S>(mut self, token: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.per_token
            .entry(token.into())
            .or_default()
            .extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn allows(&self, token: &str, tool_name: &str) -> bool {
        self.auto_approved.contains(tool_name)
            || self
                .per_token
                .get(token)
                .is_some_and(|tools| tools.contains(tool_name))
    }
}

/// Authorizer combining an authentication strategy with a capability policy.
#[derive(Clone)]
pub struct CapabilityAuthorizer {
    authenticator: Arc<dyn Authenticator>,
    policy: CapabilityPolicy,
}

impl std::fmt::Debug for CapabilityAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityAuthorizer")
            .field("policy", &self.policy)
            .finish()
    }
}

impl CapabilityAuthorizer {
    pub fn new(authenticator: Arc<dyn Authenticator>, policy: CapabilityPolicy) -> Self {
        Self {
            authenticator,
            policy,
        }
    }
}

#[async_trait]
impl Authorizer for CapabilityAuthorizer {
    async fn authenticate(&self, token: &str) -> bool {
        match self.authenticator.authenticate(token).await {
            Some(identity) => {
                debug!(subject = %identity.subject, "Token authenticated");
                true
            }
            None => {
                warn!("Token rejected");
                false
            }
        }
    }

    async fn authorize(&self, token: &str, tool_name: &str) -> bool {
        if self.policy.allows(token, tool_name) {
            return true;
        }
        self.authenticator
            .authenticate(token)
            .await
            .is_some_and(|identity| identity.capabilities.iter().any(|t| t == tool_name))
    }
}
