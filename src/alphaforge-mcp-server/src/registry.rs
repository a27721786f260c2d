//! Tool descriptors and the tool registry.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::auth::Authorizer;
use crate::error::{RegistryError, RegistryResult};
use crate::handlers::{Params, ToolHandler, UnimplementedHandler};

// ============================================================================
// Parameter schema
// ============================================================================

/// Type tag of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Object,
    Integer,
    Number,
    Boolean,
    Array,
}

/// Declared parameter of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
}

impl ParamSpec {
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            required: false,
        }
    }

    pub fn string() -> Self {
        Self::new(ParamKind::String)
    }

    pub fn object() -> Self {
        Self::new(ParamKind::Object)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// A named, schema-described tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: IndexMap<String, ParamSpec>,
    pub requires_auth: bool,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("requires_auth", &self.requires_auth)
            .finish()
    }
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            handler: Arc::new(UnimplementedHandler { tool: name.clone() }),
            name,
            description: description.into(),
            parameters: IndexMap::new(),
            requires_auth: false,
        }
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Public view of the descriptor.
    pub fn definition(&self) -> ToolDefinition {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| (name.clone(), json!({ "type": spec.kind })))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect();

        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
            requires_auth: self.requires_auth,
        }
    }
}

/// Tool definition for API listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub requires_auth: bool,
}

// ============================================================================
// Registry
// ============================================================================

/// Startup-time table of tools.
///
/// `register` needs `&mut self`; once the registry is shared behind an `Arc`
/// the table can no longer change, so concurrent invocations only ever read it.
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDescriptor>,
    authorizer: Arc<dyn Authorizer>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            tools: IndexMap::new(),
            authorizer,
        }
    }

    /// Register a tool. A name that is already present is rejected and the
    /// existing descriptor is kept.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> RegistryResult<()> {
        if self.tools.contains_key(&descriptor.name) {
            warn!(tool = %descriptor.name, "Rejected duplicate tool registration");
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }
        debug!(tool = %descriptor.name, requires_auth = descriptor.requires_auth, "Registered tool");
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(ToolDescriptor::definition).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name.
    ///
    /// Non-object `params` are treated as an empty parameter map. The handler's
    /// value is returned unmodified; a handler error or panic becomes
    /// `RegistryError::HandlerFault`.
    pub async fn invoke(
        &self,
        name: &str,
        params: Value,
        token: Option<&str>,
    ) -> RegistryResult<Value> {
        let descriptor = self
            .tools
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;

        if descriptor.requires_auth {
            self.check_access(name, token).await?;
        }

        let params = match params {
            Value::Object(map) => map,
            Value::Null => Params::new(),
            other => {
                debug!(tool = %name, body = %other, "Ignoring non-object parameters");
                Params::new()
            }
        };

        info!(tool = %name, "Invoking tool");
        match AssertUnwindSafe(descriptor.handler.call(params))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(tool = %name, error = ?e, "Tool handler failed");
                Err(RegistryError::HandlerFault {
                    tool: name.to_string(),
                    message: e.to_string(),
                })
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = %name, panic = %message, "Tool handler panicked");
                Err(RegistryError::HandlerFault {
                    tool: name.to_string(),
                    message: "internal error".to_string(),
                })
            }
        }
    }

    async fn check_access(&self, name: &str, token: Option<&str>) -> RegistryResult<()> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RegistryError::Authentication("Authentication required".to_string()))?;

        if !self.authorizer.authenticate(token).await {
            return Err(RegistryError::Authentication(
                "Invalid authentication token".to_string(),
            ));
        }

        if !self.authorizer.authorize(token, name).await {
            warn!(tool = %name, "Token lacks capability");
            return Err(RegistryError::Authorization(format!(
                "Not authorized to use tool '{name}'"
            )));
        }

        Ok(())
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CapabilityAuthorizer, CapabilityPolicy, StaticTokens};
    use crate::handlers::{AsyncToolHandler, FnToolHandler};

    fn registry() -> ToolRegistry {
        let authorizer = CapabilityAuthorizer::new(
            Arc::new(StaticTokens::new(["good", "limited"])),
            CapabilityPolicy::default().grant("good", ["secure_echo"]),
        );
        let mut registry = ToolRegistry::new(Arc::new(authorizer));

        registry
            .register(
                ToolDescriptor::new("echo", "Echo parameters")
                    .param("message", ParamSpec::string())
                    .handler(Arc::new(FnToolHandler::new(|params| Ok(Value::Object(params))))),
            )
            .unwrap();
        registry
            .register(
                ToolDescriptor::new("secure_echo", "Echo parameters behind auth")
                    .requires_auth(true)
                    .handler(Arc::new(AsyncToolHandler::new(|params| async move {
                        Ok(json!({ "echo": params }))
                    }))),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_invoke_returns_handler_value() {
        let registry = registry();
        let value = registry
            .invoke("echo", json!({ "message": "hi", "extra": 1 }), None)
            .await
            .unwrap();
        assert_eq!(value, json!({ "message": "hi", "extra": 1 }));
    }

    #[tokio::test]
    async fn test_non_object_params_become_empty() {
        let registry = registry();
        let value = registry.invoke("echo", json!([1, 2]), None).await.unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = registry().invoke("nope", json!({}), None).await.unwrap_err();
        assert!(matches!(err, RegistryError::ToolNotFound(ref n) if n == "nope"));
    }

    #[tokio::test]
    async fn test_auth_required_without_token() {
        let err = registry()
            .invoke("secure_echo", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let err = registry()
            .invoke("secure_echo", json!({}), Some("forged"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_token_without_capability() {
        let err = registry()
            .invoke("secure_echo", json!({}), Some("limited"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_entitled_token() {
        let value = registry()
            .invoke("secure_echo", json!({ "a": 1 }), Some("good"))
            .await
            .unwrap();
        assert_eq!(value, json!({ "echo": { "a": 1 } }));
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let mut registry = registry();
        let err = registry
            .register(
                ToolDescriptor::new("echo", "Shadow").handler(Arc::new(FnToolHandler::new(
                    |_| Ok(json!("shadow")),
                ))),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(_)));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("echo").unwrap().description, "Echo parameters");
    }

    #[tokio::test]
    async fn test_handler_error_and_panic_are_contained() {
        let mut registry = registry();
        registry
            .register(ToolDescriptor::new("fails", "Always fails").handler(Arc::new(
                FnToolHandler::new(|_| Err(anyhow::anyhow!("disk on fire"))),
            )))
            .unwrap();
        registry
            .register(ToolDescriptor::new("panics", "Always panics").handler(Arc::new(
                FnToolHandler::new(|_| panic!("unexpected state")),
            )))
            .unwrap();

        let err = registry.invoke("fails", json!({}), None).await.unwrap_err();
        assert!(matches!(err, RegistryError::HandlerFault { ref message, .. } if message == "disk on fire"));

        let err = registry.invoke("panics", json!({}), None).await.unwrap_err();
        assert!(matches!(err, RegistryError::HandlerFault { .. }));

        // Registry still serves other tools afterwards
        let value = registry.invoke("echo", json!({ "ok": true }), None).await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_unimplemented_descriptor_faults() {
        let mut registry = registry();
        registry
            .register(ToolDescriptor::new("bare", "No handler"))
            .unwrap();
        let err = registry.invoke("bare", json!({}), None).await.unwrap_err();
        assert!(err.to_string().contains("no implementation"));
    }

    #[test]
    fn test_definition_schema() {
        let descriptor = ToolDescriptor::new("cloud_backtest", "Run a backtest")
            .param("project_name", ParamSpec::string().required())
            .param("strategy_parameters", ParamSpec::object())
            .requires_auth(true);
        let definition = descriptor.definition();

        assert_eq!(definition.parameters["properties"]["project_name"]["type"], "string");
        assert_eq!(
            definition.parameters["properties"]["strategy_parameters"]["type"],
            "object"
        );
        assert_eq!(definition.parameters["required"], json!(["project_name"]));
        assert!(definition.requires_auth);
    }
}
