//! AlphaForge MCP Server - registries for externally invocable tools and
//! read-only resources.
//!
//! This crate provides:
//! - `ToolRegistry`: named tool descriptors, invoked through an `Authorizer`
//! - `ResourceRegistry`: named data endpoints backed by a provider or a file
//! - `Authorizer`: the replaceable authentication/authorization seam
//! - `ToolFailure`: the structured error payload every failure is reported as
//!
//! Both registries are built once at startup and are read-only while serving.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use alphaforge_mcp_server::{
//!     AcceptAnyToken, CapabilityAuthorizer, CapabilityPolicy, FnToolHandler, ParamSpec,
//!     ToolDescriptor, ToolRegistry,
//! };
//! use serde_json::json;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let authorizer = CapabilityAuthorizer::new(
//!     Arc::new(AcceptAnyToken),
//!     CapabilityPolicy::auto_approve(["echo"]),
//! );
//! let mut registry = ToolRegistry::new(Arc::new(authorizer));
//! registry.register(
//!     ToolDescriptor::new("echo", "Echo the message back")
//!         .param("message", ParamSpec::string().required())
//!         .handler(Arc::new(FnToolHandler::new(|params| Ok(json!(params))))),
//! )?;
//!
//! let result = registry.invoke("echo", json!({"message": "hi"}), None).await?;
//! assert_eq!(result["message"], "hi");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod auth;
mod error;
mod handlers;
mod registry;
mod resources;
mod response;

pub use auth::{
    AcceptAnyToken, Authenticator, Authorizer, CapabilityAuthorizer, CapabilityPolicy, Identity,
    StaticTokens,
};
pub use error::{RegistryError, RegistryResult};
pub use handlers::{AsyncToolHandler, FnToolHandler, Params, ToolHandler};
pub use registry::{ParamKind, ParamSpec, ToolDefinition, ToolDescriptor, ToolRegistry};
pub use resources::{
    FnResourceProvider, ResourceData, ResourceDefinition, ResourceDescriptor, ResourceProvider,
    ResourceRegistry, ResourceSource,
};
pub use response::{OutcomeStatus, ToolFailure, context};
