//! Tool handler traits and implementations.

use anyhow::Result;
use serde_json::{Map, Value};

/// Parameters passed to a tool: parameter name to JSON value.
pub type Params = Map<String, Value>;

/// Trait for implementing tool handlers.
///
/// `Ok` values are returned to the caller unmodified, whatever their status
/// field says. `Err` (and panics) are reported as handler faults.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: Params) -> Result<Value>;
}

/// A simple function-based tool handler.
pub struct FnToolHandler<F>
where
    F: Fn(Params) -> Result<Value> + Send + Sync,
{
    handler: F,
}

impl<F> FnToolHandler<F>
where
    F: Fn(Params) -> Result<Value> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait::async_trait]
impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(Params) -> Result<Value> + Send + Sync,
{
    async fn call(&self, params: Params) -> Result<Value> {
        (self.handler)(params)
    }
}

/// An async function-based tool handler.
pub struct AsyncToolHandler<F, Fut>
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    handler: F,
}

impl<F, Fut> AsyncToolHandler<F, Fut>
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait::async_trait]
impl<F, Fut> ToolHandler for AsyncToolHandler<F, Fut>
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    async fn call(&self, params: Params) -> Result<Value> {
        (self.handler)(params).await
    }
}

/// Handler installed by `ToolDescriptor::new` until a real one is attached.
pub(crate) struct UnimplementedHandler {
    pub(crate) tool: String,
}

#[async_trait::async_trait]
impl ToolHandler for UnimplementedHandler {
    async fn call(&self, _params: Params) -> Result<Value> {
        anyhow::bail!("tool '{}' has no implementation", self.tool)
    }
}
