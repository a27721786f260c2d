//! Read-only resource descriptors and the resource registry.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::panic_message;
use crate::response::{ToolFailure, context};

/// Trait for implementing dynamic resource providers.
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn read(&self) -> Result<Value>;
}

/// A function-based resource provider.
pub struct FnResourceProvider<F>
where
    F: Fn() -> Result<Value> + Send + Sync,
{
    provider: F,
}

impl<F> FnResourceProvider<F>
where
    F: Fn() -> Result<Value> + Send + Sync,
{
    pub fn new(provider: F) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl<F> ResourceProvider for FnResourceProvider<F>
where
    F: Fn() -> Result<Value> + Send + Sync,
{
    async fn read(&self) -> Result<Value> {
        (self.provider)()
    }
}

/// Where a resource's data comes from.
#[derive(Clone)]
pub enum ResourceSource {
    /// Computed on every fetch.
    Provider(Arc<dyn ResourceProvider>),
    /// JSON document on disk.
    Path(PathBuf),
}

impl std::fmt::Debug for ResourceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(_) => f.write_str("Provider"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// A named, read-only data endpoint.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub name: String,
    pub description: String,
    pub source: Option<ResourceSource>,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            source: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.source = Some(ResourceSource::Provider(provider));
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(ResourceSource::Path(path.into()));
        self
    }

    pub fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            kind: match &self.source {
                Some(ResourceSource::Provider(_)) => "dynamic",
                Some(ResourceSource::Path(_)) => "file",
                None => "none",
            }
            .to_string(),
        }
    }
}

/// Resource definition for API listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    pub description: String,
    pub kind: String,
}

/// Outcome of fetching a registered resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    Available(Value),
    Unavailable(ToolFailure),
}

impl ResourceData {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Available(value) => value,
            Self::Unavailable(failure) => failure.to_value(),
        }
    }
}

/// Startup-time table of resources.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: IndexMap<String, ResourceDescriptor>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Duplicate names are rejected.
    pub fn register(&mut self, descriptor: ResourceDescriptor) -> RegistryResult<()> {
        if self.resources.contains_key(&descriptor.name) {
            warn!(resource = %descriptor.name, "Rejected duplicate resource registration");
            return Err(RegistryError::DuplicateResource(descriptor.name));
        }
        debug!(resource = %descriptor.name, "Registered resource");
        self.resources
            .insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> Vec<ResourceDefinition> {
        self.resources
            .values()
            .map(ResourceDescriptor::definition)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Fetch a resource's data.
    ///
    /// Only an unregistered name is an error; provider failures and missing
    /// or unreadable backing stores produce `ResourceData::Unavailable`.
    pub async fn fetch(&self, name: &str) -> RegistryResult<ResourceData> {
        let descriptor = self
            .resources
            .get(name)
            .ok_or_else(|| RegistryError::ResourceNotFound(name.to_string()))?;

        let data = match &descriptor.source {
            Some(ResourceSource::Provider(provider)) => {
                match AssertUnwindSafe(provider.read()).catch_unwind().await {
                    Ok(Ok(value)) => ResourceData::Available(value),
                    Ok(Err(e)) => {
                        warn!(resource = %name, error = ?e, "Resource provider failed");
                        unavailable(name, e.to_string())
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(resource = %name, panic = %message, "Resource provider panicked");
                        unavailable(name, "internal error")
                    }
                }
            }
            Some(ResourceSource::Path(path)) => match tokio::fs::read_to_string(path).await {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(value) => ResourceData::Available(value),
                    Err(e) => {
                        warn!(resource = %name, path = %path.display(), error = %e, "Backing store is not valid JSON");
                        unavailable(name, "backing store is not valid JSON")
                    }
                },
                Err(e) => {
                    warn!(resource = %name, path = %path.display(), error = %e, "Backing store unreadable");
                    unavailable(name, "backing store is missing or unreadable")
                }
            },
            None => unavailable(name, "no provider or backing store configured"),
        };

        Ok(data)
    }
}

fn unavailable(name: &str, reason: impl std::fmt::Display) -> ResourceData {
    ResourceData::Unavailable(ToolFailure::new(
        context::RESOURCE_UNAVAILABLE,
        format!("Resource '{name}' not available: {reason}"),
    ))
}
