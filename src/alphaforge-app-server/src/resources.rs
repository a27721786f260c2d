//! AlphaForge resource definitions.

use std::path::PathBuf;
use std::sync::Arc;

use alphaforge_mcp_server::{
    RegistryResult, ResourceDescriptor, ResourceProvider, ResourceRegistry,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::ServerConfig;

pub const CLOUD_PROJECTS: &str = "cloud_projects";
pub const RISK_PARAMETERS: &str = "risk_parameters";

/// Lists the project directories of the local LEAN workspace.
#[derive(Debug, Clone)]
pub struct LocalProjects {
    root: Option<PathBuf>,
}

impl LocalProjects {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ResourceProvider for LocalProjects {
    async fn read(&self) -> Result<Value> {
        let root = self
            .root
            .as_ref()
            .context("no projects workspace configured (set QC_PROJECTS_DIR)")?;

        let mut entries = tokio::fs::read_dir(root)
            .await
            .with_context(|| format!("cannot read projects workspace {}", root.display()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();

        Ok(json!({
            "projects": names.into_iter().map(|name| json!({ "name": name })).collect::<Vec<_>>(),
            "root": root.display().to_string(),
        }))
    }
}

/// Register every AlphaForge resource.
pub fn register_all(registry: &mut ResourceRegistry, config: &ServerConfig) -> RegistryResult<()> {
    registry.register(
        ResourceDescriptor::new(
            CLOUD_PROJECTS,
            "Projects available in the local QuantConnect workspace",
        )
        .provider(Arc::new(LocalProjects::new(config.lean.projects_dir.clone()))),
    )?;
    registry.register(
        ResourceDescriptor::new(
            RISK_PARAMETERS,
            format!(
                "Current risk management settings (reads {})",
                config.risk_settings_path.display()
            ),
        )
        .path(&config.risk_settings_path),
    )?;
    Ok(())
}
