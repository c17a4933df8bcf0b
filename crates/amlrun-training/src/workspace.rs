//! Workspace descriptor loading.

use crate::error::{LaunchError, LaunchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of a workspace descriptor (`config.json`) as downloaded from the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace_name: String,
}

impl WorkspaceConfig {
    /// Locate the descriptor for `path`.
    ///
    /// A file path is used as-is. For a directory, `config.json` and then
    /// `.azureml/config.json` are tried.
    pub fn locate(path: &Path) -> LaunchResult<PathBuf> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        if path.is_dir() {
            for candidate in [path.join("config.json"), path.join(".azureml").join("config.json")] {
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        Err(LaunchError::WorkspaceConfig(format!(
            "no workspace config found at {}",
            path.display()
        )))
    }

    pub fn load(path: &Path) -> LaunchResult<Self> {
        let file = Self::locate(path)?;
        let bytes = std::fs::read(&file)?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|e| {
            LaunchError::WorkspaceConfig(format!("failed to parse {}: {}", file.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> LaunchResult<()> {
        for (field, value) in [
            ("subscription_id", &self.subscription_id),
            ("resource_group", &self.resource_group),
            ("workspace_name", &self.workspace_name),
        ] {
            if value.trim().is_empty() {
                return Err(LaunchError::WorkspaceConfig(format!("{field} is empty")));
            }
        }
        Ok(())
    }

    /// ARM resource path of the workspace as unencoded path segments.
    #[must_use]
    pub fn resource_segments(&self) -> [&str; 8] {
        [
            "subscriptions",
            self.subscription_id.as_str(),
            "resourceGroups",
            self.resource_group.as_str(),
            "providers",
            "Microsoft.MachineLearningServices",
            "workspaces",
            self.workspace_name.as_str(),
        ]
    }
}

/// A resolved workspace handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub config: WorkspaceConfig,
    /// Azure region, when the platform reported one.
    pub location: Option<String>,
    /// Data-plane endpoint for run history and artifacts.
    pub discovery_url: Option<String>,
}

impl Workspace {
    #[must_use]
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config, location: None, discovery_url: None }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.workspace_name
    }
}
