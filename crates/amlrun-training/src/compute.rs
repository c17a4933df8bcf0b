//! Compute target resolution.
//!
//! A named cluster is looked up first; only a *not found* result triggers
//! provisioning with the fixed [`ProvisioningConfig`] policy.

use crate::error::{LaunchError, LaunchResult};
use crate::platform::MlPlatform;
use crate::progress::{LaunchEvent, ProgressSink};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_VM_SIZE: &str = "STANDARD_NC6";
pub const DEFAULT_MAX_NODES: u32 = 4;

/// How long to wait for a freshly created cluster to become usable.
pub const PROVISIONING_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub vm_size: String,
    pub min_nodes: u32,
    pub max_nodes: u32,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self { vm_size: DEFAULT_VM_SIZE.to_string(), min_nodes: 0, max_nodes: DEFAULT_MAX_NODES }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    Creating,
    Updating,
    Succeeded,
    Failed,
    Canceled,
    Unknown(String),
}

impl ProvisioningState {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "creating" => Self::Creating,
            "updating" => Self::Updating,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => f.write_str("Creating"),
            Self::Updating => f.write_str("Updating"),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Canceled => f.write_str("Canceled"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Handle to a named compute cluster in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeTarget {
    pub name: String,
    /// Platform resource id, used when binding a run to this target.
    pub id: String,
    pub vm_size: Option<String>,
    pub state: ProvisioningState,
}

/// Look up `name`, creating it when the platform reports it missing.
pub async fn resolve_compute(
    platform: &dyn MlPlatform,
    workspace: &Workspace,
    name: &str,
    progress: &dyn ProgressSink,
) -> LaunchResult<ComputeTarget> {
    match platform.get_compute(workspace, name).await {
        Ok(target) => {
            progress.on_event(LaunchEvent::ComputeFound { name: target.name.clone() });
            Ok(target)
        }
        Err(LaunchError::ComputeNotFound(_)) => {
            let config = ProvisioningConfig::default();
            progress.on_event(LaunchEvent::ComputeProvisioning {
                name: name.to_string(),
                vm_size: config.vm_size.clone(),
                max_nodes: config.max_nodes,
            });
            let created = platform.create_compute(workspace, name, &config).await?;
            debug!(compute = %created.name, state = %created.state, "compute create accepted");

            let ready = platform
                .wait_for_provisioning(workspace, &created, PROVISIONING_TIMEOUT)
                .await?;
            match ready.state {
                ProvisioningState::Succeeded => {
                    progress.on_event(LaunchEvent::ComputeReady { name: ready.name.clone() });
                    Ok(ready)
                }
                ref state => Err(LaunchError::ProvisioningFailed {
                    name: ready.name.clone(),
                    state: state.to_string(),
                }),
            }
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = ProvisioningConfig::default();
        assert_eq!(config.vm_size, "STANDARD_NC6");
        assert_eq!(config.max_nodes, 4);
        assert_eq!(PROVISIONING_TIMEOUT.as_secs(), 1200);
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(ProvisioningState::parse("Succeeded"), ProvisioningState::Succeeded);
        assert_eq!(ProvisioningState::parse("creating"), ProvisioningState::Creating);
        assert!(ProvisioningState::parse("Failed").is_terminal());
        assert!(!ProvisioningState::parse("Resizing").is_terminal());
    }
}
