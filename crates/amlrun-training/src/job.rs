//! Training run specification.
//!
//! Every run executes the same entry script with a fixed argument list; only
//! the compute target, environment and source directory vary. [`RunSpec`]
//! carries those, and [`RunHandle`]/[`RunStatus`] track the submitted run.

use crate::compute::ComputeTarget;
use crate::error::{LaunchError, LaunchResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Entry script executed on the cluster.
pub const ENTRY_SCRIPT: &str = "main.py";

/// Model config passed to the entry script via `--base`.
pub const TRAINING_CONFIG_FILE: &str = "configs/custom_vqgan.yaml";

/// GPU device spec passed via `--gpus`.
pub const GPU_SPEC: &str = "0,";

/// Fixed argument list: config file, train flag, GPU spec.
#[must_use]
pub fn training_arguments() -> Vec<String> {
    vec![
        "--base".to_string(),
        TRAINING_CONFIG_FILE.to_string(),
        "-t".to_string(),
        "True".to_string(),
        "--gpus".to_string(),
        GPU_SPEC.to_string(),
    ]
}

/// Identifier for a submitted run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A named, versioned environment image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRef {
    pub name: String,
    pub version: String,
    pub id: String,
}

/// Everything needed to submit a single script run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub source_directory: PathBuf,
    pub script: String,
    pub arguments: Vec<String>,
    pub compute: ComputeTarget,
    pub environment: EnvironmentRef,
}

impl RunSpec {
    /// Run spec for the training entry point with its fixed arguments.
    #[must_use]
    pub fn training(source_directory: PathBuf, compute: ComputeTarget, environment: EnvironmentRef) -> Self {
        Self {
            source_directory,
            script: ENTRY_SCRIPT.to_string(),
            arguments: training_arguments(),
            compute,
            environment,
        }
    }

    pub fn validate(&self) -> LaunchResult<()> {
        if self.script.trim().is_empty() {
            return Err(LaunchError::InvalidSettings("run script is required".to_string()));
        }
        if self.compute.name.trim().is_empty() {
            return Err(LaunchError::InvalidSettings("run compute target is required".to_string()));
        }
        Ok(())
    }

    /// Shell command the platform runs inside the snapshot directory.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut parts = vec!["python".to_string(), self.script.clone()];
        parts.extend(self.arguments.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_./,=:".contains(c)) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Queued,
    Preparing,
    Running,
    Finalizing,
    Completed,
    Failed,
    Canceled,
    Other(String),
}

impl RunStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "notstarted" => Self::NotStarted,
            "queued" | "starting" | "provisioning" => Self::Queued,
            "preparing" => Self::Preparing,
            "running" => Self::Running,
            "finalizing" | "cancelrequested" => Self::Finalizing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(raw.to_string()),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(raw) => f.write_str(raw),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A submitted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: RunId,
    pub experiment: String,
}
