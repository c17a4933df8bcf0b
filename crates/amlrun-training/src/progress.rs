use crate::job::RunId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LaunchEvent {
    WorkspaceResolved { workspace: String },
    DatastoreBound { name: String, registered: bool },
    ComputeFound { name: String },
    ComputeProvisioning { name: String, vm_size: String, max_nodes: u32 },
    ComputeReady { name: String },
    EnvironmentResolved { name: String, version: String },
    RunSubmitted { run_id: RunId, experiment: String },
    RunFinished { run_id: RunId, status: String },
    Downloading { remote: String, local: PathBuf },
    ModelRegistered { model_name: String, version: String },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: LaunchEvent);
}

/// Reports launch progress through `tracing`.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: LaunchEvent) {
        match event {
            LaunchEvent::WorkspaceResolved { workspace } => info!(%workspace, "Workspace resolved"),
            LaunchEvent::DatastoreBound { name, registered } => {
                if registered {
                    info!(datastore = %name, "Registered blob datastore");
                } else {
                    info!(datastore = %name, "Found blob datastore");
                }
            }
            LaunchEvent::ComputeFound { name } => info!(compute = %name, "Found existing compute target"),
            LaunchEvent::ComputeProvisioning { name, vm_size, max_nodes } => {
                info!(compute = %name, %vm_size, max_nodes, "Creating a new compute target");
            }
            LaunchEvent::ComputeReady { name } => info!(compute = %name, "Compute target ready"),
            LaunchEvent::EnvironmentResolved { name, version } => {
                info!(environment = %name, %version, "Environment resolved");
            }
            LaunchEvent::RunSubmitted { run_id, experiment } => {
                info!(%run_id, %experiment, "Run submitted, waiting for completion");
            }
            LaunchEvent::RunFinished { run_id, status } => info!(%run_id, %status, "Run finished"),
            LaunchEvent::Downloading { remote, local } => {
                info!("Downloading from {} to {} ...", remote, local.display());
            }
            LaunchEvent::ModelRegistered { model_name, version } => {
                info!(model = %model_name, %version, "Model registered");
            }
        }
    }
}
