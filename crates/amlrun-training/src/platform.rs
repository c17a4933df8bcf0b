//! Seams to the remote machine-learning platform.

use crate::compute::{ComputeTarget, ProvisioningConfig};
use crate::datastore::{BlobDatastoreSpec, DatastoreRef};
use crate::error::LaunchResult;
use crate::job::{EnvironmentRef, RunHandle, RunSpec, RunStatus};
use crate::registry::RegisteredModel;
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// The remote machine-learning platform a launch talks to.
///
/// Every method is a single remote interaction; none of them retry.
#[async_trait]
pub trait MlPlatform: Send + Sync {
    fn id(&self) -> &'static str;

    /// Authenticate against the workspace described by `config_path`.
    async fn resolve_workspace(&self, config_path: &Path) -> LaunchResult<Workspace>;

    /// Fails with `LaunchError::ComputeNotFound` when no target has this name.
    async fn get_compute(&self, workspace: &Workspace, name: &str) -> LaunchResult<ComputeTarget>;

    async fn create_compute(
        &self,
        workspace: &Workspace,
        name: &str,
        config: &ProvisioningConfig,
    ) -> LaunchResult<ComputeTarget>;

    /// Block until `target` leaves its transitional state, or fail once `timeout` elapses.
    async fn wait_for_provisioning(
        &self,
        workspace: &Workspace,
        target: &ComputeTarget,
        timeout: Duration,
    ) -> LaunchResult<ComputeTarget>;

    async fn get_environment(&self, workspace: &Workspace, name: &str) -> LaunchResult<EnvironmentRef>;

    async fn submit_run(&self, workspace: &Workspace, experiment: &str, spec: &RunSpec) -> LaunchResult<RunHandle>;

    /// Block until the run reaches a terminal status. No timeout.
    async fn wait_for_completion(&self, workspace: &Workspace, run: &RunHandle) -> LaunchResult<RunStatus>;

    async fn set_display_name(&self, workspace: &Workspace, run: &RunHandle, name: &str) -> LaunchResult<()>;

    /// Names of every file the run produced, relative to the run root.
    async fn list_output_files(&self, workspace: &Workspace, run: &RunHandle) -> LaunchResult<Vec<String>>;

    async fn download_file(
        &self,
        workspace: &Workspace,
        run: &RunHandle,
        name: &str,
        local_path: &Path,
    ) -> LaunchResult<()>;

    async fn register_model(
        &self,
        workspace: &Workspace,
        run: &RunHandle,
        model_name: &str,
        model_path: &str,
    ) -> LaunchResult<RegisteredModel>;
}

/// Datastore lookup and registration, kept apart from the run flow.
#[async_trait]
pub trait DatastoreRegistry: Send + Sync {
    /// Fails with `LaunchError::DatastoreNotFound` when no datastore has this name.
    async fn get_datastore(&self, workspace: &Workspace, name: &str) -> LaunchResult<DatastoreRef>;

    async fn register_blob_datastore(
        &self,
        workspace: &Workspace,
        spec: &BlobDatastoreSpec,
    ) -> LaunchResult<DatastoreRef>;
}
