//! Recording in-memory platform for unit tests.

use crate::compute::{ComputeTarget, ProvisioningConfig, ProvisioningState};
use crate::datastore::{BlobDatastoreSpec, DatastoreRef};
use crate::error::{LaunchError, LaunchResult};
use crate::job::{EnvironmentRef, RunHandle, RunId, RunSpec, RunStatus};
use crate::platform::{DatastoreRegistry, MlPlatform};
use crate::registry::RegisteredModel;
use crate::workspace::{Workspace, WorkspaceConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ResolveWorkspace { config_path: PathBuf },
    GetCompute { name: String },
    CreateCompute { name: String, vm_size: String, max_nodes: u32 },
    WaitForProvisioning { name: String, timeout_secs: u64 },
    GetEnvironment { name: String },
    SubmitRun { experiment: String, script: String, arguments: Vec<String>, compute: String, environment: String },
    WaitForCompletion,
    SetDisplayName { name: String },
    ListOutputFiles,
    DownloadFile { name: String, local: PathBuf },
    RegisterModel { model_name: String, model_path: String },
    GetDatastore { name: String },
    RegisterDatastore { name: String, container: String },
}

pub struct MockPlatform {
    calls: Mutex<Vec<Call>>,
    compute_exists: bool,
    compute_error: Option<String>,
    provisioning_result: String,
    environment_exists: bool,
    datastore_exists: bool,
    final_status: RunStatus,
    outputs: Vec<String>,
    fail_downloads: bool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            compute_exists: true,
            compute_error: None,
            provisioning_result: "Succeeded".to_string(),
            environment_exists: true,
            datastore_exists: false,
            final_status: RunStatus::Completed,
            outputs: Vec::new(),
            fail_downloads: false,
        }
    }

    pub fn without_compute(mut self) -> Self {
        self.compute_exists = false;
        self
    }

    pub fn with_compute_error(mut self, message: &str) -> Self {
        self.compute_error = Some(message.to_string());
        self
    }

    pub fn with_provisioning_result(mut self, state: &str) -> Self {
        self.provisioning_result = state.to_string();
        self
    }

    pub fn without_environment(mut self) -> Self {
        self.environment_exists = false;
        self
    }

    pub fn with_datastore(mut self) -> Self {
        self.datastore_exists = true;
        self
    }

    pub fn with_final_status(mut self, status: RunStatus) -> Self {
        self.final_status = status;
        self
    }

    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn failing_downloads(mut self) -> Self {
        self.fail_downloads = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn target(name: &str, state: ProvisioningState) -> ComputeTarget {
        ComputeTarget {
            name: name.to_string(),
            id: format!("computes/{name}"),
            vm_size: Some("STANDARD_NC6".to_string()),
            state,
        }
    }
}

#[async_trait]
impl MlPlatform for MockPlatform {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn resolve_workspace(&self, config_path: &Path) -> LaunchResult<Workspace> {
        self.record(Call::ResolveWorkspace { config_path: config_path.to_path_buf() });
        Ok(Workspace::new(WorkspaceConfig {
            subscription_id: "sub".to_string(),
            resource_group: "rg".to_string(),
            workspace_name: "ws".to_string(),
        }))
    }

    async fn get_compute(&self, _workspace: &Workspace, name: &str) -> LaunchResult<ComputeTarget> {
        self.record(Call::GetCompute { name: name.to_string() });
        if let Some(ref message) = self.compute_error {
            return Err(LaunchError::Platform(message.clone()));
        }
        if self.compute_exists {
            Ok(Self::target(name, ProvisioningState::Succeeded))
        } else {
            Err(LaunchError::ComputeNotFound(name.to_string()))
        }
    }

    async fn create_compute(
        &self,
        _workspace: &Workspace,
        name: &str,
        config: &ProvisioningConfig,
    ) -> LaunchResult<ComputeTarget> {
        self.record(Call::CreateCompute {
            name: name.to_string(),
            vm_size: config.vm_size.clone(),
            max_nodes: config.max_nodes,
        });
        Ok(Self::target(name, ProvisioningState::Creating))
    }

    async fn wait_for_provisioning(
        &self,
        _workspace: &Workspace,
        target: &ComputeTarget,
        timeout: Duration,
    ) -> LaunchResult<ComputeTarget> {
        self.record(Call::WaitForProvisioning { name: target.name.clone(), timeout_secs: timeout.as_secs() });
        Ok(Self::target(&target.name, ProvisioningState::parse(&self.provisioning_result)))
    }

    async fn get_environment(&self, _workspace: &Workspace, name: &str) -> LaunchResult<EnvironmentRef> {
        self.record(Call::GetEnvironment { name: name.to_string() });
        if !self.environment_exists {
            return Err(LaunchError::EnvironmentNotFound(name.to_string()));
        }
        Ok(EnvironmentRef { name: name.to_string(), version: "1".to_string(), id: format!("environments/{name}/1") })
    }

    async fn submit_run(&self, _workspace: &Workspace, experiment: &str, spec: &RunSpec) -> LaunchResult<RunHandle> {
        self.record(Call::SubmitRun {
            experiment: experiment.to_string(),
            script: spec.script.clone(),
            arguments: spec.arguments.clone(),
            compute: spec.compute.name.clone(),
            environment: spec.environment.name.clone(),
        });
        Ok(RunHandle { run_id: RunId("run-1".to_string()), experiment: experiment.to_string() })
    }

    async fn wait_for_completion(&self, _workspace: &Workspace, _run: &RunHandle) -> LaunchResult<RunStatus> {
        self.record(Call::WaitForCompletion);
        Ok(self.final_status.clone())
    }

    async fn set_display_name(&self, _workspace: &Workspace, _run: &RunHandle, name: &str) -> LaunchResult<()> {
        self.record(Call::SetDisplayName { name: name.to_string() });
        Ok(())
    }

    async fn list_output_files(&self, _workspace: &Workspace, _run: &RunHandle) -> LaunchResult<Vec<String>> {
        self.record(Call::ListOutputFiles);
        Ok(self.outputs.clone())
    }

    async fn download_file(
        &self,
        _workspace: &Workspace,
        _run: &RunHandle,
        name: &str,
        local_path: &Path,
    ) -> LaunchResult<()> {
        self.record(Call::DownloadFile { name: name.to_string(), local: local_path.to_path_buf() });
        if self.fail_downloads {
            return Err(LaunchError::Platform(format!("download failed: {name}")));
        }
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local_path, name.as_bytes())?;
        Ok(())
    }

    async fn register_model(
        &self,
        _workspace: &Workspace,
        _run: &RunHandle,
        model_name: &str,
        model_path: &str,
    ) -> LaunchResult<RegisteredModel> {
        self.record(Call::RegisterModel { model_name: model_name.to_string(), model_path: model_path.to_string() });
        Ok(RegisteredModel { name: model_name.to_string(), version: "1".to_string(), path: model_path.to_string() })
    }
}

#[async_trait]
impl DatastoreRegistry for MockPlatform {
    async fn get_datastore(&self, _workspace: &Workspace, name: &str) -> LaunchResult<DatastoreRef> {
        self.record(Call::GetDatastore { name: name.to_string() });
        if self.datastore_exists {
            Ok(DatastoreRef { name: name.to_string(), id: format!("datastores/{name}") })
        } else {
            Err(LaunchError::DatastoreNotFound(name.to_string()))
        }
    }

    async fn register_blob_datastore(&self, _workspace: &Workspace, spec: &BlobDatastoreSpec) -> LaunchResult<DatastoreRef> {
        self.record(Call::RegisterDatastore { name: spec.name.clone(), container: spec.container_name.clone() });
        Ok(DatastoreRef { name: spec.name.clone(), id: format!("datastores/{}", spec.name) })
    }
}
