//! Azure Machine Learning implementation of [`MlPlatform`].
//!
//! Control-plane calls go to Azure Resource Manager; run history and
//! artifacts go to the workspace's regional data-plane endpoint.

use super::models::{
    AccountKeyCredentials, AccountKeySecrets, AmlComputeCreateDetails, ArtifactContentInfo, ArtifactPage,
    BlobDatastoreProperties, CodeVersionProperties, CodeVersionRequest, CommandJobProperties,
    ComputeCreateProperties, ComputeCreateRequest, ComputeResource, DatastoreCreateRequest, JobCreateRequest,
    JobResource, ModelVersionProperties, ModelVersionRequest, NamedResource, PendingUploadRequest,
    PendingUploadResponse, ResourceList, RunPatchRequest, ScaleSettings, VersionResource, WorkspaceResource,
};
use crate::compute::{ComputeTarget, ProvisioningConfig, ProvisioningState};
use crate::datastore::{BlobDatastoreSpec, DatastoreRef};
use crate::error::{LaunchError, LaunchResult};
use crate::job::{EnvironmentRef, RunHandle, RunId, RunSpec, RunStatus};
use crate::platform::{DatastoreRegistry, MlPlatform};
use crate::registry::RegisteredModel;
use crate::snapshot::SourceSnapshot;
use crate::workspace::{Workspace, WorkspaceConfig};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

pub const ARM_ENDPOINT: &str = "https://management.azure.com";
pub const API_VERSION: &str = "2023-04-01";

/// Environment variable holding the bearer token for both planes.
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Snapshot code assets are content-addressed, so each name has one version.
const SNAPSHOT_CODE_VERSION: &str = "1";

/// `base` with `segments` appended, each one percent-encoded.
fn endpoint_url<'s>(base: &str, segments: impl IntoIterator<Item = &'s str>) -> LaunchResult<Url> {
    let mut url = Url::parse(base).map_err(|e| LaunchError::Platform(format!("invalid endpoint {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| LaunchError::Platform(format!("endpoint {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[derive(Clone)]
pub struct AzureMlClient {
    client: Client,
    token: String,
    arm_endpoint: String,
    /// Overrides the data-plane endpoint derived from the workspace.
    data_endpoint: Option<String>,
    /// Registered code asset used instead of uploading the source directory.
    code_asset_id: Option<String>,
    poll_interval: Duration,
}

impl std::fmt::Debug for AzureMlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureMlClient")
            .field("arm_endpoint", &self.arm_endpoint)
            .field("data_endpoint", &self.data_endpoint)
            .field("code_asset_id", &self.code_asset_id)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl AzureMlClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            client: Client::new(),
            token,
            arm_endpoint: ARM_ENDPOINT.to_string(),
            data_endpoint: None,
            code_asset_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create a client using the token in `AZURE_ACCESS_TOKEN`.
    pub fn from_env() -> LaunchResult<Self> {
        let token = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| LaunchError::Auth(format!("{ACCESS_TOKEN_ENV} is not set")))?;
        Ok(Self::new(token))
    }

    #[must_use]
    pub fn with_arm_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.arm_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_data_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.data_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_code_asset(mut self, code_asset_id: impl Into<String>) -> Self {
        self.code_asset_id = Some(code_asset_id.into());
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn workspace_url(&self, workspace: &Workspace, segments: &[&str]) -> LaunchResult<Url> {
        let path = workspace.config.resource_segments().into_iter().chain(segments.iter().copied());
        endpoint_url(self.arm_endpoint.trim_end_matches('/'), path)
    }

    fn data_url(&self, workspace: &Workspace, segments: &[&str]) -> LaunchResult<Url> {
        let base = if let Some(ref endpoint) = self.data_endpoint {
            endpoint.trim_end_matches('/').to_string()
        } else if let Some(ref discovery) = workspace.discovery_url {
            discovery.trim_end_matches('/').trim_end_matches("/discovery").to_string()
        } else if let Some(ref location) = workspace.location {
            format!("https://{location}.api.azureml.ms")
        } else {
            return Err(LaunchError::Platform(format!(
                "workspace {} has no data-plane endpoint",
                workspace.name()
            )));
        };
        endpoint_url(&base, segments.iter().copied())
    }

    fn artifact_url(&self, workspace: &Workspace, run: &RunHandle, extra: &[&str]) -> LaunchResult<Url> {
        let c = &workspace.config;
        let container = format!("dcid.{}", run.run_id);
        let mut segments = vec![
            "artifact",
            "v2.0",
            "subscriptions",
            c.subscription_id.as_str(),
            "resourceGroups",
            c.resource_group.as_str(),
            "workspaces",
            c.workspace_name.as_str(),
            "artifacts",
            "origins",
            "ExperimentRun",
            "containers",
            container.as_str(),
        ];
        segments.extend_from_slice(extra);
        self.data_url(workspace, &segments)
    }

    fn arm(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .query(&[("api-version", API_VERSION)])
    }

    fn data(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// Send a request. `Ok(None)` means the resource does not exist.
    async fn send(&self, request: RequestBuilder, what: &str) -> LaunchResult<Option<Response>> {
        let response = request.send().await.map_err(|e| {
            error!(error = %e, operation = what, "Azure ML request failed");
            LaunchError::Http(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(LaunchError::Auth(format!("{what}: {status} {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(%status, error = %body, operation = what, "Azure ML returned error status");
            return Err(LaunchError::Platform(format!("{what} failed ({status}): {body}")));
        }
        Ok(Some(response))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> LaunchResult<Option<T>> {
        match self.send(request, what).await? {
            Some(response) => Ok(Some(response.json::<T>().await?)),
            None => Ok(None),
        }
    }

    async fn require_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> LaunchResult<T> {
        self.send_json(request, what)
            .await?
            .ok_or_else(|| LaunchError::Platform(format!("{what}: resource not found")))
    }

    fn to_target(resource: ComputeResource) -> ComputeTarget {
        ComputeTarget {
            name: resource.name,
            id: resource.id,
            vm_size: resource.properties.properties.and_then(|p| p.vm_size),
            state: ProvisioningState::parse(
                resource.properties.provisioning_state.as_deref().unwrap_or("Unknown"),
            ),
        }
    }

    async fn poll_provisioning(&self, workspace: &Workspace, name: &str) -> LaunchResult<ComputeTarget> {
        loop {
            let current = self.get_compute(workspace, name).await?;
            if current.state.is_terminal() {
                return Ok(current);
            }
            debug!(compute = name, state = %current.state, "waiting for compute provisioning");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn latest_version(&self, url: Url, what: &str) -> LaunchResult<Option<VersionResource>> {
        let request = self
            .arm(Method::GET, url)
            .query(&[("$orderBy", "createdtime desc"), ("$top", "1")]);
        let page: Option<ResourceList<VersionResource>> = self.send_json(request, what).await?;
        Ok(page.and_then(|p| p.value.into_iter().next()))
    }

    /// Register `snapshot` as a code asset and return its id.
    ///
    /// An asset with the same content digest is reused without uploading.
    async fn upload_snapshot(&self, workspace: &Workspace, snapshot: &SourceSnapshot) -> LaunchResult<String> {
        let name = snapshot.asset_name();
        let version_url = self.workspace_url(workspace, &["codes", name.as_str(), "versions", SNAPSHOT_CODE_VERSION])?;

        let existing: Option<NamedResource> =
            self.send_json(self.arm(Method::GET, version_url.clone()), "get code version").await?;
        if let Some(existing) = existing {
            debug!(code = %existing.id, "source snapshot already registered");
            return Ok(existing.id);
        }

        let start_url = self.workspace_url(
            workspace,
            &["codes", name.as_str(), "versions", SNAPSHOT_CODE_VERSION, "startPendingUpload"],
        )?;
        let pending: PendingUploadResponse = self
            .require_json(
                self.arm(Method::POST, start_url)
                    .json(&PendingUploadRequest { pending_upload_type: "TemporaryBlobReference" }),
                "start snapshot upload",
            )
            .await?;
        let reference = pending.blob_reference_for_consumption;

        debug!(
            files = snapshot.files.len(),
            bytes = snapshot.total_bytes(),
            root = %snapshot.root.display(),
            "uploading source snapshot"
        );
        for file in &snapshot.files {
            // The SAS URI is a credential; keep it out of errors.
            let url = endpoint_url(&reference.credential.sas_uri, file.relative.split('/'))
                .map_err(|_| LaunchError::Platform("snapshot upload URI is not a valid URL".to_string()))?;
            let bytes = std::fs::read(&file.path)?;
            let response = self
                .client
                .put(url)
                .header("x-ms-blob-type", "BlockBlob")
                .body(bytes)
                .send()
                .await
                .map_err(|e| LaunchError::Http(e.without_url()))?;
            if !response.status().is_success() {
                error!(status = %response.status(), file = %file.relative, "snapshot upload failed");
                return Err(LaunchError::Platform(format!(
                    "uploading {} failed ({})",
                    file.relative,
                    response.status()
                )));
            }
        }

        let body = CodeVersionRequest { properties: CodeVersionProperties { code_uri: reference.blob_uri } };
        let created: NamedResource =
            self.require_json(self.arm(Method::PUT, version_url).json(&body), "register code version").await?;
        Ok(created.id)
    }

    async fn resolve_code(&self, workspace: &Workspace, spec: &RunSpec) -> LaunchResult<String> {
        if let Some(ref id) = self.code_asset_id {
            return Ok(id.clone());
        }
        let snapshot = SourceSnapshot::collect(&spec.source_directory)?;
        if !snapshot.contains(&spec.script) {
            return Err(LaunchError::InvalidSettings(format!(
                "entry script {} not found in source directory {}",
                spec.script,
                spec.source_directory.display()
            )));
        }
        self.upload_snapshot(workspace, &snapshot).await
    }
}

#[async_trait]
impl MlPlatform for AzureMlClient {
    fn id(&self) -> &'static str {
        "azureml"
    }

    async fn resolve_workspace(&self, config_path: &Path) -> LaunchResult<Workspace> {
        let config = WorkspaceConfig::load(config_path)?;
        let mut workspace = Workspace::new(config);

        let url = self.workspace_url(&workspace, &[])?;
        let resource: WorkspaceResource = self
            .send_json(self.arm(Method::GET, url), "get workspace")
            .await?
            .ok_or_else(|| {
                LaunchError::WorkspaceConfig(format!(
                    "workspace {} not found in resource group {}",
                    workspace.config.workspace_name, workspace.config.resource_group
                ))
            })?;

        workspace.location = resource.location;
        workspace.discovery_url = resource.properties.discovery_url;
        Ok(workspace)
    }

    async fn get_compute(&self, workspace: &Workspace, name: &str) -> LaunchResult<ComputeTarget> {
        let url = self.workspace_url(workspace, &["computes", name])?;
        self.send_json::<ComputeResource>(self.arm(Method::GET, url), "get compute")
            .await?
            .map(Self::to_target)
            .ok_or_else(|| LaunchError::ComputeNotFound(name.to_string()))
    }

    async fn create_compute(
        &self,
        workspace: &Workspace,
        name: &str,
        config: &ProvisioningConfig,
    ) -> LaunchResult<ComputeTarget> {
        let url = self.workspace_url(workspace, &["computes", name])?;
        let body = ComputeCreateRequest {
            location: workspace.location.clone(),
            properties: ComputeCreateProperties {
                compute_type: "AmlCompute",
                properties: AmlComputeCreateDetails {
                    vm_size: config.vm_size.clone(),
                    vm_priority: "Dedicated",
                    scale_settings: ScaleSettings {
                        min_node_count: config.min_nodes,
                        max_node_count: config.max_nodes,
                        node_idle_time_before_scale_down: "PT120S",
                    },
                },
            },
        };
        let resource: ComputeResource =
            self.require_json(self.arm(Method::PUT, url).json(&body), "create compute").await?;
        Ok(Self::to_target(resource))
    }

    async fn wait_for_provisioning(
        &self,
        workspace: &Workspace,
        target: &ComputeTarget,
        timeout: Duration,
    ) -> LaunchResult<ComputeTarget> {
        if target.state.is_terminal() {
            return Ok(target.clone());
        }
        match tokio::time::timeout(timeout, self.poll_provisioning(workspace, &target.name)).await {
            Ok(result) => result,
            Err(_) => Err(LaunchError::ProvisioningTimeout { name: target.name.clone(), timeout }),
        }
    }

    async fn get_environment(&self, workspace: &Workspace, name: &str) -> LaunchResult<EnvironmentRef> {
        let url = self.workspace_url(workspace, &["environments", name, "versions"])?;
        let latest = self
            .latest_version(url, "get environment")
            .await?
            .ok_or_else(|| LaunchError::EnvironmentNotFound(name.to_string()))?;
        Ok(EnvironmentRef { name: name.to_string(), version: latest.name, id: latest.id })
    }

    async fn submit_run(&self, workspace: &Workspace, experiment: &str, spec: &RunSpec) -> LaunchResult<RunHandle> {
        let code_id = self.resolve_code(workspace, spec).await?;
        let run_id = RunId::new();
        let url = self.workspace_url(workspace, &["jobs", run_id.0.as_str()])?;
        let body = JobCreateRequest {
            properties: CommandJobProperties {
                job_type: "Command",
                experiment_name: experiment.to_string(),
                command: spec.command_line(),
                environment_id: spec.environment.id.clone(),
                compute_id: spec.compute.id.clone(),
                code_id,
            },
        };
        debug!(%run_id, code = %body.properties.code_id, "submitting command job");

        let job: JobResource = self.require_json(self.arm(Method::PUT, url).json(&body), "submit run").await?;
        Ok(RunHandle { run_id: RunId(job.name), experiment: experiment.to_string() })
    }

    async fn wait_for_completion(&self, workspace: &Workspace, run: &RunHandle) -> LaunchResult<RunStatus> {
        let url = self.workspace_url(workspace, &["jobs", run.run_id.0.as_str()])?;
        loop {
            let job: JobResource = self.require_json(self.arm(Method::GET, url.clone()), "get run").await?;
            let status = RunStatus::parse(job.properties.status.as_deref().unwrap_or("NotStarted"));
            if status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn set_display_name(&self, workspace: &Workspace, run: &RunHandle, name: &str) -> LaunchResult<()> {
        let mut segments = vec!["history", "v1.0"];
        segments.extend(workspace.config.resource_segments());
        segments.extend(["experiments", run.experiment.as_str(), "runs", run.run_id.0.as_str()]);
        let url = self.data_url(workspace, &segments)?;
        let body = RunPatchRequest { display_name: name.to_string() };
        self.send(self.data(Method::PATCH, url).json(&body), "set display name")
            .await?
            .ok_or_else(|| LaunchError::Platform(format!("run {} not found", run.run_id)))?;
        Ok(())
    }

    async fn list_output_files(&self, workspace: &Workspace, run: &RunHandle) -> LaunchResult<Vec<String>> {
        let url = self.artifact_url(workspace, run, &[])?;
        let mut files = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.data(Method::GET, url.clone());
            if let Some(ref token) = continuation {
                request = request.query(&[("continuationToken", token.as_str())]);
            }
            let page: ArtifactPage = self.require_json(request, "list run artifacts").await?;
            files.extend(page.value.into_iter().map(|a| a.path));
            match page.continuation_token {
                Some(token) if !token.is_empty() => continuation = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn download_file(
        &self,
        workspace: &Workspace,
        run: &RunHandle,
        name: &str,
        local_path: &Path,
    ) -> LaunchResult<()> {
        let url = self.artifact_url(workspace, run, &["path", "contentinfo"])?;
        let info: ArtifactContentInfo = self
            .require_json(self.data(Method::GET, url).query(&[("path", name)]), "get artifact content info")
            .await?;

        // The content URI carries its own SAS token.
        let bytes = self
            .client
            .get(&info.content_uri)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| LaunchError::Http(e.without_url()))?
            .bytes()
            .await
            .map_err(|e| LaunchError::Http(e.without_url()))?;
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local_path, &bytes)?;
        Ok(())
    }

    async fn register_model(
        &self,
        workspace: &Workspace,
        run: &RunHandle,
        model_name: &str,
        model_path: &str,
    ) -> LaunchResult<RegisteredModel> {
        let versions_url = self.workspace_url(workspace, &["models", model_name, "versions"])?;
        let next_version = self
            .latest_version(versions_url, "get model versions")
            .await?
            .and_then(|v| v.name.parse::<u64>().ok())
            .map_or(1, |v| v + 1)
            .to_string();

        let url = self.workspace_url(workspace, &["models", model_name, "versions", next_version.as_str()])?;
        let body = ModelVersionRequest {
            properties: ModelVersionProperties {
                model_uri: format!("azureml://jobs/{}/outputs/artifacts/paths/{}", run.run_id, model_path),
                model_type: "custom_model",
                job_name: run.run_id.0.clone(),
            },
        };
        let created: NamedResource =
            self.require_json(self.arm(Method::PUT, url).json(&body), "register model").await?;
        debug!(model = model_name, id = %created.id, "model version created");

        Ok(RegisteredModel { name: model_name.to_string(), version: created.name, path: model_path.to_string() })
    }
}

#[async_trait]
impl DatastoreRegistry for AzureMlClient {
    async fn get_datastore(&self, workspace: &Workspace, name: &str) -> LaunchResult<DatastoreRef> {
        let url = self.workspace_url(workspace, &["datastores", name])?;
        self.send_json::<NamedResource>(self.arm(Method::GET, url), "get datastore")
            .await?
            .map(|r| DatastoreRef { name: r.name, id: r.id })
            .ok_or_else(|| LaunchError::DatastoreNotFound(name.to_string()))
    }

    async fn register_blob_datastore(
        &self,
        workspace: &Workspace,
        spec: &BlobDatastoreSpec,
    ) -> LaunchResult<DatastoreRef> {
        let url = self.workspace_url(workspace, &["datastores", spec.name.as_str()])?;
        let body = DatastoreCreateRequest {
            properties: BlobDatastoreProperties {
                datastore_type: "AzureBlob",
                account_name: spec.account_name.clone(),
                container_name: spec.container_name.clone(),
                endpoint: "core.windows.net",
                protocol: "https",
                credentials: AccountKeyCredentials {
                    credentials_type: "AccountKey",
                    secrets: AccountKeySecrets { secrets_type: "AccountKey", key: spec.account_key.clone() },
                },
            },
        };
        let created: NamedResource =
            self.require_json(self.arm(Method::PUT, url).json(&body), "register datastore").await?;
        Ok(DatastoreRef { name: created.name, id: created.id })
    }
}
