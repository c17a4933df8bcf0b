//! Request/response bodies for the Azure Machine Learning REST API.
//!
//! Only the fields the launcher reads or writes are modelled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct WorkspaceResource {
    pub location: Option<String>,
    #[serde(default)]
    pub properties: WorkspaceProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceProperties {
    pub discovery_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComputeResource {
    pub id: String,
    pub name: String,
    pub properties: ComputeProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeProperties {
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub properties: Option<AmlComputeDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmlComputeDetails {
    pub vm_size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ComputeCreateRequest {
    pub location: Option<String>,
    pub properties: ComputeCreateProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeCreateProperties {
    pub compute_type: &'static str,
    pub properties: AmlComputeCreateDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmlComputeCreateDetails {
    pub vm_size: String,
    pub vm_priority: &'static str,
    pub scale_settings: ScaleSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSettings {
    pub min_node_count: u32,
    pub max_node_count: u32,
    pub node_idle_time_before_scale_down: &'static str,
}

/// `{ "value": [...] }` list page. Only the first page is ever read.
#[derive(Debug, Deserialize)]
pub struct ResourceList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct VersionResource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct JobCreateRequest {
    pub properties: CommandJobProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandJobProperties {
    pub job_type: &'static str,
    pub experiment_name: String,
    pub command: String,
    pub environment_id: String,
    pub compute_id: String,
    pub code_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUploadRequest {
    pub pending_upload_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUploadResponse {
    pub blob_reference_for_consumption: BlobReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobReference {
    pub blob_uri: String,
    pub credential: SasCredential,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SasCredential {
    pub sas_uri: String,
}

impl std::fmt::Debug for SasCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasCredential").finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
pub struct CodeVersionRequest {
    pub properties: CodeVersionProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeVersionProperties {
    pub code_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct JobResource {
    pub name: String,
    pub properties: JobStatusProperties,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusProperties {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPatchRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPage {
    #[serde(default)]
    pub value: Vec<ArtifactEntry>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactContentInfo {
    pub content_uri: String,
}

#[derive(Debug, Serialize)]
pub struct ModelVersionRequest {
    pub properties: ModelVersionProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersionProperties {
    pub model_uri: String,
    pub model_type: &'static str,
    pub job_name: String,
}

#[derive(Debug, Deserialize)]
pub struct NamedResource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DatastoreCreateRequest {
    pub properties: BlobDatastoreProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDatastoreProperties {
    pub datastore_type: &'static str,
    pub account_name: String,
    pub container_name: String,
    pub endpoint: &'static str,
    pub protocol: &'static str,
    pub credentials: AccountKeyCredentials,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKeyCredentials {
    pub credentials_type: &'static str,
    pub secrets: AccountKeySecrets,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKeySecrets {
    pub secrets_type: &'static str,
    pub key: String,
}

impl std::fmt::Debug for AccountKeySecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeySecrets")
            .field("secrets_type", &self.secrets_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datastore_request_debug_hides_key() {
        let request = DatastoreCreateRequest {
            properties: BlobDatastoreProperties {
                datastore_type: "AzureBlob",
                account_name: "acct".to_string(),
                container_name: "images".to_string(),
                endpoint: "core.windows.net",
                protocol: "https",
                credentials: AccountKeyCredentials {
                    credentials_type: "AccountKey",
                    secrets: AccountKeySecrets { secrets_type: "AccountKey", key: "very-secret".to_string() },
                },
            },
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("acct"));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["properties"]["credentials"]["secrets"]["key"], "very-secret");
    }
}
