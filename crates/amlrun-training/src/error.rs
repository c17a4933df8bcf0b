use std::time::Duration;
use thiserror::Error;

pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid launch settings: {0}")]
    InvalidSettings(String),

    #[error("workspace config error: {0}")]
    WorkspaceConfig(String),

    #[error("compute target not found: {0}")]
    ComputeNotFound(String),

    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("datastore not found: {0}")]
    DatastoreNotFound(String),

    #[error("compute target {name} failed to provision: {state}")]
    ProvisioningFailed { name: String, state: String },

    #[error("compute target {name} not ready after {}s", .timeout.as_secs())]
    ProvisioningTimeout { name: String, timeout: Duration },

    #[error("run {run_id} finished with status {status}")]
    RunFailed { run_id: String, status: String },

    #[error("platform error: {0}")]
    Platform(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
