//! amlrun Training
//!
//! Submits a training script to an Azure Machine Learning workspace:
//! - Resolving launch settings (`LaunchSettings`)
//! - Resolving the workspace, compute target and environment
//! - Uploading the source directory (`SourceSnapshot`), submitting a run
//!   (`RunSpec`) and waiting for it
//! - Downloading and registering model outputs
//!
//! The remote platform sits behind the `MlPlatform` trait; `AzureMlClient`
//! is the REST implementation.

pub mod artifacts;
pub mod azure;
pub mod compute;
pub mod datastore;
pub mod error;
pub mod job;
pub mod platform;
pub mod progress;
pub mod registry;
pub mod settings;
pub mod snapshot;
pub mod submitter;
pub mod workspace;

#[cfg(test)]
pub(crate) mod mock;

pub use artifacts::{plan_outputs, DownloadedArtifact, LaunchReport, OutputAction, OUTPUT_PREFIX};
pub use azure::AzureMlClient;
pub use compute::{resolve_compute, ComputeTarget, ProvisioningConfig, ProvisioningState, PROVISIONING_TIMEOUT};
pub use datastore::{bind_datastore, BlobDatastoreSpec, DatastoreRef};
pub use error::{LaunchError, LaunchResult};
pub use job::{EnvironmentRef, RunHandle, RunId, RunSpec, RunStatus, ENTRY_SCRIPT};
pub use platform::{DatastoreRegistry, MlPlatform};
pub use progress::{LaunchEvent, ProgressSink, TracingProgressSink};
pub use registry::{is_model_file, model_name_for, RegisteredModel, MODEL_EXTENSIONS};
pub use settings::{LaunchSettings, SettingsFile, StorageSettings};
pub use snapshot::SourceSnapshot;
pub use submitter::JobSubmitter;
pub use workspace::{Workspace, WorkspaceConfig};
