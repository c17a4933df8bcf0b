//! Command type definitions shared between main.rs and tests.

use amlrun_training::settings::ACCOUNT_KEY_ENV;
use amlrun_training::LaunchSettings;
use clap::Args;
use std::path::PathBuf;

/// Launch flags. Every flag is optional; unset flags fall back to settings files and defaults.
///
/// The underscore spellings (`--config_path`, ...) are accepted as aliases.
#[derive(Args, Debug, Clone, Default)]
pub struct LaunchArgs {
    /// Path to the workspace config.json (or a directory containing one)
    #[arg(long, alias = "config_path", env = "AMLRUN_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Local directory for model outputs. Leave empty to skip downloading
    #[arg(long, alias = "download_path", env = "AMLRUN_DOWNLOAD_PATH")]
    pub download_path: Option<String>,

    /// Compute cluster name
    #[arg(long, alias = "cluster_name", env = "AMLRUN_CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// Environment (docker image) name
    #[arg(long, alias = "environment_name", env = "AMLRUN_ENVIRONMENT_NAME")]
    pub environment_name: Option<String>,

    /// Experiment name shown in the workspace
    #[arg(long, alias = "experiment_name", env = "AMLRUN_EXPERIMENT_NAME")]
    pub experiment_name: Option<String>,

    /// Display name for the run. Leave empty for a generated name
    #[arg(long, alias = "run_name", env = "AMLRUN_RUN_NAME")]
    pub run_name: Option<String>,

    /// Register .h5/.hdf5 outputs as models
    #[arg(
        long,
        alias = "register_model",
        env = "AMLRUN_REGISTER_MODEL",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub register_model: Option<bool>,

    /// Bind (get or register) the blob datastore before submitting
    #[arg(long, env = "AMLRUN_BIND_DATASTORE", num_args = 0..=1, default_missing_value = "true")]
    pub bind_datastore: Option<bool>,

    /// Directory uploaded as the run's source snapshot (default: current directory)
    #[arg(long, env = "AMLRUN_SOURCE_DIR")]
    pub source_dir: Option<PathBuf>,

    /// Name of the blob datastore in the workspace
    #[arg(long, alias = "blob_datastore_name", env = "AMLRUN_DATASTORE_NAME")]
    pub blob_datastore_name: Option<String>,

    /// Name of the blob container
    #[arg(long, alias = "container_name", env = "AMLRUN_CONTAINER_NAME")]
    pub container_name: Option<String>,

    /// Storage account name
    #[arg(long, alias = "account_name", env = "AMLRUN_ACCOUNT_NAME")]
    pub account_name: Option<String>,

    /// Storage account access key
    #[arg(long, alias = "account_key", env = ACCOUNT_KEY_ENV, hide_env_values = true)]
    pub account_key: Option<String>,

    #[arg(long, alias = "return_counts", hide = true, num_args = 0..=1, default_missing_value = "true")]
    pub return_counts: Option<bool>,

    #[arg(long, hide = true)]
    pub mode: Option<String>,

    #[arg(long, hide = true)]
    pub port: Option<String>,

    #[arg(long, hide = true)]
    pub host: Option<String>,
}

impl LaunchArgs {
    /// Overlay explicitly given flags onto `settings`.
    pub fn apply(&self, settings: &mut LaunchSettings) {
        if let Some(ref v) = self.config_path {
            settings.config_path = v.clone();
        }
        if let Some(ref v) = self.download_path {
            settings.download_path = v.clone();
        }
        if let Some(ref v) = self.cluster_name {
            settings.cluster_name = v.clone();
        }
        if let Some(ref v) = self.environment_name {
            settings.environment_name = v.clone();
        }
        if let Some(ref v) = self.experiment_name {
            settings.experiment_name = v.clone();
        }
        if let Some(ref v) = self.run_name {
            settings.run_name = v.clone();
        }
        if let Some(v) = self.register_model {
            settings.register_model = v;
        }
        if let Some(v) = self.bind_datastore {
            settings.bind_datastore = v;
        }
        if let Some(ref v) = self.source_dir {
            settings.source_dir = v.clone();
        }
        if let Some(ref v) = self.blob_datastore_name {
            settings.storage.datastore_name = v.clone();
        }
        if let Some(ref v) = self.container_name {
            settings.storage.container_name = v.clone();
        }
        if let Some(ref v) = self.account_name {
            settings.storage.account_name = v.clone();
        }
        if let Some(ref v) = self.account_key {
            settings.storage.account_key = Some(v.clone());
        }
        if let Some(v) = self.return_counts {
            settings.placeholders.return_counts = v;
        }
        if let Some(ref v) = self.mode {
            settings.placeholders.mode = v.clone();
        }
        if let Some(ref v) = self.port {
            settings.placeholders.port = v.clone();
        }
        if let Some(ref v) = self.host {
            settings.placeholders.host = v.clone();
        }
    }
}

/// Connection options for the Azure ML REST adapter.
#[derive(Args, Debug, Clone)]
pub struct PlatformArgs {
    /// Seconds between status polls while waiting on compute or runs
    #[arg(long, default_value_t = 10, env = "AMLRUN_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: u64,

    /// Registered code asset id used instead of uploading the source directory
    #[arg(long, env = "AMLRUN_CODE_ASSET_ID")]
    pub code_asset_id: Option<String>,

    /// Resource Manager endpoint override
    #[arg(long, hide = true, env = "AMLRUN_ARM_ENDPOINT")]
    pub arm_endpoint: Option<String>,

    /// Run-history/artifact endpoint override
    #[arg(long, hide = true, env = "AMLRUN_DATA_ENDPOINT")]
    pub data_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_overrides_given_flags() {
        let args = LaunchArgs {
            cluster_name: Some("gpu".to_string()),
            register_model: Some(true),
            account_key: Some("k".to_string()),
            ..Default::default()
        };
        let mut settings = LaunchSettings::default();
        args.apply(&mut settings);

        assert_eq!(settings.cluster_name, "gpu");
        assert!(settings.register_model);
        assert_eq!(settings.storage.account_key.as_deref(), Some("k"));
        assert_eq!(settings.environment_name, "taming");
    }
}
