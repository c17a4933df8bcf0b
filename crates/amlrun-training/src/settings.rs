//! Launch settings and settings-file support.
//!
//! Settings are resolved once at startup and never mutated afterwards. Values
//! come from (highest precedence first) command-line flags, `AMLRUN_*`
//! environment variables, an explicit `--settings-file`, the local `.amlrunrc`,
//! the global `~/.amlrun/config.toml`, and finally the built-in defaults below.

use crate::error::{LaunchError, LaunchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_CLUSTER_NAME: &str = "wsi-compute";
pub const DEFAULT_ENVIRONMENT_NAME: &str = "taming";
pub const DEFAULT_EXPERIMENT_NAME: &str = "taming-transformers-master";
pub const DEFAULT_DATASTORE_NAME: &str = "weldseamimages";
pub const DEFAULT_CONTAINER_NAME: &str = "daimler 4418 datasets";
pub const DEFAULT_ACCOUNT_NAME: &str = "wsiblobstorage";

/// Environment variable the storage account key is read from.
pub const ACCOUNT_KEY_ENV: &str = "AZURE_STORAGE_ACCOUNT_KEY";

/// Storage account binding accepted on the command line.
///
/// Only consulted when datastore binding is enabled.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub datastore_name: String,
    pub container_name: String,
    pub account_name: String,
    #[serde(skip_serializing)]
    pub account_key: Option<String>,
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("datastore_name", &self.datastore_name)
            .field("container_name", &self.container_name)
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            datastore_name: DEFAULT_DATASTORE_NAME.to_string(),
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            account_name: DEFAULT_ACCOUNT_NAME.to_string(),
            account_key: None,
        }
    }
}

/// Flags accepted for compatibility with older launch scripts. Nothing reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderSettings {
    pub return_counts: bool,
    pub mode: String,
    pub port: String,
    pub host: String,
}

impl Default for PlaceholderSettings {
    fn default() -> Self {
        Self {
            return_counts: true,
            mode: "client".to_string(),
            port: "52162".to_string(),
            host: "52162".to_string(),
        }
    }
}

/// Fully resolved settings for one launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchSettings {
    /// Path to the workspace descriptor (`config.json`) or a directory holding one.
    pub config_path: PathBuf,
    /// Local directory for model outputs. Blank disables downloading.
    pub download_path: String,
    pub cluster_name: String,
    pub environment_name: String,
    pub experiment_name: String,
    /// Display name applied after completion. Blank keeps the platform-generated name.
    pub run_name: String,
    pub register_model: bool,
    pub bind_datastore: bool,
    /// Directory uploaded as the run's source snapshot.
    pub source_dir: PathBuf,
    pub storage: StorageSettings,
    pub placeholders: PlaceholderSettings,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            download_path: String::new(),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            environment_name: DEFAULT_ENVIRONMENT_NAME.to_string(),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            run_name: String::new(),
            register_model: false,
            bind_datastore: false,
            source_dir: PathBuf::from("."),
            storage: StorageSettings::default(),
            placeholders: PlaceholderSettings::default(),
        }
    }
}

impl LaunchSettings {
    pub fn validate(&self) -> LaunchResult<()> {
        if self.config_path.as_os_str().is_empty() {
            return Err(LaunchError::InvalidSettings("config_path is required".to_string()));
        }
        for (field, value) in [
            ("cluster_name", &self.cluster_name),
            ("environment_name", &self.environment_name),
            ("experiment_name", &self.experiment_name),
        ] {
            if value.trim().is_empty() {
                return Err(LaunchError::InvalidSettings(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// Download directory, if downloading was requested.
    #[must_use]
    pub fn download_dir(&self) -> Option<PathBuf> {
        let trimmed = self.download_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    /// Display name override, if one was given.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        let trimmed = self.run_name.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Overlay values from a settings file onto these settings.
    pub fn apply_file(&mut self, file: &SettingsFile) {
        if let Some(ref v) = file.config_path {
            self.config_path = v.clone();
        }
        if let Some(ref v) = file.download_path {
            self.download_path = v.clone();
        }
        if let Some(ref v) = file.cluster_name {
            self.cluster_name = v.clone();
        }
        if let Some(ref v) = file.environment_name {
            self.environment_name = v.clone();
        }
        if let Some(ref v) = file.experiment_name {
            self.experiment_name = v.clone();
        }
        if let Some(ref v) = file.run_name {
            self.run_name = v.clone();
        }
        if let Some(v) = file.register_model {
            self.register_model = v;
        }
        if let Some(v) = file.bind_datastore {
            self.bind_datastore = v;
        }
        if let Some(ref v) = file.source_dir {
            self.source_dir = v.clone();
        }
        if let Some(ref storage) = file.storage {
            if let Some(ref v) = storage.datastore_name {
                self.storage.datastore_name = v.clone();
            }
            if let Some(ref v) = storage.container_name {
                self.storage.container_name = v.clone();
            }
            if let Some(ref v) = storage.account_name {
                self.storage.account_name = v.clone();
            }
        }
    }
}

/// On-disk TOML settings. Every field is optional; absent fields fall through.
///
/// The storage account key is deliberately not accepted here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub download_path: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub environment_name: Option<String>,
    #[serde(default)]
    pub experiment_name: Option<String>,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub register_model: Option<bool>,
    #[serde(default)]
    pub bind_datastore: Option<bool>,
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub storage: Option<StorageFileSettings>,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFileSettings {
    #[serde(default)]
    pub datastore_name: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
}

impl SettingsFile {
    /// Load settings from a TOML file.
    pub fn load_from_file(path: &Path) -> LaunchResult<Self> {
        if !path.exists() {
            return Err(LaunchError::InvalidSettings(format!(
                "settings file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            LaunchError::InvalidSettings(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get default global settings file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".amlrun")
            .join("config.toml")
    }

    /// Get default local settings file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".amlrunrc")
    }

    /// Discover and merge the global and local settings files.
    ///
    /// Missing files are skipped; a file that exists but fails to parse is an error.
    pub fn discover_and_load() -> LaunchResult<Self> {
        let mut merged = Self::default();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            if path.exists() {
                merged.merge(&Self::load_from_file(&path)?);
            }
        }
        Ok(merged)
    }

    /// Merge another settings file into this one. Values from `other` win when set.
    pub fn merge(&mut self, other: &Self) {
        fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }

        take(&mut self.config_path, &other.config_path);
        take(&mut self.download_path, &other.download_path);
        take(&mut self.cluster_name, &other.cluster_name);
        take(&mut self.environment_name, &other.environment_name);
        take(&mut self.experiment_name, &other.experiment_name);
        take(&mut self.run_name, &other.run_name);
        take(&mut self.register_model, &other.register_model);
        take(&mut self.bind_datastore, &other.bind_datastore);
        take(&mut self.source_dir, &other.source_dir);
        take(&mut self.log_level, &other.log_level);

        if let Some(ref theirs) = other.storage {
            let ours = self.storage.get_or_insert_with(StorageFileSettings::default);
            take(&mut ours.datastore_name, &theirs.datastore_name);
            take(&mut ours.container_name, &theirs.container_name);
            take(&mut ours.account_name, &theirs.account_name);
        }
    }
}
