//! Optional blob datastore binding.
//!
//! Launches never touch storage unless binding is enabled explicitly. When it
//! is, an existing datastore is reused and a missing one is registered from the
//! storage settings.

use crate::error::{LaunchError, LaunchResult};
use crate::platform::DatastoreRegistry;
use crate::progress::{LaunchEvent, ProgressSink};
use crate::settings::{StorageSettings, ACCOUNT_KEY_ENV};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq)]
pub struct BlobDatastoreSpec {
    pub name: String,
    pub container_name: String,
    pub account_name: String,
    pub account_key: String,
}

impl std::fmt::Debug for BlobDatastoreSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobDatastoreSpec")
            .field("name", &self.name)
            .field("container_name", &self.container_name)
            .field("account_name", &self.account_name)
            .finish_non_exhaustive()
    }
}

impl BlobDatastoreSpec {
    /// Build a registration spec. The account key must have been injected.
    pub fn from_settings(storage: &StorageSettings) -> LaunchResult<Self> {
        let account_key = storage
            .account_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LaunchError::InvalidSettings(format!(
                    "storage account key is required for datastore binding (set {ACCOUNT_KEY_ENV})"
                ))
            })?;

        Ok(Self {
            name: storage.datastore_name.clone(),
            container_name: storage.container_name.clone(),
            account_name: storage.account_name.clone(),
            account_key: account_key.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreRef {
    pub name: String,
    pub id: String,
}

/// Get-or-register the configured blob datastore.
pub async fn bind_datastore(
    registry: &dyn DatastoreRegistry,
    workspace: &Workspace,
    storage: &StorageSettings,
    progress: &dyn ProgressSink,
) -> LaunchResult<DatastoreRef> {
    let spec = BlobDatastoreSpec::from_settings(storage)?;
    match registry.get_datastore(workspace, &spec.name).await {
        Ok(found) => {
            progress.on_event(LaunchEvent::DatastoreBound { name: found.name.clone(), registered: false });
            Ok(found)
        }
        Err(LaunchError::DatastoreNotFound(_)) => {
            let registered = registry.register_blob_datastore(workspace, &spec).await?;
            progress.on_event(LaunchEvent::DatastoreBound { name: registered.name.clone(), registered: true });
            Ok(registered)
        }
        Err(other) => Err(other),
    }
}
