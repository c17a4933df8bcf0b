//! Run outputs: which files to fetch or register, and what was fetched.

use crate::error::{LaunchError, LaunchResult};
use crate::registry::{is_model_file, model_name_for, RegisteredModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Run-relative directory the training script writes models to.
pub const OUTPUT_PREFIX: &str = "outputs/models/";

/// What to do with one run output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputAction {
    Download { remote: String, local: PathBuf },
    Register { model_name: String, remote: String },
}

/// Local path for `name` under `download_dir`, keeping the part after [`OUTPUT_PREFIX`].
///
/// Remote names are untrusted: a suffix that is absolute or climbs with `..`
/// would land outside `download_dir` and is rejected.
pub fn local_destination(download_dir: &Path, name: &str) -> LaunchResult<PathBuf> {
    let suffix = Path::new(name.strip_prefix(OUTPUT_PREFIX).unwrap_or(name));
    let escapes = suffix
        .components()
        .any(|c| matches!(c, Component::RootDir | Component::Prefix(_) | Component::ParentDir));
    if escapes || suffix.as_os_str().is_empty() {
        return Err(LaunchError::Platform(format!(
            "output file {name} does not map to a path under {}",
            download_dir.display()
        )));
    }
    Ok(download_dir.join(suffix))
}

/// Decide the downloads and registrations for a run's output files.
///
/// Files outside [`OUTPUT_PREFIX`] are ignored. For each remaining file, in
/// input order, the download (if any) comes before the registration (if any).
pub fn plan_outputs(files: &[String], download_dir: Option<&Path>, register: bool) -> LaunchResult<Vec<OutputAction>> {
    let mut actions = Vec::new();
    for name in files.iter().filter(|f| f.starts_with(OUTPUT_PREFIX)) {
        if let Some(dir) = download_dir {
            actions.push(OutputAction::Download { remote: name.clone(), local: local_destination(dir, name)? });
        }
        if register && is_model_file(name) {
            if let Some(model_name) = model_name_for(name) {
                actions.push(OutputAction::Register { model_name, remote: name.clone() });
            }
        }
    }
    Ok(actions)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedArtifact {
    pub remote: String,
    pub local: PathBuf,
    /// Hex SHA-256 of the local copy.
    pub sha256: String,
}

pub fn sha256_file(path: &Path) -> LaunchResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Record a finished download. The local file must exist.
pub fn downloaded_artifact(remote: String, local: PathBuf) -> LaunchResult<DownloadedArtifact> {
    let sha256 = sha256_file(&local)?;
    Ok(DownloadedArtifact { remote, local, sha256 })
}

/// Outcome of a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchReport {
    pub run_id: String,
    pub experiment: String,
    pub status: String,
    pub display_name: Option<String>,
    pub compute: String,
    pub environment: String,
    pub downloads: Vec<DownloadedArtifact>,
    pub models: Vec<RegisteredModel>,
    pub finished_at: DateTime<Utc>,
}
