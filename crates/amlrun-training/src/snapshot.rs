//! Source directory snapshot.
//!
//! The run executes against a copy of the local source directory. Files are
//! collected with `.gitignore` and `.amlignore` rules applied, and the
//! snapshot is named by a digest of its contents so an unchanged directory
//! maps to the same code asset.

use crate::error::{LaunchError, LaunchResult};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Ignore file honoured in addition to `.gitignore`.
pub const AML_IGNORE_FILE: &str = ".amlignore";

/// Largest snapshot the platform accepts.
pub const MAX_SNAPSHOT_BYTES: u64 = 300 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    /// Path relative to the snapshot root, `/`-separated.
    pub relative: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub root: PathBuf,
    /// Sorted by relative path.
    pub files: Vec<SnapshotFile>,
    /// Hex SHA-256 over every relative path and file content.
    pub digest: String,
}

impl SourceSnapshot {
    pub fn collect(root: &Path) -> LaunchResult<Self> {
        if !root.is_dir() {
            return Err(LaunchError::InvalidSettings(format!(
                "source directory {} does not exist",
                root.display()
            )));
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .follow_links(false)
            .hidden(false)
            .require_git(false)
            .add_custom_ignore_filename(AML_IGNORE_FILE);
        builder.filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(is_dir
                && matches!(
                    entry.file_name().to_str(),
                    Some(".git" | "__pycache__" | ".ipynb_checkpoints")
                ))
        });

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = entry.map_err(|e| LaunchError::Other(e.into()))?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path().to_path_buf();
            let relative = relative_name(root, &path)?;
            let size = entry.metadata().map_err(|e| LaunchError::Other(e.into()))?.len();
            files.push(SnapshotFile { relative, path, size });
        }
        files.sort_by(|a, b| a.relative.cmp(&b.relative));

        let total: u64 = files.iter().map(|f| f.size).sum();
        if total > MAX_SNAPSHOT_BYTES {
            return Err(LaunchError::InvalidSettings(format!(
                "source directory {} is {} bytes, above the {} byte snapshot limit; exclude files with {}",
                root.display(),
                total,
                MAX_SNAPSHOT_BYTES,
                AML_IGNORE_FILE
            )));
        }

        let mut hasher = Sha256::new();
        for file in &files {
            hasher.update(file.relative.as_bytes());
            hasher.update([0u8]);
            hasher.update(std::fs::read(&file.path)?);
            hasher.update([0u8]);
        }
        let digest = hex::encode(hasher.finalize());

        Ok(Self { root: root.to_path_buf(), files, digest })
    }

    #[must_use]
    pub fn contains(&self, relative: &str) -> bool {
        self.files.iter().any(|f| f.relative == relative)
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Code asset name for this snapshot.
    #[must_use]
    pub fn asset_name(&self) -> String {
        format!("amlrun-{}", &self.digest[..32])
    }
}

fn relative_name(root: &Path, path: &Path) -> LaunchResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        LaunchError::Platform(format!("{} is outside {}", path.display(), root.display()))
    })?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.py"), "print('train')\n").unwrap();
        std::fs::create_dir_all(temp.path().join("configs")).unwrap();
        std::fs::write(temp.path().join("configs").join("custom_vqgan.yaml"), "model: {}\n").unwrap();
        temp
    }

    #[test]
    fn test_collect_lists_files_sorted() {
        let temp = source_dir();
        let snapshot = SourceSnapshot::collect(temp.path()).unwrap();

        let names: Vec<&str> = snapshot.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["configs/custom_vqgan.yaml", "main.py"]);
        assert!(snapshot.contains("main.py"));
        assert_eq!(snapshot.total_bytes(), 15 + 10);
    }

    #[test]
    fn test_collect_honours_amlignore_and_skips_git() {
        let temp = source_dir();
        std::fs::write(temp.path().join(AML_IGNORE_FILE), "data/\n*.ckpt\n").unwrap();
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        std::fs::write(temp.path().join("data").join("images.bin"), "x").unwrap();
        std::fs::write(temp.path().join("last.ckpt"), "x").unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join(".git").join("HEAD"), "ref").unwrap();

        let snapshot = SourceSnapshot::collect(temp.path()).unwrap();
        assert!(!snapshot.contains("data/images.bin"));
        assert!(!snapshot.contains("last.ckpt"));
        assert!(!snapshot.contains(".git/HEAD"));
        assert!(snapshot.contains(AML_IGNORE_FILE));
    }

    #[test]
    fn test_digest_tracks_content() {
        let temp = source_dir();
        let first = SourceSnapshot::collect(temp.path()).unwrap();
        let again = SourceSnapshot::collect(temp.path()).unwrap();
        assert_eq!(first.digest, again.digest);
        assert_eq!(first.asset_name(), again.asset_name());

        std::fs::write(temp.path().join("main.py"), "print('changed')\n").unwrap();
        let changed = SourceSnapshot::collect(temp.path()).unwrap();
        assert_ne!(first.digest, changed.digest);
    }

    #[test]
    fn test_collect_missing_directory() {
        let temp = TempDir::new().unwrap();
        let err = SourceSnapshot::collect(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, LaunchError::InvalidSettings(_)));
    }
}
