//! CLI settings loading and merging.

use crate::commands::types::LaunchArgs;
use amlrun_training::{LaunchSettings, SettingsFile};
use anyhow::{Context, Result};
use std::path::Path;

/// Load and merge settings files.
///
/// Precedence (lowest first):
/// 1. Global settings file (~/.amlrun/config.toml)
/// 2. Local settings file (./.amlrunrc)
/// 3. Explicit `--settings-file`
pub fn load_settings_file(explicit: Option<&Path>) -> Result<SettingsFile> {
    let mut file = SettingsFile::discover_and_load().context("Failed to load settings files")?;
    if let Some(path) = explicit {
        let extra = SettingsFile::load_from_file(path)
            .with_context(|| format!("Failed to load settings file: {}", path.display()))?;
        file.merge(&extra);
    }
    Ok(file)
}

/// Resolve launch settings: defaults, then settings files, then flags/env.
pub fn resolve_settings(file: &SettingsFile, args: &LaunchArgs) -> LaunchSettings {
    let mut settings = LaunchSettings::default();
    settings.apply_file(file);
    args.apply(&mut settings);
    settings
}
