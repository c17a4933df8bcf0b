//! Print the resolved launch settings without contacting the workspace.

use amlrun_training::LaunchSettings;
use anyhow::Result;

pub fn execute(settings: &LaunchSettings, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(settings)?);
    } else {
        print!("{}", toml::to_string_pretty(settings)?);
    }
    Ok(())
}
