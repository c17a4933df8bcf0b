//! Submit command implementation.

use crate::commands::types::PlatformArgs;
use amlrun_training::{AzureMlClient, JobSubmitter, LaunchReport, LaunchSettings, TracingProgressSink};
use anyhow::{Context, Result};
use colored::Colorize;
use std::time::Duration;

pub async fn execute(settings: LaunchSettings, platform: PlatformArgs, json_output: bool) -> Result<()> {
    let mut client = AzureMlClient::from_env()
        .context("Failed to authenticate. Set AZURE_ACCESS_TOKEN (e.g. `az account get-access-token`).")?
        .with_poll_interval(Duration::from_secs(platform.poll_interval_secs.max(1)));
    if let Some(endpoint) = platform.arm_endpoint {
        client = client.with_arm_endpoint(endpoint);
    }
    if let Some(endpoint) = platform.data_endpoint {
        client = client.with_data_endpoint(endpoint);
    }
    if let Some(code) = platform.code_asset_id {
        client = client.with_code_asset(code);
    }

    let report = JobSubmitter::new(&client)
        .with_datastores(&client)
        .launch(&settings, &TracingProgressSink)
        .await
        .with_context(|| format!("Launch in experiment '{}' failed", settings.experiment_name))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &LaunchReport) {
    println!();
    println!("{}", "Run complete".bold().green());
    println!("  Run:         {}", report.run_id.cyan());
    if let Some(ref name) = report.display_name {
        println!("  Name:        {}", name);
    }
    println!("  Experiment:  {}", report.experiment);
    println!("  Compute:     {}", report.compute.dimmed());
    println!("  Environment: {}", report.environment.dimmed());
    println!("  Finished:    {}", report.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));

    if !report.downloads.is_empty() {
        println!();
        println!("{}", format!("Downloaded ({})", report.downloads.len()).bold().cyan());
        for d in &report.downloads {
            println!("  {} {}", d.remote, format!("-> {}", d.local.display()).dimmed());
        }
    }

    if !report.models.is_empty() {
        println!();
        println!("{}", format!("Registered models ({})", report.models.len()).bold().cyan());
        for m in &report.models {
            println!("  {}:{} {}", m.name.cyan(), m.version, m.path.dimmed());
        }
    }
    println!();
}
