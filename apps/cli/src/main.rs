//! amlrun CLI - submit training runs to an Azure Machine Learning workspace
//!
//! Resolves the workspace, compute cluster and environment, submits the
//! training script, waits for it, then downloads and/or registers the
//! model files it produced.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, shells};
use commands::{settings, submit, LaunchArgs, PlatformArgs};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// amlrun - submit training runs to Azure Machine Learning
#[derive(Parser, Debug)]
#[command(
    name = "amlrun",
    author,
    version,
    about = "Submit a training run to Azure Machine Learning and collect its models",
    long_about = "amlrun resolves a workspace, compute cluster and environment, submits the training script,\nwaits for it to finish, and downloads or registers the model files it wrote under outputs/models/."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "AMLRUN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Extra TOML settings file, layered over ~/.amlrun/config.toml and ./.amlrunrc
    #[arg(long, global = true, env = "AMLRUN_SETTINGS_FILE")]
    settings_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit the training run and wait for it
    ///
    /// Creates the compute cluster if it does not exist, blocks until the run
    /// finishes, then processes files under outputs/models/.
    Submit {
        #[command(flatten)]
        launch: LaunchArgs,

        #[command(flatten)]
        platform: PlatformArgs,

        /// Output the launch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved settings without contacting the workspace
    Settings {
        #[command(flatten)]
        launch: LaunchArgs,

        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Handle completion generation
    if let Ok(shell) = std::env::var("AMLRUN_GENERATE_COMPLETIONS") {
        let mut cmd = Args::command();
        match shell.as_str() {
            "bash" => generate(shells::Bash, &mut cmd, "amlrun", &mut std::io::stdout()),
            "zsh" => generate(shells::Zsh, &mut cmd, "amlrun", &mut std::io::stdout()),
            "fish" => generate(shells::Fish, &mut cmd, "amlrun", &mut std::io::stdout()),
            "powershell" => generate(shells::PowerShell, &mut cmd, "amlrun", &mut std::io::stdout()),
            "elvish" => generate(shells::Elvish, &mut cmd, "amlrun", &mut std::io::stdout()),
            _ => anyhow::bail!("Unknown shell: {}. Supported: bash, zsh, fish, powershell, elvish", shell),
        }
        return Ok(());
    }

    let args = Args::parse();

    let settings_file = config::load_settings_file(args.settings_file.as_deref())?;

    // Initialize tracing
    let level_name = args.log_level.as_deref().or(settings_file.log_level.as_deref()).unwrap_or("info");
    let level = match level_name {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Submit { launch, platform, json } => {
            let resolved = config::resolve_settings(&settings_file, &launch);
            submit::execute(resolved, platform, json).await?;
        }
        Command::Settings { launch, json } => {
            let resolved = config::resolve_settings(&settings_file, &launch);
            settings::execute(&resolved, json)?;
        }
    }

    Ok(())
}
