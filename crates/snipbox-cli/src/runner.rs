//! Command execution and runtime logic.
//!
//! Contains the command dispatch and logging initialization.

use anyhow::Result;
use snipbox_core::cli::{ExitCode, OutputFormat};
use std::path::Path;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Commands;
use crate::commands;

/// Initializes logging infrastructure.
///
/// Logs go to stderr so they never mix with snippet output. `verbose`
/// forces the debug level; otherwise `RUST_LOG` applies, defaulting to
/// warnings only.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Executes the specified CLI command.
///
/// Routes commands to their respective handlers and returns an exit code.
///
/// # Errors
///
/// Returns an error if command execution fails.
pub async fn execute_command(
    command: Commands,
    config_path: Option<&Path>,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    match command {
        Commands::Check {
            file,
            include_image,
            engine,
        } => commands::check::run(file, include_image, engine, config_path, output_format).await,
        Commands::Run { file, engine } => {
            commands::run::run(file, engine, config_path, output_format).await
        }
        Commands::Serve { engine } => commands::serve::run(engine, config_path).await,
        Commands::Config { action } => {
            commands::config::run(action, config_path, output_format).await
        }
    }
}
