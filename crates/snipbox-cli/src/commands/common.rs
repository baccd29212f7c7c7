//! Common utilities shared across CLI commands.

use crate::cli::EngineArgs;
use crate::commands::config::{EffectiveConfig, load_config};
use anyhow::{Context, Result};
use snipbox_core::cli::ExitCode;
use snipbox_runtime::{RunReport, SnippetEngine};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Reads snippet text from `path`, or from stdin when `path` is `-`.
///
/// # Errors
///
/// Returns an error if the file or stdin cannot be read.
pub async fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read snippet from stdin")?;
        return Ok(text);
    }

    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read snippet {}", path.display()))
}

/// Display name used in diagnostics.
#[must_use]
pub fn source_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

/// Loads the configuration file and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the file is invalid or the overrides are out of range.
pub fn effective_config(config_path: Option<&Path>, args: &EngineArgs) -> Result<EffectiveConfig> {
    let config = load_config(config_path)?;
    config.resolved(args)
}

/// Builds an engine and loads its reference modules.
///
/// Reference failures are logged and surface later as compile diagnostics
/// for snippets that import the missing module.
///
/// # Errors
///
/// Returns an error if the engine cannot start.
pub async fn build_engine(config: EffectiveConfig) -> Result<Arc<SnippetEngine>> {
    let engine = SnippetEngine::new(config.engine, config.resolver, config.terminal)
        .context("failed to start snippet engine")?;

    let references = engine.ensure_references().await;
    for failure in references.failures() {
        warn!("{failure}");
    }
    debug!(loaded = references.len(), "reference modules ready");

    Ok(Arc::new(engine))
}

/// Maps a finished run to the process exit code.
#[must_use]
pub fn report_exit_code(report: RunReport) -> ExitCode {
    match report.into_result() {
        Ok(Some(code)) => ExitCode::from_snippet(code),
        Ok(None) => ExitCode::CANCELLED,
        Err(e) if e.is_compile_failure() => ExitCode::COMPILE_ERROR,
        Err(e) => {
            debug!("{e}");
            ExitCode::RUNTIME_ERROR
        }
    }
}
