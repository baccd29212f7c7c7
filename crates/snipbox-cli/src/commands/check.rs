//! Check command implementation.
//!
//! Compiles a snippet and reports its diagnostics without running it.

use crate::cli::EngineArgs;
use crate::commands::common::{build_engine, effective_config, read_source, source_name};
use crate::formatters::{diagnostics, format_output};
use anyhow::Result;
use serde::Serialize;
use snipbox_core::cli::{ExitCode, OutputFormat};
use snipbox_runtime::CompileReport;
use std::path::{Path, PathBuf};
use tracing::info;

/// Result of checking one snippet.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Checked file
    pub file: String,
    /// Compile result
    #[serde(flatten)]
    pub report: CompileReport,
}

/// Runs the check command.
///
/// Returns [`ExitCode::COMPILE_ERROR`] when the snippet has errors. With
/// `include_image` the structured output carries the image bytes.
///
/// # Errors
///
/// Returns an error if the snippet cannot be read or the engine cannot start.
pub async fn run(
    file: PathBuf,
    include_image: bool,
    args: EngineArgs,
    config_path: Option<&Path>,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    let source = read_source(&file).await?;
    let engine = build_engine(effective_config(config_path, &args)?).await?;

    let artifact = engine.compile(&source).await;
    info!(
        file = %file.display(),
        success = artifact.success(),
        errors = artifact.error_count(),
        "checked snippet"
    );

    let result = CheckResult {
        file: source_name(&file),
        report: if include_image {
            artifact.report_with_image()
        } else {
            artifact.report()
        },
    };

    match output_format {
        OutputFormat::Pretty => {
            println!("{}", diagnostics::format_all(&result.file, &result.report.diagnostics));
        }
        format => println!("{}", format_output(&result, format)?),
    }

    Ok(if result.report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::COMPILE_ERROR
    })
}
