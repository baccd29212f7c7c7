//! Run command implementation.
//!
//! Compiles a snippet and runs it against this process's terminal. Ctrl-C
//! cancels the run; the snippet gets its cancellation notice and the
//! process exits with code 130.

use crate::cli::EngineArgs;
use crate::commands::common::{
    build_engine, effective_config, read_source, report_exit_code, source_name,
};
use crate::formatters::{diagnostics, format_output};
use crate::terminal::StdioTransport;
use anyhow::Result;
use snipbox_core::Severity;
use snipbox_core::cli::{ExitCode, OutputFormat};
use snipbox_runtime::{RunOutcome, RunReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs the run command.
///
/// # Errors
///
/// Returns an error if the snippet cannot be read or the engine fails
/// outside the snippet's own control.
pub async fn run(
    file: PathBuf,
    args: EngineArgs,
    config_path: Option<&Path>,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    let source = read_source(&file).await?;
    let engine = build_engine(effective_config(config_path, &args)?).await?;

    let transport = Arc::new(StdioTransport::new());
    let session = engine.open_session(transport.clone());
    let interrupt = transport.interrupt_token().clone();

    let report = {
        let run = session.run(&source);
        tokio::pin!(run);
        tokio::select! {
            report = &mut run => report?,
            () = interrupted(&interrupt) => {
                info!("interrupt received, cancelling run");
                session.cancel();
                run.await?
            }
        }
    };
    session.close();
    debug!(stats = ?engine.stats(), "engine statistics");

    print_report(&source_name(&file), &report, output_format)?;
    Ok(report_exit_code(report))
}

async fn interrupted(interrupt: &CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
        () = interrupt.cancelled() => {}
    }
}

fn print_report(file: &str, report: &RunReport, output_format: OutputFormat) -> Result<()> {
    match output_format {
        OutputFormat::Pretty => {
            let Some(compile) = &report.compile else {
                return Ok(());
            };
            if report.outcome == RunOutcome::CompileFailed {
                eprintln!("{}", diagnostics::format_all(file, &compile.diagnostics));
            } else {
                for diagnostic in compile.diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
                    eprintln!("{}", diagnostics::format_one(file, diagnostic));
                }
            }
        }
        format => println!("{}", format_output(report, format)?),
    }
    Ok(())
}
