//! Running compiled artifacts.
//!
//! [`ExecutionHost::execute`] loads an artifact into a fresh
//! [`ExecutionBoundary`], calls its entry point and turns whatever happens
//! into a [`RunOutcome`]. Failures and cancellation are reported through
//! the session's output bridge; they are outcomes, not errors.

use crate::boundary::{BoundaryStats, BoundaryTracker, EpochTicker, ExecutionBoundary};
use crate::compiler::CompiledArtifact;
use crate::host_functions::{HostState, MemoryLimiter, SnippetFailure};
use crate::resolver::ReferenceSet;
use serde::{Deserialize, Serialize};
use snipbox_core::{EngineConfig, Error, Result};
use snipbox_terminal::{Color, Decoration, OutputBridge, Style, TerminalSession, ambient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use wasmtime::{Engine, FrameInfo, Trap, WasmBacktrace};

const ERROR_STYLE: Style = Style::PLAIN.fg(Color::rgb(255, 85, 85));
const NOTICE_STYLE: Style = Style::PLAIN.fg(Color::rgb(255, 215, 0));

/// Notice written when a run is cancelled.
pub const CANCELLED_NOTICE: &str = "Execution cancelled.";

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Compilation failed; nothing ran.
    CompileFailed,
    /// The entry point returned.
    Completed {
        /// Returned exit code, zero for entry points without a result
        exit_code: i32,
    },
    /// The snippet raised an unhandled failure, trapped, or timed out.
    Failed {
        /// Unwrapped failure message
        message: String,
        /// Trimmed trace, innermost frame first
        trace: Vec<String>,
    },
    /// The run was cancelled.
    Cancelled,
}

impl RunOutcome {
    /// Whether the snippet ran to completion.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

enum Finish {
    Returned(anyhow::Result<i32>),
    Cancelled,
    TimedOut(Duration),
}

/// Loads and runs compiled artifacts, one at a time.
#[derive(Debug)]
pub struct ExecutionHost {
    engine: Engine,
    config: EngineConfig,
    tracker: Arc<BoundaryTracker>,
    gate: Mutex<()>,
    _ticker: EpochTicker,
}

impl ExecutionHost {
    /// Creates a host running on `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WasmError`] if the epoch ticker cannot start.
    pub fn new(engine: Engine, config: EngineConfig) -> Result<Self> {
        let ticker = EpochTicker::start(&engine, config.epoch_tick)?;
        Ok(Self {
            engine,
            config,
            tracker: Arc::new(BoundaryTracker::new()),
            gate: Mutex::new(()),
            _ticker: ticker,
        })
    }

    /// Boundary counters.
    #[must_use]
    pub fn boundary_stats(&self) -> BoundaryStats {
        self.tracker.stats()
    }

    /// Runs `artifact` against `session`.
    ///
    /// While the run is active the session's output bridge is the ambient
    /// console. Runs are serialized: a second call waits until the first
    /// has unloaded its boundary.
    ///
    /// # Errors
    ///
    /// - [`Error::CompileFailure`] if the artifact has no image; nothing
    ///   is loaded and the ambient console is untouched
    /// - [`Error::MissingEntryPoint`] if the artifact has no entry point;
    ///   reported through the bridge before anything is loaded
    /// - [`Error::WasmError`] if the boundary cannot be created
    pub async fn execute(
        &self,
        artifact: &CompiledArtifact,
        references: &ReferenceSet,
        session: &TerminalSession,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let Some(module) = artifact.module() else {
            return Err(Error::CompileFailure {
                error_count: artifact.error_count(),
            });
        };

        let _gate = self.gate.lock().await;
        let output = session.output().clone();
        let _ambient = ambient::install(output.clone());

        let Some(entry) = artifact.entry() else {
            let err = Error::MissingEntryPoint {
                reason: "module exports no `main` or `_start` function".to_string(),
            };
            report_failure(&output, &err.to_string(), &[]).await;
            return Err(err);
        };

        let state = HostState::new(
            output.clone(),
            session.input().clone(),
            cancel.clone(),
            MemoryLimiter::new(self.config.memory_limit.bytes()),
        );
        let mut boundary = ExecutionBoundary::create(&self.engine, state, Arc::clone(&self.tracker))?;

        tracing::info!(session = %session.id(), entry = %entry.name, "run started");
        let started = Instant::now();

        let finish = {
            let run = async {
                boundary.load(module, references).await?;
                boundary.invoke(entry).await
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => Finish::Cancelled,
                () = session.cancel_token().cancelled() => Finish::Cancelled,
                result = run => Finish::Returned(result),
                () = deadline(self.config.execution_timeout) => {
                    Finish::TimedOut(self.config.execution_timeout.unwrap_or_default())
                }
            }
        };
        let host_calls = boundary.host_calls();
        drop(boundary);

        let outcome = match finish {
            Finish::Returned(Ok(exit_code)) => RunOutcome::Completed { exit_code },
            Finish::Returned(Err(e)) => {
                let (message, trace) = describe_failure(&e, self.config.max_trace_frames);
                report_failure(&output, &message, &trace).await;
                RunOutcome::Failed { message, trace }
            }
            Finish::TimedOut(budget) => {
                let message = Error::Timeout {
                    operation: "snippet execution".to_string(),
                    duration_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                }
                .to_string();
                report_failure(&output, &message, &[]).await;
                RunOutcome::Failed {
                    message,
                    trace: Vec::new(),
                }
            }
            Finish::Cancelled => {
                if let Err(e) = output.write_styled_line(CANCELLED_NOTICE, NOTICE_STYLE).await {
                    tracing::warn!(error = %e, "failed to write cancellation notice");
                }
                RunOutcome::Cancelled
            }
        };

        if let Err(e) = output.flush().await {
            tracing::warn!(error = %e, "failed to flush run output");
        }

        tracing::info!(
            session = %session.id(),
            outcome = ?outcome,
            host_calls,
            elapsed_ms = started.elapsed().as_millis(),
            "run finished"
        );
        Ok(outcome)
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Recovers the snippet-level message and trace from an invocation error.
fn describe_failure(err: &anyhow::Error, max_frames: usize) -> (String, Vec<String>) {
    let message = if let Some(failure) = err.downcast_ref::<SnippetFailure>() {
        failure.message.clone()
    } else if let Some(trap) = err.downcast_ref::<Trap>() {
        trap.to_string()
    } else {
        err.root_cause().to_string()
    };

    let trace = err
        .downcast_ref::<WasmBacktrace>()
        .map(|backtrace| {
            backtrace
                .frames()
                .iter()
                .take(max_frames)
                .map(format_frame)
                .collect()
        })
        .unwrap_or_default();

    (message, trace)
}

fn format_frame(frame: &FrameInfo) -> String {
    let function = frame
        .func_name()
        .map_or_else(|| format!("<func #{}>", frame.func_index()), str::to_string);
    let module = frame.module().name().unwrap_or("snippet");
    match frame.module_offset() {
        Some(offset) => format!("at {function} ({module}+{offset:#x})"),
        None => format!("at {function} ({module})"),
    }
}

async fn report_failure(output: &OutputBridge, message: &str, trace: &[String]) {
    let mut result = output.write_styled_line(&format!("Error: {message}"), ERROR_STYLE).await;
    for frame in trace {
        if result.is_err() {
            break;
        }
        result = output
            .write_styled_line(&format!("    {frame}"), Style::PLAIN.decorate(Decoration::DIM))
            .await;
    }
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to report runtime failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_failure_is_unwrapped() {
        let err = anyhow::Error::new(SnippetFailure {
            message: "boom".to_string(),
        })
        .context("error while executing at wasm backtrace");
        let (message, trace) = describe_failure(&err, 8);
        assert_eq!(message, "boom");
        assert!(trace.is_empty());
    }

    #[test]
    fn test_trap_message() {
        let err = anyhow::Error::new(Trap::UnreachableCodeReached);
        let (message, _) = describe_failure(&err, 8);
        assert!(message.contains("unreachable"));
    }

    #[test]
    fn test_root_cause_fallback() {
        let err = anyhow::anyhow!("unknown import").context("instantiation failed");
        let (message, _) = describe_failure(&err, 8);
        assert_eq!(message, "unknown import");
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(RunOutcome::Completed { exit_code: 3 }).unwrap();
        assert_eq!(json["kind"], "completed");
        assert_eq!(json["exit_code"], 3);
        assert!(RunOutcome::Completed { exit_code: 0 }.is_completed());
        assert!(!RunOutcome::Cancelled.is_completed());
    }
}
