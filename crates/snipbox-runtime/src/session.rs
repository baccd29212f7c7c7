//! Run sessions: the compile-then-execute lifecycle on one terminal.
//!
//! A [`RunSession`] runs one snippet at a time. Its state moves through
//!
//! ```text
//! Idle -> Compiling -> CompileFailed
//!                   -> Compiled -> Executing -> Completed | Failed | Cancelled
//! ```
//!
//! and every change is published on a watch channel. The terminal state
//! stays visible until the next run starts, which passes through `Idle`
//! again.
//!
//! Starting a run while another is active cancels the active one and
//! waits for it to clean up. Queued requests start in arrival order; a
//! request that is itself superseded while waiting ends as `Cancelled`
//! without compiling.

use crate::compiler::CompileReport;
use crate::executor::RunOutcome;
use crate::runtime::SnippetEngine;
use serde::{Deserialize, Serialize};
use snipbox_core::{Error, Result};
use snipbox_terminal::TerminalSession;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a session's current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing is running.
    Idle,
    /// The submission is being compiled.
    Compiling,
    /// Compilation produced errors.
    CompileFailed,
    /// Compilation succeeded; execution is about to start.
    Compiled,
    /// The entry point is running.
    Executing,
    /// The entry point returned.
    Completed,
    /// The snippet failed.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl RunState {
    /// Whether the state ends a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CompileFailed | Self::Completed | Self::Failed | Self::Cancelled
        )
    }

    /// Whether a run is in progress.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Compiling | Self::Compiled | Self::Executing)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Compiling => "compiling",
            Self::CompileFailed => "compile_failed",
            Self::Compiled => "compiled",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What one call to [`RunSession::run`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Compile result; absent if the run was superseded before compiling
    pub compile: Option<CompileReport>,
    /// How the run ended
    pub outcome: RunOutcome,
}

impl RunReport {
    /// The snippet's exit code, `None` if the run was cancelled.
    ///
    /// # Errors
    ///
    /// - [`Error::CompileFailure`] if the snippet did not compile
    /// - [`Error::RuntimeFailure`] if it failed while running
    pub fn into_result(self) -> Result<Option<i32>> {
        match self.outcome {
            RunOutcome::Completed { exit_code } => Ok(Some(exit_code)),
            RunOutcome::Cancelled => Ok(None),
            RunOutcome::Failed { message, trace } => Err(Error::RuntimeFailure { message, trace }),
            RunOutcome::CompileFailed => Err(Error::CompileFailure {
                error_count: self.compile.map_or(0, |report| {
                    report.diagnostics.iter().filter(|d| d.is_error()).count()
                }),
            }),
        }
    }
}

type ActiveRun = Option<(u64, CancellationToken)>;

/// Clears the active-run slot on every exit path of a run.
struct ActiveGuard<'a> {
    slot: &'a Mutex<ActiveRun>,
    id: u64,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(id, _)| *id == self.id) {
            *slot = None;
        }
    }
}

/// Runs snippets on one terminal session, one at a time.
#[derive(Debug)]
pub struct RunSession {
    engine: Arc<SnippetEngine>,
    terminal: TerminalSession,
    state: watch::Sender<RunState>,
    gate: tokio::sync::Mutex<()>,
    active: Mutex<ActiveRun>,
    next_run: AtomicU64,
}

impl RunSession {
    /// Wraps `terminal` for running snippets on `engine`.
    #[must_use]
    pub fn new(engine: Arc<SnippetEngine>, terminal: TerminalSession) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            engine,
            terminal,
            state,
            gate: tokio::sync::Mutex::new(()),
            active: Mutex::new(None),
            next_run: AtomicU64::new(1),
        }
    }

    fn active(&self) -> MutexGuard<'_, ActiveRun> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: RunState) {
        tracing::debug!(session = %self.terminal.id(), %state, "run state");
        self.state.send_replace(state);
    }

    /// The terminal session runs write to.
    #[must_use]
    pub const fn terminal(&self) -> &TerminalSession {
        &self.terminal
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Receiver observing every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Whether a run is in progress or waiting to start.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active().is_some()
    }

    /// Cancels the active run, if any.
    pub fn cancel(&self) {
        if let Some((id, token)) = self.active().as_ref() {
            tracing::info!(session = %self.terminal.id(), run = id, "cancelling run");
            token.cancel();
        }
    }

    /// Cancels the active run and closes the terminal session.
    pub fn close(&self) {
        self.cancel();
        self.terminal.close();
    }

    /// Compiles and runs `source`.
    ///
    /// # Errors
    ///
    /// Returns an error only for engine-level problems such as a boundary
    /// that cannot be created. Compile errors, snippet failures, a missing
    /// entry point and cancellation are all reported through
    /// [`RunReport::outcome`].
    pub async fn run(&self, source: &str) -> Result<RunReport> {
        let id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let cancel = self.terminal.cancel_token().child_token();

        if let Some((previous, token)) = self.active().replace((id, cancel.clone())) {
            tracing::info!(session = %self.terminal.id(), run = previous, "superseded by a new run");
            token.cancel();
        }
        let _active = ActiveGuard {
            slot: &self.active,
            id,
        };

        let _gate = self.gate.lock().await;
        if cancel.is_cancelled() {
            self.publish(RunState::Cancelled);
            return Ok(RunReport {
                compile: None,
                outcome: RunOutcome::Cancelled,
            });
        }

        self.publish(RunState::Idle);
        self.publish(RunState::Compiling);
        let artifact = self.engine.compile(source).await;
        let compile = artifact.report();

        if !artifact.success() {
            self.publish(RunState::CompileFailed);
            return Ok(RunReport {
                compile: Some(compile),
                outcome: RunOutcome::CompileFailed,
            });
        }

        self.publish(RunState::Compiled);
        self.publish(RunState::Executing);

        let outcome = match self.engine.execute(&artifact, &self.terminal, &cancel).await {
            Ok(outcome) => outcome,
            Err(e @ Error::MissingEntryPoint { .. }) => RunOutcome::Failed {
                message: e.to_string(),
                trace: Vec::new(),
            },
            Err(e) => {
                self.publish(RunState::Failed);
                return Err(e);
            }
        };

        self.publish(match outcome {
            RunOutcome::Completed { .. } => RunState::Completed,
            RunOutcome::Failed { .. } => RunState::Failed,
            RunOutcome::Cancelled => RunState::Cancelled,
            RunOutcome::CompileFailed => RunState::CompileFailed,
        });

        Ok(RunReport {
            compile: Some(compile),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::CompileFailed.is_terminal());
        assert!(!RunState::Idle.is_terminal());
        assert!(RunState::Executing.is_active());
        assert!(!RunState::Cancelled.is_active());
    }

    #[test]
    fn test_report_into_result() {
        let report = |outcome| RunReport {
            compile: None,
            outcome,
        };
        assert_eq!(
            report(RunOutcome::Completed { exit_code: 4 }).into_result().unwrap(),
            Some(4)
        );
        assert_eq!(report(RunOutcome::Cancelled).into_result().unwrap(), None);

        let err = report(RunOutcome::Failed {
            message: "boom".to_string(),
            trace: vec!["main".to_string()],
        })
        .into_result()
        .unwrap_err();
        assert!(err.is_runtime_failure());
        assert!(err.to_string().contains("boom"));

        let err = report(RunOutcome::CompileFailed).into_result().unwrap_err();
        assert!(err.is_compile_failure());
    }

    #[test]
    fn test_state_names_match_serde() {
        for state in [
            RunState::Idle,
            RunState::Compiling,
            RunState::CompileFailed,
            RunState::Compiled,
            RunState::Executing,
            RunState::Completed,
            RunState::Failed,
            RunState::Cancelled,
        ] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, state.to_string());
        }
    }
}
