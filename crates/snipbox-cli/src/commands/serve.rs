//! Serve command implementation.
//!
//! Runs a single terminal session driven by JSON-lines messages. See
//! [`crate::protocol`] for the message shapes.
//!
//! When the input ends, key reads fail, runs already in flight finish,
//! and the session closes.

use crate::cli::EngineArgs;
use crate::commands::common::{build_engine, effective_config};
use crate::protocol::{ChannelTransport, ClientMessage, ServerMessage, parse_line};
use anyhow::{Context, Result};
use snipbox_core::cli::ExitCode;
use snipbox_runtime::{RunSession, SnippetEngine};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs the serve command on stdin/stdout.
///
/// # Errors
///
/// Returns an error if the engine cannot start or stdout fails.
pub async fn run(args: EngineArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let engine = build_engine(effective_config(config_path, &args)?).await?;
    let stdin = BufReader::new(tokio::io::stdin());
    serve(engine, stdin, tokio::io::stdout()).await?;
    Ok(ExitCode::SUCCESS)
}

/// Serves one session over `input` and `output` until `input` ends.
///
/// Returns `output` once every message has been written.
///
/// # Errors
///
/// Returns an error if reading `input` or writing `output` fails.
pub async fn serve<R, W>(engine: Arc<SnippetEngine>, input: R, output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (key_tx, key_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_messages(out_rx, output));

    let transport = Arc::new(ChannelTransport::new(out_tx.clone(), key_rx));
    let session = Arc::new(engine.open_session(transport));
    info!(session = %session.terminal().id(), "serving session");

    let states = tokio::spawn(forward_states(Arc::clone(&session), out_tx.clone()));
    let mut runs = JoinSet::new();

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(ClientMessage::Run { source }) => {
                runs.spawn(run_snippet(Arc::clone(&session), source, out_tx.clone()));
            }
            Ok(ClientMessage::Cancel) => session.cancel(),
            Ok(ClientMessage::Key(event)) => {
                let _ = key_tx.send(event);
            }
            Ok(ClientMessage::Resize { columns, rows }) => {
                debug!(columns, rows, "surface resized");
            }
            Err(e) => {
                warn!("rejected message: {e}");
                let _ = out_tx.send(ServerMessage::Error {
                    message: format!("invalid message: {e}"),
                });
            }
        }
    }

    drop(key_tx);
    while runs.join_next().await.is_some() {}
    session.close();
    drop(session);
    // Ends once the session, and with it the state sender, is gone.
    let _ = states.await;
    drop(out_tx);

    writer.await.context("output writer stopped")?
}

async fn run_snippet(
    session: Arc<RunSession>,
    source: String,
    out: mpsc::UnboundedSender<ServerMessage>,
) {
    match session.run(&source).await {
        Ok(report) => {
            if let Some(compile) = report.compile {
                let _ = out.send(ServerMessage::Diagnostics(compile));
            }
            let _ = out.send(ServerMessage::Outcome {
                outcome: report.outcome,
            });
        }
        Err(e) => {
            warn!("run failed: {e}");
            let _ = out.send(ServerMessage::Error {
                message: e.to_string(),
            });
        }
    }
}

async fn forward_states(session: Arc<RunSession>, out: mpsc::UnboundedSender<ServerMessage>) {
    let mut states = session.subscribe();
    drop(session);
    while states.changed().await.is_ok() {
        let state = *states.borrow_and_update();
        if out.send(ServerMessage::State { state }).is_err() {
            break;
        }
    }
}

async fn write_messages<W>(mut rx: mpsc::UnboundedReceiver<ServerMessage>, mut output: W) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = message.to_line()?;
        line.push('\n');
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(output)
}
