//! One remote terminal surface and its bridges.

use crate::input::InputBridge;
use crate::output::OutputBridge;
use crate::transport::TerminalTransport;
use snipbox_core::{SessionId, TerminalConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A terminal surface opened for running snippets.
///
/// Owns the session-wide cancellation token: closing the session
/// unblocks every pending key read, whatever run it belongs to.
#[derive(Debug, Clone)]
pub struct TerminalSession {
    id: SessionId,
    output: OutputBridge,
    input: InputBridge,
    cancel: CancellationToken,
}

impl TerminalSession {
    /// Opens a session over `transport`. Must be called inside a Tokio
    /// runtime, since the output bridge spawns its writer task.
    #[must_use]
    pub fn open(transport: Arc<dyn TerminalTransport>, config: &TerminalConfig) -> Self {
        let id = SessionId::generate();
        let cancel = CancellationToken::new();
        let output = OutputBridge::spawn(id.clone(), Arc::clone(&transport), config);
        let input = InputBridge::new(transport, cancel.clone());
        tracing::debug!(session = %id, columns = config.columns, rows = config.rows, "terminal session opened");

        Self {
            id,
            output,
            input,
            cancel,
        }
    }

    /// Session identity.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Output side.
    #[must_use]
    pub const fn output(&self) -> &OutputBridge {
        &self.output
    }

    /// Input side.
    #[must_use]
    pub const fn input(&self) -> &InputBridge {
        &self.input
    }

    /// Session-wide cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels everything waiting on this session.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(session = %self.id, "terminal session closed");
        }
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[tokio::test]
    async fn test_close_cancels_pending_read() {
        let transport = Arc::new(MemoryTransport::new());
        let session = TerminalSession::open(transport, &TerminalConfig::default());

        let input = session.input().clone();
        let read = tokio::spawn(async move { input.read_key(&CancellationToken::new()).await });
        tokio::task::yield_now().await;

        session.close();
        assert!(session.is_closed());
        assert!(read.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bridges_share_session_id() {
        let session = TerminalSession::open(
            Arc::new(MemoryTransport::new()),
            &TerminalConfig::default(),
        );
        assert_eq!(session.output().session_id(), session.id());
    }
}
