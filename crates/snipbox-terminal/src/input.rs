//! Input bridge: cancellable key reads from the transport.

use crate::error::{Result, TerminalError};
use crate::transport::{KeyEvent, TerminalTransport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Inner {
    transport: Arc<dyn TerminalTransport>,
    session_cancel: CancellationToken,
    pending: AtomicBool,
}

/// Key input for one session.
///
/// At most one read may be outstanding at a time. Reads end early, with
/// no key, when either the caller's token or the session token fires.
#[derive(Debug, Clone)]
pub struct InputBridge {
    inner: Arc<Inner>,
}

struct PendingRead<'a>(&'a AtomicBool);

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InputBridge {
    /// Creates an input bridge bound to the session's cancellation token.
    #[must_use]
    pub fn new(transport: Arc<dyn TerminalTransport>, session_cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                session_cancel,
                pending: AtomicBool::new(false),
            }),
        }
    }

    /// Keys are never buffered locally, so this is always false.
    #[must_use]
    pub const fn key_available(&self) -> bool {
        false
    }

    /// Non-blocking read; there is no local buffer, so always `None`.
    #[must_use]
    pub const fn try_read_key(&self) -> Option<KeyEvent> {
        None
    }

    /// Whether a read is currently outstanding.
    #[must_use]
    pub fn is_read_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Waits for the next key.
    ///
    /// Returns `Ok(None)` when `cancel` or the session token fires first.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::KeyReadPending`] if another read is
    /// outstanding, or the transport's error if the read itself fails.
    pub async fn read_key(&self, cancel: &CancellationToken) -> Result<Option<KeyEvent>> {
        if self.inner.pending.swap(true, Ordering::AcqRel) {
            return Err(TerminalError::KeyReadPending);
        }
        let _pending = PendingRead(&self.inner.pending);

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            () = self.inner.session_cancel.cancelled() => Ok(None),
            key = self.inner.transport.read_key() => key.map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn input() -> (InputBridge, Arc<MemoryTransport>, CancellationToken) {
        let transport = Arc::new(MemoryTransport::new());
        let session = CancellationToken::new();
        (
            InputBridge::new(transport.clone(), session.clone()),
            transport,
            session,
        )
    }

    #[tokio::test]
    async fn test_read_returns_queued_key() {
        let (input, transport, _) = input();
        transport.push_key(KeyEvent::char('q'));
        let key = input.read_key(&CancellationToken::new()).await.unwrap();
        assert_eq!(key, Some(KeyEvent::char('q')));
        assert!(!input.is_read_pending());
    }

    #[tokio::test]
    async fn test_no_local_buffer() {
        let (input, transport, _) = input();
        transport.push_key(KeyEvent::char('q'));
        assert!(!input.key_available());
        assert!(input.try_read_key().is_none());
    }

    #[tokio::test]
    async fn test_caller_cancellation_ends_read() {
        let (input, _transport, _) = input();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        assert_eq!(input.read_key(&cancel).await.unwrap(), None);
        assert!(!input.is_read_pending());
    }

    #[tokio::test]
    async fn test_session_cancellation_ends_read() {
        let (input, _transport, session) = input();
        session.cancel();
        let key = input.read_key(&CancellationToken::new()).await.unwrap();
        assert_eq!(key, None);
    }

    #[tokio::test]
    async fn test_second_read_is_rejected() {
        let (input, _transport, _) = input();
        let first = input.clone();
        let cancel = CancellationToken::new();
        let first_cancel = cancel.clone();
        let handle = tokio::spawn(async move { first.read_key(&first_cancel).await });

        while !input.is_read_pending() {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            input.read_key(&CancellationToken::new()).await,
            Err(TerminalError::KeyReadPending)
        );

        cancel.cancel();
        assert_eq!(handle.await.unwrap().unwrap(), None);
    }
}
