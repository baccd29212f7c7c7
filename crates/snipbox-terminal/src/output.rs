//! Output bridge: renders output and ships it to the transport in order.
//!
//! Sends go through a bounded queue drained by a single writer task, so
//! they reach the transport in exactly the order they were issued. A full
//! queue makes the sender wait, which is the only backpressure guest code
//! ever sees.

use crate::capabilities::TerminalCapabilities;
use crate::cursor::CursorTracker;
use crate::error::{Result, TerminalError};
use crate::render::{RenderOptions, Renderable};
use crate::segment::{ControlCode, Segment};
use crate::style::Style;
use crate::transport::TerminalTransport;
use snipbox_core::{SessionId, TerminalConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
enum Command {
    Write(String),
    WriteLine(String),
    Clear,
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
struct Inner {
    session: SessionId,
    capabilities: TerminalCapabilities,
    options: RenderOptions,
    tx: mpsc::Sender<Command>,
    cursor: Mutex<CursorTracker>,
    sent: AtomicU64,
}

/// Handle for writing to one session's terminal.
///
/// Clones share the same queue, cursor, and writer task. The writer task
/// exits once every clone has been dropped.
#[derive(Debug, Clone)]
pub struct OutputBridge {
    inner: Arc<Inner>,
}

impl OutputBridge {
    /// Creates the bridge and spawns its writer task on the current runtime.
    #[must_use]
    pub fn spawn(
        session: SessionId,
        transport: Arc<dyn TerminalTransport>,
        config: &TerminalConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let capabilities = TerminalCapabilities::fixed(config);
        let options = RenderOptions::from_capabilities(&capabilities);

        tokio::spawn(run_writer(session.clone(), transport, rx));

        Self {
            inner: Arc::new(Inner {
                session,
                capabilities,
                options,
                tx,
                cursor: Mutex::new(CursorTracker::new(config.columns)),
                sent: AtomicU64::new(0),
            }),
        }
    }

    /// Session this bridge belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.session
    }

    /// Fixed capabilities of the surface.
    #[must_use]
    pub fn capabilities(&self) -> &TerminalCapabilities {
        &self.inner.capabilities
    }

    /// Current tracked cursor `(column, row)`.
    #[must_use]
    pub fn cursor(&self) -> (u16, u16) {
        self.lock_cursor().position()
    }

    /// Number of commands queued so far.
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.inner.sent.load(Ordering::Relaxed)
    }

    /// Whether two handles refer to the same bridge.
    #[must_use]
    pub fn same_bridge(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Renders `renderable` and queues the result.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn write(&self, renderable: &dyn Renderable) -> Result<()> {
        let column = usize::from(self.cursor().0);
        let segments = renderable.render(&self.inner.options.at_column(column));
        self.write_segments(&segments).await
    }

    /// Queues already rendered segments as one send.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn write_segments(&self, segments: &[Segment]) -> Result<()> {
        let mut encoded = String::new();
        {
            let mut cursor = self.lock_cursor();
            for segment in segments {
                if segment.is_noop() {
                    continue;
                }
                match segment {
                    Segment::Text { text, .. } => cursor.advance(text),
                    Segment::Control(code) => apply_control(&mut cursor, code),
                }
                encoded.push_str(&segment.to_ansi());
            }
        }
        if encoded.is_empty() {
            return Ok(());
        }
        self.send(Command::Write(encoded)).await
    }

    /// Queues plain text, sent verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn write_text(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.lock_cursor().advance(text);
        self.send(Command::Write(text.to_string())).await
    }

    /// Queues text in a single style.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn write_styled(&self, text: &str, style: Style) -> Result<()> {
        self.write_segments(&[Segment::styled(text, style)]).await
    }

    /// Queues a line of plain text.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn write_line(&self, text: &str) -> Result<()> {
        {
            let mut cursor = self.lock_cursor();
            cursor.advance(text);
            cursor.advance("\n");
        }
        self.send(Command::WriteLine(text.to_string())).await
    }

    /// Queues a line in a single style.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn write_styled_line(&self, text: &str, style: Style) -> Result<()> {
        self.write_segments(&[Segment::styled(text, style), Segment::line_break()])
            .await
    }

    /// Moves the cursor up `n` rows.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn cursor_up(&self, n: u16) -> Result<()> {
        self.control(ControlCode::CursorUp(n)).await
    }

    /// Moves the cursor down `n` rows.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn cursor_down(&self, n: u16) -> Result<()> {
        self.control(ControlCode::CursorDown(n)).await
    }

    /// Moves the cursor left `n` columns.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn cursor_left(&self, n: u16) -> Result<()> {
        self.control(ControlCode::CursorLeft(n)).await
    }

    /// Moves the cursor right `n` columns.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn cursor_right(&self, n: u16) -> Result<()> {
        self.control(ControlCode::CursorRight(n)).await
    }

    /// Places the cursor at a zero-based column and row.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn set_cursor(&self, column: u16, row: u16) -> Result<()> {
        self.control(ControlCode::CursorPosition { column, row })
            .await
    }

    async fn control(&self, code: ControlCode) -> Result<()> {
        self.write_segments(&[Segment::Control(code)]).await
    }

    /// Clears the surface. With `home` the cursor also returns to the
    /// origin; otherwise it stays where it was.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn clear(&self, home: bool) -> Result<()> {
        self.send(Command::Clear).await?;
        if home {
            self.set_cursor(0, 0).await?;
        }
        Ok(())
    }

    /// Waits until everything queued so far has reached the transport.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::TransportClosed`] if the writer task is gone.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::Flush(done_tx)).await?;
        done_rx.await.map_err(|_| TerminalError::TransportClosed)
    }

    /// Runs `f` with exclusive use of the terminal.
    ///
    /// A single session has one writer, so this is a pass-through; prompts
    /// use it to mark the span where they own the cursor.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.inner.sent.fetch_add(1, Ordering::Relaxed);
        self.inner
            .tx
            .send(command)
            .await
            .map_err(|_| TerminalError::TransportClosed)
    }

    fn lock_cursor(&self) -> MutexGuard<'_, CursorTracker> {
        self.inner
            .cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_control(cursor: &mut CursorTracker, code: &ControlCode) {
    match code {
        ControlCode::CursorUp(n) => cursor.move_up(*n),
        ControlCode::CursorDown(n) => cursor.move_down(*n),
        ControlCode::CursorLeft(n) => cursor.move_left(*n),
        ControlCode::CursorRight(n) => cursor.move_right(*n),
        ControlCode::CursorPosition { column, row } => cursor.set(*column, *row),
        ControlCode::Raw(_) => {}
    }
}

async fn run_writer(
    session: SessionId,
    transport: Arc<dyn TerminalTransport>,
    mut rx: mpsc::Receiver<Command>,
) {
    tracing::debug!(session = %session, "terminal writer started");

    while let Some(command) = rx.recv().await {
        let result = match command {
            Command::Write(text) => transport.write(&text).await,
            Command::WriteLine(text) => transport.write_line(&text).await,
            Command::Clear => transport.clear().await,
            Command::Flush(done) => {
                let _ = done.send(());
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!(session = %session, error = %e, "terminal send failed");
        }
    }

    tracing::debug!(session = %session, "terminal writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Color, Decoration};
    use crate::transport::{MemoryTransport, TransportEvent};

    fn bridge() -> (OutputBridge, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let bridge = OutputBridge::spawn(
            SessionId::generate(),
            transport.clone(),
            &TerminalConfig::default(),
        );
        (bridge, transport)
    }

    #[tokio::test]
    async fn test_sends_arrive_in_order() {
        let (bridge, transport) = bridge();
        for i in 0..50 {
            bridge.write_text(&format!("{i},")).await.unwrap();
        }
        bridge.flush().await.unwrap();

        let expected: String = (0..50).map(|i| format!("{i},")).collect();
        assert_eq!(transport.output(), expected);
    }

    #[tokio::test]
    async fn test_write_line_uses_transport_write_line() {
        let (bridge, transport) = bridge();
        bridge.write_line("Hello").await.unwrap();
        bridge.flush().await.unwrap();

        assert_eq!(
            transport.events(),
            vec![TransportEvent::WriteLine("Hello".to_string())]
        );
        assert_eq!(bridge.cursor(), (0, 1));
    }

    #[tokio::test]
    async fn test_styled_write_encodes_sgr() {
        let (bridge, transport) = bridge();
        let style = Style::PLAIN
            .fg(Color::rgb(255, 0, 0))
            .decorate(Decoration::BOLD);
        bridge.write_styled("x", style).await.unwrap();
        bridge.flush().await.unwrap();

        let out = transport.output();
        assert!(out.contains("1;38;2;255;0;0"));
        assert!(out.contains('x'));
        assert!(out.ends_with("\x1b[0m"));
        assert_eq!(bridge.cursor(), (1, 0));
    }

    #[tokio::test]
    async fn test_cursor_commands_update_tracker() {
        let (bridge, transport) = bridge();
        bridge.set_cursor(5, 3).await.unwrap();
        bridge.cursor_up(1).await.unwrap();
        bridge.cursor_left(2).await.unwrap();
        bridge.flush().await.unwrap();

        assert_eq!(bridge.cursor(), (3, 2));
        assert_eq!(transport.output(), "\x1b[4;6H\x1b[1A\x1b[2D");
    }

    #[tokio::test]
    async fn test_zero_count_moves_send_nothing() {
        let (bridge, transport) = bridge();
        bridge.set_cursor(0, 5).await.unwrap();
        bridge.cursor_up(0).await.unwrap();
        bridge.cursor_down(0).await.unwrap();
        bridge.cursor_left(0).await.unwrap();
        bridge.cursor_right(0).await.unwrap();
        bridge.flush().await.unwrap();

        assert_eq!(bridge.cursor(), (0, 5));
        assert_eq!(transport.output(), "\x1b[6;1H");
        assert_eq!(bridge.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_clear_with_home_resets_cursor() {
        let (bridge, transport) = bridge();
        bridge.write_text("abc").await.unwrap();
        bridge.clear(false).await.unwrap();
        assert_eq!(bridge.cursor(), (3, 0));
        bridge.clear(true).await.unwrap();
        assert_eq!(bridge.cursor(), (0, 0));
        bridge.flush().await.unwrap();

        assert_eq!(transport.clear_count(), 2);
        assert_eq!(transport.output(), "abc\x1b[1;1H");
    }

    #[tokio::test]
    async fn test_markup_mid_line_wraps_from_cursor() {
        let transport = Arc::new(MemoryTransport::new());
        let config = TerminalConfig {
            columns: 4,
            ..TerminalConfig::default()
        };
        let bridge = OutputBridge::spawn(SessionId::generate(), transport.clone(), &config);
        bridge.write_text("ab").await.unwrap();
        bridge
            .write(&crate::render::Text::styled("cdef", Style::PLAIN))
            .await
            .unwrap();
        bridge.flush().await.unwrap();

        assert_eq!(transport.output(), "abcd\nef");
        assert_eq!(bridge.cursor(), (2, 1));
    }

    #[tokio::test]
    async fn test_closed_transport_does_not_fail_sender() {
        let (bridge, transport) = bridge();
        transport.close();
        bridge.write_text("lost").await.unwrap();
        bridge.flush().await.unwrap();
        assert_eq!(transport.output(), "");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (bridge, _transport) = bridge();
        let other = bridge.clone();
        other.write_text("ab").await.unwrap();
        assert!(bridge.same_bridge(&other));
        assert_eq!(bridge.cursor(), (2, 0));
        assert_eq!(bridge.sent_count(), 1);
    }
}
