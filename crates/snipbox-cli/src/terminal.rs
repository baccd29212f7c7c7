//! Local terminal surface for `snipbox run`.
//!
//! Output goes to stdout as-is; the ANSI text produced by the output bridge
//! is understood by any modern terminal. Keys are read by a blocking
//! [`console::Term`] reader thread started on the first key request.

use async_trait::async_trait;
use console::{Key, Term};
use snipbox_terminal::{ConsoleKey, KeyEvent, TerminalError, TerminalTransport};
use std::fmt;
use std::sync::OnceLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Clears the screen. The cursor stays put; the output bridge homes it
/// separately when asked to.
const CLEAR_SCREEN: &str = "\x1b[2J";

type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// The process's own terminal.
pub struct StdioTransport {
    stdout: Mutex<Output>,
    keys: OnceLock<Mutex<mpsc::UnboundedReceiver<KeyEvent>>>,
    interrupt: CancellationToken,
}

impl fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioTransport")
            .field("interrupted", &self.interrupt.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl StdioTransport {
    /// Creates a transport over stdin/stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_output(tokio::io::stdout())
    }

    /// Creates a transport that writes to `output` and reads keys from stdin.
    #[must_use]
    pub fn with_output(output: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            stdout: Mutex::new(Box::new(output)),
            keys: OnceLock::new(),
            interrupt: CancellationToken::new(),
        }
    }

    /// Fired when Ctrl-C arrives while the reader holds the terminal in raw mode.
    #[must_use]
    pub const fn interrupt_token(&self) -> &CancellationToken {
        &self.interrupt
    }

    fn keys(&self) -> &Mutex<mpsc::UnboundedReceiver<KeyEvent>> {
        self.keys.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let interrupt = self.interrupt.clone();
            let spawned = std::thread::Builder::new()
                .name("snipbox-keys".to_string())
                .spawn(move || read_keys(&Term::stdout(), &tx, &interrupt));
            if let Err(e) = spawned {
                debug!("key reader thread did not start: {e}");
            }
            Mutex::new(rx)
        })
    }

    async fn send(&self, text: &str) -> Result<(), TerminalError> {
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn read_keys(term: &Term, tx: &mpsc::UnboundedSender<KeyEvent>, interrupt: &CancellationToken) {
    loop {
        match term.read_key() {
            Ok(Key::CtrlC) => interrupt.cancel(),
            Ok(key) => {
                if tx.send(map_key(&key)).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("key reader stopped: {e}");
                break;
            }
        }
    }
}

/// Translates a `console` key into the engine's key event.
#[must_use]
pub fn map_key(key: &Key) -> KeyEvent {
    match key {
        Key::Char(ch) => KeyEvent::char(*ch),
        Key::Enter => KeyEvent::key(ConsoleKey::Enter),
        Key::Backspace => KeyEvent::key(ConsoleKey::Backspace),
        Key::Tab => KeyEvent::key(ConsoleKey::Tab),
        Key::BackTab => KeyEvent {
            shift: true,
            ..KeyEvent::key(ConsoleKey::Tab)
        },
        Key::Escape => KeyEvent::key(ConsoleKey::Escape),
        Key::ArrowUp => KeyEvent::key(ConsoleKey::Up),
        Key::ArrowDown => KeyEvent::key(ConsoleKey::Down),
        Key::ArrowLeft => KeyEvent::key(ConsoleKey::Left),
        Key::ArrowRight => KeyEvent::key(ConsoleKey::Right),
        Key::Home => KeyEvent::key(ConsoleKey::Home),
        Key::End => KeyEvent::key(ConsoleKey::End),
        Key::Del => KeyEvent::key(ConsoleKey::Delete),
        Key::PageUp => KeyEvent::key(ConsoleKey::PageUp),
        Key::PageDown => KeyEvent::key(ConsoleKey::PageDown),
        _ => KeyEvent::key(ConsoleKey::Unknown),
    }
}

#[async_trait]
impl TerminalTransport for StdioTransport {
    async fn write(&self, text: &str) -> Result<(), TerminalError> {
        self.send(text).await
    }

    async fn clear(&self) -> Result<(), TerminalError> {
        self.send(CLEAR_SCREEN).await
    }

    async fn read_key(&self) -> Result<KeyEvent, TerminalError> {
        let mut rx = self.keys().lock().await;
        rx.recv().await.ok_or(TerminalError::TransportClosed)
    }
}
