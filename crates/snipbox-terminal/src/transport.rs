//! Transport to the remote terminal surface.
//!
//! The surface is whatever draws characters for the user: a browser
//! terminal widget, a local TTY, or a recording buffer in tests. The
//! engine only ever talks to it through [`TerminalTransport`].

use crate::error::{Result, TerminalError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Logical key reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleKey {
    /// A printable character, carried in [`KeyEvent::ch`]
    Char,
    /// Enter / Return
    Enter,
    /// Backspace
    Backspace,
    /// Tab
    Tab,
    /// Escape
    Escape,
    /// Arrow up
    Up,
    /// Arrow down
    Down,
    /// Arrow left
    Left,
    /// Arrow right
    Right,
    /// Home
    Home,
    /// End
    End,
    /// Delete
    Delete,
    /// Page up
    PageUp,
    /// Page down
    PageDown,
    /// Anything the surface could not classify
    Unknown,
}

/// A single key press delivered by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Character produced by the key, if any
    #[serde(default)]
    pub ch: Option<char>,
    /// Logical key
    pub key: ConsoleKey,
    /// Shift modifier
    #[serde(default)]
    pub shift: bool,
    /// Alt modifier
    #[serde(default)]
    pub alt: bool,
    /// Control modifier
    #[serde(default)]
    pub control: bool,
}

impl KeyEvent {
    /// Creates an unmodified key event for a printable character.
    #[must_use]
    pub const fn char(ch: char) -> Self {
        Self {
            ch: Some(ch),
            key: ConsoleKey::Char,
            shift: false,
            alt: false,
            control: false,
        }
    }

    /// Creates an unmodified key event for a non-character key.
    #[must_use]
    pub const fn key(key: ConsoleKey) -> Self {
        Self {
            ch: None,
            key,
            shift: false,
            alt: false,
            control: false,
        }
    }

    /// Integer code handed to guest code.
    ///
    /// Characters map to their code point, control keys to their ASCII
    /// control code, and navigation keys to negative values below `-1`
    /// (`-1` itself means "no key").
    #[must_use]
    pub fn code(&self) -> i32 {
        match self.key {
            ConsoleKey::Char => self.ch.map_or(-16, |c| c as i32),
            ConsoleKey::Enter => 10,
            ConsoleKey::Backspace => 8,
            ConsoleKey::Tab => 9,
            ConsoleKey::Escape => 27,
            ConsoleKey::Up => -2,
            ConsoleKey::Down => -3,
            ConsoleKey::Left => -4,
            ConsoleKey::Right => -5,
            ConsoleKey::Home => -6,
            ConsoleKey::End => -7,
            ConsoleKey::Delete => -8,
            ConsoleKey::PageUp => -9,
            ConsoleKey::PageDown => -10,
            ConsoleKey::Unknown => -16,
        }
    }
}

/// Operations the remote terminal surface provides.
///
/// Implementations must be cheap to share; the output writer task and
/// the input bridge both hold the same transport.
#[async_trait]
pub trait TerminalTransport: Send + Sync + fmt::Debug {
    /// Writes raw text, which may contain ANSI escape sequences.
    async fn write(&self, text: &str) -> Result<()>;

    /// Writes text followed by a line break.
    async fn write_line(&self, text: &str) -> Result<()> {
        self.write(text).await?;
        self.write("\n").await
    }

    /// Clears the surface.
    async fn clear(&self) -> Result<()>;

    /// Waits for the next key press.
    ///
    /// Callers race this against cancellation, so implementations must be
    /// safe to drop mid-wait.
    async fn read_key(&self) -> Result<KeyEvent>;
}

/// One operation recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A `write` call
    Write(String),
    /// A `write_line` call
    WriteLine(String),
    /// A `clear` call
    Clear,
}

/// In-memory transport that records output and replays queued keys.
///
/// Key reads block until a key is pushed, which makes it suitable for
/// cancellation tests.
#[derive(Debug)]
pub struct MemoryTransport {
    events: Mutex<Vec<TransportEvent>>,
    key_tx: mpsc::UnboundedSender<KeyEvent>,
    key_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<KeyEvent>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        Self {
            events: Mutex::new(Vec::new()),
            key_tx,
            key_rx: tokio::sync::Mutex::new(key_rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Queues a key press for the next `read_key`.
    pub fn push_key(&self, key: KeyEvent) {
        // The receiver lives in `self`, so the send cannot fail.
        let _ = self.key_tx.send(key);
    }

    /// Queues every character of `text` as key presses, mapping `\n` to Enter.
    pub fn push_text(&self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => self.push_key(KeyEvent::key(ConsoleKey::Enter)),
                '\x08' => self.push_key(KeyEvent::key(ConsoleKey::Backspace)),
                c => self.push_key(KeyEvent::char(c)),
            }
        }
    }

    /// Makes every subsequent operation fail with `TransportClosed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns every recorded operation in order.
    #[must_use]
    pub fn events(&self) -> Vec<TransportEvent> {
        self.lock_events().clone()
    }

    /// Returns all text sent, with `write_line` contributing a trailing `\n`.
    #[must_use]
    pub fn output(&self) -> String {
        let events = self.lock_events();
        let mut out = String::new();
        for event in events.iter() {
            match event {
                TransportEvent::Write(text) => out.push_str(text),
                TransportEvent::WriteLine(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                TransportEvent::Clear => {}
            }
        }
        out
    }

    /// Number of `clear` calls received.
    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.lock_events()
            .iter()
            .filter(|e| matches!(e, TransportEvent::Clear))
            .count()
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<TransportEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, event: TransportEvent) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TerminalError::TransportClosed);
        }
        self.lock_events().push(event);
        Ok(())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminalTransport for MemoryTransport {
    async fn write(&self, text: &str) -> Result<()> {
        self.record(TransportEvent::Write(text.to_string()))
    }

    async fn write_line(&self, text: &str) -> Result<()> {
        self.record(TransportEvent::WriteLine(text.to_string()))
    }

    async fn clear(&self) -> Result<()> {
        self.record(TransportEvent::Clear)
    }

    async fn read_key(&self) -> Result<KeyEvent> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TerminalError::TransportClosed);
        }
        let mut rx = self.key_rx.lock().await;
        rx.recv().await.ok_or(TerminalError::TransportClosed)
    }
}
