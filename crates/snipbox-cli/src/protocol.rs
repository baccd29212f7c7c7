//! JSON-lines protocol spoken by `snipbox serve`.
//!
//! One JSON object per line in each direction, discriminated by `type`.
//!
//! ```text
//! -> {"type":"run","source":"(call $newline)"}
//! <- {"type":"state","state":"compiling"}
//! <- {"type":"write","text":"\n"}
//! <- {"type":"diagnostics","success":true,"diagnostics":[],"hash":"..."}
//! <- {"type":"outcome","outcome":{"kind":"completed","exit_code":0}}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snipbox_runtime::{CompileReport, RunOutcome, RunState};
use snipbox_terminal::{KeyEvent, TerminalError, TerminalTransport};
use tokio::sync::{Mutex, mpsc};

/// Message from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Compile and run a snippet, superseding any active run
    Run {
        /// Snippet text
        source: String,
    },
    /// Cancel the active run
    Cancel,
    /// A key press
    Key(KeyEvent),
    /// The surface changed size; advisory only
    Resize {
        /// New width
        columns: u16,
        /// New height
        rows: u16,
    },
}

/// Message to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Terminal text, possibly containing ANSI sequences
    Write {
        /// Text to draw
        text: String,
    },
    /// Clear the surface
    Clear,
    /// Compile result of the last run
    Diagnostics(CompileReport),
    /// Run state change
    State {
        /// New state
        state: RunState,
    },
    /// How a run ended
    Outcome {
        /// Outcome
        outcome: RunOutcome,
    },
    /// A request could not be handled
    Error {
        /// Description
        message: String,
    },
}

impl ServerMessage {
    /// Serializes the message as one line, without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Parses one inbound line.
///
/// # Errors
///
/// Returns an error for malformed JSON or unknown message types.
pub fn parse_line(line: &str) -> serde_json::Result<ClientMessage> {
    serde_json::from_str(line.trim())
}

/// Transport that turns terminal traffic into protocol messages.
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    keys: Mutex<mpsc::UnboundedReceiver<KeyEvent>>,
}

impl ChannelTransport {
    /// Creates a transport sending to `outbound` and reading keys from `keys`.
    #[must_use]
    pub fn new(
        outbound: mpsc::UnboundedSender<ServerMessage>,
        keys: mpsc::UnboundedReceiver<KeyEvent>,
    ) -> Self {
        Self {
            outbound,
            keys: Mutex::new(keys),
        }
    }

    fn send(&self, message: ServerMessage) -> Result<(), TerminalError> {
        self.outbound
            .send(message)
            .map_err(|_| TerminalError::TransportClosed)
    }
}

#[async_trait]
impl TerminalTransport for ChannelTransport {
    async fn write(&self, text: &str) -> Result<(), TerminalError> {
        self.send(ServerMessage::Write {
            text: text.to_string(),
        })
    }

    async fn write_line(&self, text: &str) -> Result<(), TerminalError> {
        self.send(ServerMessage::Write {
            text: format!("{text}\n"),
        })
    }

    async fn clear(&self) -> Result<(), TerminalError> {
        self.send(ServerMessage::Clear)
    }

    async fn read_key(&self) -> Result<KeyEvent, TerminalError> {
        let mut keys = self.keys.lock().await;
        keys.recv().await.ok_or(TerminalError::TransportClosed)
    }
}
