//! Terminal bridge errors.

use thiserror::Error;

/// Errors raised by the terminal transport and the bridges built on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminalError {
    /// The remote surface went away or the writer task stopped.
    #[error("terminal transport is closed")]
    TransportClosed,

    /// A key read is already outstanding for this session.
    #[error("a key read is already pending for this session")]
    KeyReadPending,

    /// The transport reported an I/O failure.
    #[error("terminal I/O failed: {message}")]
    Io {
        /// Description of the failure
        message: String,
    },

    /// Markup text could not be parsed.
    #[error("invalid markup at offset {offset}: {message}")]
    Markup {
        /// Byte offset of the offending tag
        offset: usize,
        /// What was wrong with it
        message: String,
    },
}

impl From<std::io::Error> for TerminalError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<TerminalError> for snipbox_core::Error {
    fn from(err: TerminalError) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Result alias for terminal operations.
pub type Result<T> = std::result::Result<T, TerminalError>;
