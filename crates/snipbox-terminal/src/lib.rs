//! Terminal bridge for snipbox sessions.
//!
//! Connects snippet output and input to a remote terminal surface:
//!
//! - [`TerminalTransport`] is the surface itself (write, clear, read key)
//! - [`OutputBridge`] renders styled text, markup, and cursor moves into
//!   ANSI text and sends it in order through a bounded queue
//! - [`InputBridge`] performs cancellable, one-at-a-time key reads
//! - [`ambient`] holds the process-wide current console for the duration
//!   of a run
//!
//! # Examples
//!
//! ```no_run
//! use snipbox_core::{SessionId, TerminalConfig};
//! use snipbox_terminal::{Markup, MemoryTransport, OutputBridge};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(MemoryTransport::new());
//! let output = OutputBridge::spawn(SessionId::generate(), transport.clone(), &TerminalConfig::default());
//!
//! output.write(&Markup::parse("[bold green]ok[/] done")?).await?;
//! output.flush().await?;
//! println!("{:?}", transport.output());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod ambient;
pub mod ansi;
mod capabilities;
mod cursor;
mod error;
mod input;
mod markup;
mod output;
pub mod prompt;
mod render;
mod segment;
mod session;
mod style;
mod transport;

pub use capabilities::{ColorDepth, TerminalCapabilities};
pub use cursor::CursorTracker;
pub use error::{Result, TerminalError};
pub use input::InputBridge;
pub use markup::{Markup, escape as escape_markup};
pub use output::OutputBridge;
pub use render::{RenderOptions, Renderable, Rule, Span, Text};
pub use segment::{ControlCode, Segment};
pub use session::TerminalSession;
pub use style::{Color, Decoration, Style};
pub use transport::{ConsoleKey, KeyEvent, MemoryTransport, TerminalTransport, TransportEvent};
