//! Core types, configuration, and errors for the snipbox snippet engine.
//!
//! This crate provides the foundational types shared by the terminal bridge,
//! the runtime, and the CLI.
//!
//! # Architecture
//!
//! The core consists of:
//! - Strong domain types (`ModuleName`, `SessionId`, `MemoryLimit`)
//! - Error hierarchy following the engine's failure taxonomy
//! - Compiler diagnostics model
//! - Configuration for the engine, resolver, and terminal
//! - Statistics snapshots and CLI value types

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod diagnostics;
mod error;
mod types;

pub mod cli;
pub mod stats;

pub use config::{EngineConfig, EngineConfigBuilder, ResolverConfig, TerminalConfig};
pub use diagnostics::{Diagnostic, Location, Severity};
pub use error::{Error, Result};
pub use types::{MemoryLimit, ModuleName, SessionId};
