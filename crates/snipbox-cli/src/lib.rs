//! snipbox CLI library.
//!
//! Exposes the argument definitions, commands, and formatters behind the
//! `snipbox` binary so they can be tested.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unused_async)]

pub mod actions;
pub mod cli;
pub mod commands;
pub mod formatters;
pub mod protocol;
pub mod runner;
pub mod terminal;

pub use actions::ConfigAction;
pub use cli::{Cli, Commands, EngineArgs};
