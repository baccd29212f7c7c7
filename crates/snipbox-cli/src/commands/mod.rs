//! Command implementations for the snipbox CLI.
//!
//! Each command module resolves its settings, drives the engine, and
//! formats output according to the requested format.

pub mod check;
pub mod common;
pub mod config;
pub mod run;
pub mod serve;
