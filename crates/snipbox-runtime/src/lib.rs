//! Snippet runtime: reference resolution, compilation, and isolated
//! execution.
//!
//! Snippets are WebAssembly text. A bare list of instructions is wrapped
//! into a module with a `main` entry point; complete modules compile as
//! written. Console output and key input go through the `console` import
//! module, backed by a [`snipbox_terminal::TerminalSession`].
//!
//! - [`resolver`] fetches reference modules once per process
//! - [`compiler`] produces a [`CompiledArtifact`] with diagnostics
//! - [`executor`] runs artifacts inside a fresh [`boundary`] per run
//! - [`session`] drives the run state machine on one terminal
//! - [`SnippetEngine`] ties everything together

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod boundary;
pub mod cache;
pub mod compiler;
pub mod engine;
pub mod executor;
pub mod host_functions;
pub mod resolver;
pub mod session;
pub mod source;

mod runtime;

pub use boundary::BoundaryStats;
pub use compiler::{CompileReport, CompiledArtifact, EntryPoint, EntrySignature};
pub use executor::{ExecutionHost, RunOutcome};
pub use resolver::{ReferenceResolver, ReferenceSet};
pub use runtime::SnippetEngine;
pub use session::{RunReport, RunSession, RunState};
