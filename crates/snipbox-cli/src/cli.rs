//! CLI argument definitions and parsing.
//!
//! Defines the command-line interface structure using clap:
//! - `Cli` - Main CLI entry point
//! - `Commands` - Available subcommands
//! - `EngineArgs` - Flags overriding the configuration file

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::ConfigAction;

/// snipbox - compile and run WebAssembly text snippets in a terminal.
#[derive(Parser, Debug)]
#[command(name = "snipbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format for reports (json, text, pretty)
    #[arg(long = "format", global = true, default_value = "pretty")]
    pub format: String,

    /// Configuration file (default: ~/.config/snipbox/config.toml)
    #[arg(long, global = true, env = "SNIPBOX_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a snippet and print its diagnostics without running it.
    ///
    /// # Examples
    ///
    /// ```bash
    /// snipbox check hello.wat
    /// echo '(call $newline)' | snipbox check -
    /// ```
    Check {
        /// Snippet file, or `-` for stdin
        file: PathBuf,

        /// Include the compiled image bytes in json and text output
        #[arg(long)]
        include_image: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Compile and run a snippet in this terminal.
    ///
    /// Ctrl-C cancels the run. The process exit code is the snippet's
    /// exit code when it completes.
    ///
    /// # Examples
    ///
    /// ```bash
    /// snipbox run hello.wat
    /// snipbox run game.wat --endpoint https://example.org/app --timeout 0
    /// ```
    Run {
        /// Snippet file, or `-` for stdin
        file: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Serve a JSON-lines session on stdin/stdout.
    ///
    /// Reads `run`, `cancel`, `key` and `resize` messages from stdin and
    /// writes terminal output, state changes and outcomes to stdout.
    Serve {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Manage the configuration file.
    Config {
        /// Configuration action
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Engine settings that override the configuration file.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineArgs {
    /// Reference module endpoint: a base URL or a directory
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Execution timeout in seconds; 0 disables the timeout
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Memory limit per run in megabytes
    #[arg(long)]
    pub memory_mb: Option<usize>,

    /// Terminal width in columns
    #[arg(long)]
    pub columns: Option<u16>,

    /// Skip loading reference modules
    #[arg(long)]
    pub no_references: bool,
}
