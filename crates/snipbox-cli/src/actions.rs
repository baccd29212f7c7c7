//! Action type definitions for CLI commands.

use clap::Subcommand;

/// Configuration file actions.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Print one value, e.g. `engine.timeout_seconds`
    Get {
        /// Dotted key
        key: String,
    },

    /// Change one value and save the file
    Set {
        /// Dotted key
        key: String,
        /// New value
        value: String,
    },

    /// Print the configuration file path
    Path,
}
