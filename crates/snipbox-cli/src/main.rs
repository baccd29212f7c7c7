//! snipbox command-line interface.
//!
//! Compiles and runs WebAssembly text snippets against a terminal.
//!
//! # Architecture
//!
//! The CLI is organized around subcommands:
//! - `check` - Compile a snippet and list its diagnostics
//! - `run` - Compile and run a snippet in this terminal
//! - `serve` - Drive a session over a JSON-lines protocol
//! - `config` - Manage the configuration file
//!
//! # Examples
//!
//! ```bash
//! # Run a bare snippet
//! echo '(call $print_i32 (i32.const 42))' | snipbox run -
//!
//! # Load reference modules from a local build
//! snipbox run game.wat --endpoint ./dist
//! ```

use anyhow::Result;
use clap::Parser;
use snipbox_cli::cli::Cli;
use snipbox_cli::runner::{execute_command, init_logging};
use snipbox_core::cli::OutputFormat;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json)?;

    let output_format = cli
        .format
        .parse::<OutputFormat>()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let exit_code =
        runtime.block_on(execute_command(cli.command, cli.config.as_deref(), output_format))?;

    // The key reader thread may still be parked in a blocking read.
    std::process::exit(exit_code.as_i32());
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use snipbox_cli::actions::ConfigAction;
    use snipbox_cli::cli::{Cli, Commands};
    use std::path::PathBuf;

    #[test]
    fn test_cli_parsing_check() {
        let cli = Cli::parse_from(["snipbox", "check", "hello.wat"]);
        if let Commands::Check {
            file,
            include_image,
            engine,
        } = cli.command
        {
            assert_eq!(file, PathBuf::from("hello.wat"));
            assert!(!include_image);
            assert_eq!(engine, Default::default());
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_cli_parsing_run_overrides() {
        let cli = Cli::parse_from([
            "snipbox",
            "run",
            "-",
            "--endpoint",
            "https://example.org/app",
            "--timeout",
            "0",
            "--memory-mb",
            "16",
            "--columns",
            "100",
            "--no-references",
        ]);
        if let Commands::Run { file, engine } = cli.command {
            assert_eq!(file, PathBuf::from("-"));
            assert_eq!(engine.endpoint.as_deref(), Some("https://example.org/app"));
            assert_eq!(engine.timeout, Some(0));
            assert_eq!(engine.memory_mb, Some(16));
            assert_eq!(engine.columns, Some(100));
            assert!(engine.no_references);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parsing_serve() {
        let cli = Cli::parse_from(["snipbox", "serve", "--timeout", "5"]);
        assert!(matches!(cli.command, Commands::Serve { .. }));
    }

    #[test]
    fn test_cli_parsing_config_set() {
        let cli = Cli::parse_from(["snipbox", "config", "set", "terminal.columns", "120"]);
        if let Commands::Config { action } = cli.command {
            assert_eq!(
                action,
                ConfigAction::Set {
                    key: "terminal.columns".to_string(),
                    value: "120".to_string(),
                }
            );
        } else {
            panic!("Expected Config command");
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "snipbox",
            "--verbose",
            "--log-json",
            "--format",
            "json",
            "--config",
            "/tmp/snipbox.toml",
            "config",
            "show",
        ]);
        assert!(cli.verbose);
        assert!(cli.log_json);
        assert_eq!(cli.format, "json");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/snipbox.toml")));
    }

    #[test]
    fn test_cli_output_format_default() {
        let cli = Cli::parse_from(["snipbox", "check", "a.wat"]);
        assert_eq!(cli.format, "pretty");
    }

    #[test]
    fn test_cli_requires_file() {
        assert!(Cli::try_parse_from(["snipbox", "run"]).is_err());
    }
}
