//! Config command implementation and the configuration file.
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/snipbox/config.toml`
//! - macOS: `~/Library/Application Support/snipbox/config.toml`
//! - Windows: `%APPDATA%\snipbox\config.toml`
//!
//! Command-line flags override file values for a single invocation.

use crate::actions::ConfigAction;
use crate::cli::EngineArgs;
use crate::formatters::format_output;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use snipbox_core::cli::{ExitCode, OutputFormat};
use snipbox_core::{EngineConfig, MemoryLimit, ModuleName, ResolverConfig, TerminalConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// CLI configuration.
///
/// # Examples
///
/// ```toml
/// [engine]
/// memory_limit_mb = 64
/// timeout_seconds = 30
/// epoch_tick_ms = 10
/// max_trace_frames = 8
/// artifact_cache_size = 32
///
/// [resolver]
/// endpoint = "https://example.org/app"
/// manifest = ["math", "text"]
/// path_patterns = ["_framework/{name}.wasm", "{name}.wasm"]
/// fingerprint_manifest = "_framework/fingerprints.json"
///
/// [terminal]
/// columns = 80
/// rows = 24
/// queue_capacity = 256
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    /// Compilation and execution settings
    #[serde(default)]
    pub engine: EngineSection,

    /// Reference module settings
    #[serde(default)]
    pub resolver: ResolverSection,

    /// Terminal grid settings
    #[serde(default)]
    pub terminal: TerminalSection,
}

/// `[engine]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSection {
    /// Memory limit per run in megabytes
    pub memory_limit_mb: usize,
    /// Execution timeout in seconds; 0 disables it
    pub timeout_seconds: u64,
    /// Epoch tick in milliseconds
    pub epoch_tick_ms: u64,
    /// Trace frames printed for a runtime failure
    pub max_trace_frames: usize,
    /// Compiled artifact cache capacity; 0 disables it
    pub artifact_cache_size: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            memory_limit_mb: defaults.memory_limit.megabytes(),
            timeout_seconds: defaults.execution_timeout.map_or(0, |t| t.as_secs()),
            epoch_tick_ms: u64::try_from(defaults.epoch_tick.as_millis()).unwrap_or(10),
            max_trace_frames: defaults.max_trace_frames,
            artifact_cache_size: defaults.artifact_cache_size,
        }
    }
}

/// `[resolver]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverSection {
    /// Base URL or directory serving reference modules
    pub endpoint: String,
    /// Required module names
    pub manifest: Vec<String>,
    /// Candidate path patterns with a `{name}` placeholder
    pub path_patterns: Vec<String>,
    /// Fingerprint manifest path, empty to disable
    pub fingerprint_manifest: String,
}

impl Default for ResolverSection {
    fn default() -> Self {
        let defaults = ResolverConfig::new(".");
        Self {
            endpoint: defaults.endpoint,
            manifest: defaults
                .manifest
                .into_iter()
                .map(ModuleName::into_inner)
                .collect(),
            path_patterns: defaults.path_patterns,
            fingerprint_manifest: defaults.fingerprint_manifest.unwrap_or_default(),
        }
    }
}

/// `[terminal]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TerminalSection {
    /// Grid width
    pub columns: u16,
    /// Grid height
    pub rows: u16,
    /// Output queue capacity
    pub queue_capacity: usize,
}

impl Default for TerminalSection {
    fn default() -> Self {
        let defaults = TerminalConfig::default();
        Self {
            columns: defaults.columns,
            rows: defaults.rows,
            queue_capacity: defaults.queue_capacity,
        }
    }
}

/// Settings resolved from the file plus command-line overrides.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    /// Engine settings
    pub engine: EngineConfig,
    /// Resolver settings
    pub resolver: ResolverConfig,
    /// Terminal settings
    pub terminal: TerminalConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if MemoryLimit::from_mb(self.engine.memory_limit_mb).is_none() {
            anyhow::bail!(
                "engine.memory_limit_mb must be between 1 and {}",
                MemoryLimit::MAX_MB
            );
        }
        if self.engine.epoch_tick_ms == 0 {
            anyhow::bail!("engine.epoch_tick_ms must be greater than 0");
        }
        self.resolved(&EngineArgs::default())?;
        Ok(())
    }

    /// Applies `overrides` and converts to the engine's configuration types.
    ///
    /// # Errors
    ///
    /// Returns an error if the combined settings are invalid.
    pub fn resolved(&self, overrides: &EngineArgs) -> Result<EffectiveConfig> {
        let memory_mb = overrides.memory_mb.unwrap_or(self.engine.memory_limit_mb);
        let memory_limit = MemoryLimit::from_mb(memory_mb)
            .with_context(|| format!("memory limit of {memory_mb} MB is out of range"))?;

        let mut engine = EngineConfig::builder()
            .memory_limit(memory_limit)
            .epoch_tick(Duration::from_millis(self.engine.epoch_tick_ms))
            .max_trace_frames(self.engine.max_trace_frames)
            .artifact_cache_size(self.engine.artifact_cache_size);
        engine = match overrides.timeout.unwrap_or(self.engine.timeout_seconds) {
            0 => engine.no_timeout(),
            secs => engine.execution_timeout(Duration::from_secs(secs)),
        };
        let engine = engine.build();
        engine.validate()?;

        let fingerprint = Some(self.resolver.fingerprint_manifest.clone()).filter(|p| !p.is_empty());
        let mut resolver = ResolverConfig::new(
            overrides
                .endpoint
                .clone()
                .unwrap_or_else(|| self.resolver.endpoint.clone()),
        )
        .with_manifest(self.resolver.manifest.iter().map(String::as_str))
        .with_path_patterns(self.resolver.path_patterns.iter().cloned())
        .with_fingerprint_manifest(fingerprint);
        if overrides.no_references {
            resolver = resolver.with_manifest(std::iter::empty::<&str>());
        }
        resolver.validate()?;

        let terminal = TerminalConfig {
            columns: overrides.columns.unwrap_or(self.terminal.columns),
            rows: self.terminal.rows,
            queue_capacity: self.terminal.queue_capacity,
        };
        terminal.validate()?;

        Ok(EffectiveConfig {
            engine,
            resolver,
            terminal,
        })
    }

    /// Reads a value by dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "engine.memory_limit_mb" => self.engine.memory_limit_mb.to_string(),
            "engine.timeout_seconds" => self.engine.timeout_seconds.to_string(),
            "engine.epoch_tick_ms" => self.engine.epoch_tick_ms.to_string(),
            "engine.max_trace_frames" => self.engine.max_trace_frames.to_string(),
            "engine.artifact_cache_size" => self.engine.artifact_cache_size.to_string(),
            "resolver.endpoint" => self.resolver.endpoint.clone(),
            "resolver.manifest" => self.resolver.manifest.join(", "),
            "resolver.path_patterns" => self.resolver.path_patterns.join(", "),
            "resolver.fingerprint_manifest" => self.resolver.fingerprint_manifest.clone(),
            "terminal.columns" => self.terminal.columns.to_string(),
            "terminal.rows" => self.terminal.rows.to_string(),
            "terminal.queue_capacity" => self.terminal.queue_capacity.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Sets a value by dotted key.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys and unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid value for {key}, must be a number"))
        }
        fn list(value: &str) -> Vec<String> {
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }

        match key {
            "engine.memory_limit_mb" => self.engine.memory_limit_mb = number(key, value)?,
            "engine.timeout_seconds" => self.engine.timeout_seconds = number(key, value)?,
            "engine.epoch_tick_ms" => self.engine.epoch_tick_ms = number(key, value)?,
            "engine.max_trace_frames" => self.engine.max_trace_frames = number(key, value)?,
            "engine.artifact_cache_size" => self.engine.artifact_cache_size = number(key, value)?,
            "resolver.endpoint" => self.resolver.endpoint = value.to_string(),
            "resolver.manifest" => self.resolver.manifest = list(value),
            "resolver.path_patterns" => self.resolver.path_patterns = list(value),
            "resolver.fingerprint_manifest" => self.resolver.fingerprint_manifest = value.to_string(),
            "terminal.columns" => self.terminal.columns = number(key, value)?,
            "terminal.rows" => self.terminal.rows = number(key, value)?,
            "terminal.queue_capacity" => self.terminal.queue_capacity = number(key, value)?,
            _ => anyhow::bail!("unknown configuration key: {key}"),
        }
        Ok(())
    }
}

/// Default configuration file path.
///
/// # Errors
///
/// Returns an error if the platform config directory is unknown.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("failed to determine config directory")?;
    Ok(config_dir.join("snipbox").join("config.toml"))
}

fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit.map_or_else(default_config_path, |p| Ok(p.to_path_buf()))
}

/// Loads the configuration, falling back to defaults when the file is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit)?;

    if !path.exists() {
        debug!("config file {} not found, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn save_config(config: &Config, path: &Path) -> Result<()> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    let toml_str = toml::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, toml_str).context("failed to write config file")?;

    debug!("saved config to {}", path.display());
    Ok(())
}

/// Result of `config init` and `config set`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigChange {
    /// Whether the file was written
    pub written: bool,
    /// Path of the file
    pub path: String,
    /// Status message
    pub message: String,
}

/// One configuration value.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigValue {
    /// Dotted key
    pub key: String,
    /// Value
    pub value: String,
}

/// Runs the config command.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or written.
pub async fn run(
    action: ConfigAction,
    explicit: Option<&Path>,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    info!(?action, "config command");
    let path = config_path(explicit)?;

    match action {
        ConfigAction::Init { force } => {
            let change = if path.exists() && !force {
                ConfigChange {
                    written: false,
                    path: path.display().to_string(),
                    message: "configuration file already exists (use --force to overwrite)"
                        .to_string(),
                }
            } else {
                save_config(&Config::default(), &path)?;
                ConfigChange {
                    written: true,
                    path: path.display().to_string(),
                    message: "configuration file created".to_string(),
                }
            };
            println!("{}", format_output(&change, output_format)?);
            Ok(if change.written {
                ExitCode::SUCCESS
            } else {
                ExitCode::ERROR
            })
        }
        ConfigAction::Show => {
            let config = load_config(Some(path.as_path()))?;
            println!("{}", format_output(&config, output_format)?);
            Ok(ExitCode::SUCCESS)
        }
        ConfigAction::Get { key } => {
            let config = load_config(Some(path.as_path()))?;
            let value = config
                .get(&key)
                .with_context(|| format!("unknown configuration key: {key}"))?;
            println!("{}", format_output(&ConfigValue { key, value }, output_format)?);
            Ok(ExitCode::SUCCESS)
        }
        ConfigAction::Set { key, value } => {
            let mut config = load_config(Some(path.as_path()))?;
            config.set(&key, &value)?;
            save_config(&config, &path)?;
            let change = ConfigChange {
                written: true,
                path: path.display().to_string(),
                message: format!("{key} = {value}"),
            };
            println!("{}", format_output(&change, output_format)?);
            Ok(ExitCode::SUCCESS)
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let effective = config.resolved(&EngineArgs::default()).unwrap();
        assert_eq!(effective.engine.execution_timeout, Some(Duration::from_secs(30)));
        assert_eq!(effective.engine.memory_limit.megabytes(), 64);
        assert_eq!(effective.resolver.manifest.len(), 2);
        assert_eq!(effective.terminal.columns, 80);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = EngineArgs {
            endpoint: Some("https://example.org/app".to_string()),
            timeout: Some(0),
            memory_mb: Some(8),
            columns: Some(120),
            no_references: true,
        };
        let effective = Config::default().resolved(&overrides).unwrap();
        assert_eq!(effective.resolver.endpoint, "https://example.org/app");
        assert_eq!(effective.engine.execution_timeout, None);
        assert_eq!(effective.engine.memory_limit.megabytes(), 8);
        assert_eq!(effective.terminal.columns, 120);
        assert!(effective.resolver.manifest.is_empty());
    }

    #[test]
    fn test_get_and_set() {
        let mut config = Config::default();
        config.set("engine.timeout_seconds", "5").unwrap();
        config.set("resolver.manifest", "math, strings ,").unwrap();
        assert_eq!(config.get("engine.timeout_seconds").as_deref(), Some("5"));
        assert_eq!(config.resolver.manifest, vec!["math", "strings"]);

        assert!(config.set("engine.timeout_seconds", "soon").is_err());
        assert!(config.set("engine.fuel", "1").is_err());
        assert!(config.get("engine.fuel").is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.engine.memory_limit_mb = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.resolver.path_patterns = vec!["lib.wasm".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.resolver.endpoint = "/srv/app".to_string();
        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(path.as_path())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[terminal]\ncolumns = 100\n").unwrap();

        let loaded = load_config(Some(path.as_path())).unwrap();
        assert_eq!(loaded.terminal.columns, 100);
        assert_eq!(loaded.terminal.rows, 24);
        assert_eq!(loaded.engine, EngineSection::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
