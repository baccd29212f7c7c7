//! Configuration types for the snippet engine.
//!
//! Three groups of settings, one per component:
//! - [`EngineConfig`]: compilation and execution boundary limits
//! - [`ResolverConfig`]: where reference modules come from
//! - [`TerminalConfig`]: the fixed capability grid and output queue
//!
//! # Examples
//!
//! ```
//! use snipbox_core::{EngineConfig, MemoryLimit};
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .memory_limit(MemoryLimit::from_mb(32).unwrap())
//!     .execution_timeout(Duration::from_secs(10))
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.memory_limit.megabytes(), 32);
//! ```

use crate::{Error, MemoryLimit, ModuleName, Result};
use std::time::Duration;

/// Compilation and execution settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Linear memory budget per execution boundary.
    /// Default: 64MB
    pub memory_limit: MemoryLimit,

    /// Wall-clock budget for one run. `None` lets a snippet run until it
    /// finishes or is cancelled.
    /// Default: 30 seconds
    pub execution_timeout: Option<Duration>,

    /// Interval at which running wasm code yields back to the host.
    ///
    /// Long loops only observe cancellation at these yield points.
    /// Default: 10ms
    pub epoch_tick: Duration,

    /// Maximum number of trace frames printed for a runtime failure.
    /// Default: 8
    pub max_trace_frames: usize,

    /// Capacity of the compiled artifact cache. Zero disables caching.
    /// Default: 32
    pub artifact_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit: MemoryLimit::default(),
            execution_timeout: Some(Duration::from_secs(30)),
            epoch_tick: Duration::from_millis(10),
            max_trace_frames: 8,
            artifact_cache_size: 32,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the epoch tick or the execution
    /// timeout is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use snipbox_core::EngineConfig;
    /// use std::time::Duration;
    ///
    /// let mut config = EngineConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.epoch_tick = Duration::ZERO;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.epoch_tick.is_zero() {
            return Err(Error::ConfigError {
                message: "epoch tick must be greater than zero".to_string(),
            });
        }

        if let Some(timeout) = self.execution_timeout
            && timeout.is_zero()
        {
            return Err(Error::ConfigError {
                message: "execution timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the memory limit.
    #[must_use]
    pub const fn memory_limit(mut self, limit: MemoryLimit) -> Self {
        self.config.memory_limit = limit;
        self
    }

    /// Sets the execution timeout.
    #[must_use]
    pub const fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.config.execution_timeout = Some(timeout);
        self
    }

    /// Removes the execution timeout.
    #[must_use]
    pub const fn no_timeout(mut self) -> Self {
        self.config.execution_timeout = None;
        self
    }

    /// Sets the epoch tick.
    #[must_use]
    pub const fn epoch_tick(mut self, tick: Duration) -> Self {
        self.config.epoch_tick = tick;
        self
    }

    /// Sets the maximum number of printed trace frames.
    #[must_use]
    pub const fn max_trace_frames(mut self, frames: usize) -> Self {
        self.config.max_trace_frames = frames;
        self
    }

    /// Sets the artifact cache capacity.
    #[must_use]
    pub const fn artifact_cache_size(mut self, size: usize) -> Self {
        self.config.artifact_cache_size = size;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Reference module resolution settings.
///
/// # Examples
///
/// ```
/// use snipbox_core::ResolverConfig;
///
/// let config = ResolverConfig::new("https://example.org/app")
///     .with_manifest(["math", "text"]);
///
/// assert_eq!(config.manifest.len(), 2);
/// assert_eq!(
///     config.candidate_paths("math"),
///     vec!["_framework/math.wasm".to_string(), "math.wasm".to_string()]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Static file endpoint: an `http(s)://` base URL or a local directory.
    pub endpoint: String,

    /// Required reference modules, fetched in this order.
    pub manifest: Vec<ModuleName>,

    /// Candidate path patterns relative to the endpoint; `{name}` is
    /// replaced by the module name.
    pub path_patterns: Vec<String>,

    /// Optional JSON map from module name to fingerprinted file path.
    pub fingerprint_manifest: Option<String>,
}

impl ResolverConfig {
    /// Placeholder substituted by the module name in path patterns.
    pub const NAME_PLACEHOLDER: &'static str = "{name}";

    /// Default required modules.
    pub const DEFAULT_MANIFEST: &'static [&'static str] = &["math", "text"];

    /// Creates a configuration for `endpoint` with default manifest and patterns.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            manifest: Self::DEFAULT_MANIFEST
                .iter()
                .map(|name| ModuleName::new(*name))
                .collect(),
            path_patterns: vec![
                "_framework/{name}.wasm".to_string(),
                "{name}.wasm".to_string(),
            ],
            fingerprint_manifest: Some("_framework/fingerprints.json".to_string()),
        }
    }

    /// Replaces the manifest.
    #[must_use]
    pub fn with_manifest<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ModuleName>,
    {
        self.manifest = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the path patterns.
    #[must_use]
    pub fn with_path_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets or clears the fingerprint manifest path.
    #[must_use]
    pub fn with_fingerprint_manifest(mut self, path: Option<String>) -> Self {
        self.fingerprint_manifest = path;
        self
    }

    /// Expands every path pattern for `name`, in order.
    #[must_use]
    pub fn candidate_paths(&self, name: &str) -> Vec<String> {
        self.path_patterns
            .iter()
            .map(|pattern| pattern.replace(Self::NAME_PLACEHOLDER, name))
            .collect()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the endpoint is empty or a pattern
    /// lacks the `{name}` placeholder.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::ConfigError {
                message: "reference endpoint cannot be empty".to_string(),
            });
        }

        if let Some(pattern) = self
            .path_patterns
            .iter()
            .find(|pattern| !pattern.contains(Self::NAME_PLACEHOLDER))
        {
            return Err(Error::ConfigError {
                message: format!("path pattern '{pattern}' has no {{name}} placeholder"),
            });
        }

        Ok(())
    }
}

/// Terminal capability grid and output queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalConfig {
    /// Declared grid width in columns.
    /// Default: 80
    pub columns: u16,

    /// Declared grid height in rows.
    /// Default: 24
    pub rows: u16,

    /// Capacity of the output queue between the bridge and the writer task.
    /// Default: 256
    pub queue_capacity: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            columns: 80,
            rows: 24,
            queue_capacity: 256,
        }
    }
}

impl TerminalConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for a zero-sized grid or queue.
    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.rows == 0 {
            return Err(Error::ConfigError {
                message: format!("terminal grid {}x{} is empty", self.columns, self.rows),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::ConfigError {
                message: "output queue capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_trace_frames, 8);
        assert_eq!(config.execution_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_engine_builder() {
        let config = EngineConfig::builder()
            .no_timeout()
            .epoch_tick(Duration::from_millis(1))
            .max_trace_frames(3)
            .artifact_cache_size(0)
            .build();
        assert!(config.execution_timeout.is_none());
        assert_eq!(config.max_trace_frames, 3);
        assert_eq!(config.artifact_cache_size, 0);
    }

    #[test]
    fn test_engine_rejects_zero_timeout() {
        let config = EngineConfig::builder()
            .execution_timeout(Duration::ZERO)
            .build();
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_resolver_candidate_paths() {
        let config = ResolverConfig::new("/srv/refs")
            .with_path_patterns(["lib/{name}.wasm", "{name}/{name}.wasm"]);
        assert_eq!(
            config.candidate_paths("text"),
            vec!["lib/text.wasm", "text/text.wasm"]
        );
    }

    #[test]
    fn test_resolver_validate() {
        assert!(ResolverConfig::new("refs").validate().is_ok());
        assert!(ResolverConfig::new("  ").validate().is_err());
        let bad = ResolverConfig::new("refs").with_path_patterns(["static.wasm"]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_terminal_validate() {
        assert!(TerminalConfig::default().validate().is_ok());
        let empty = TerminalConfig {
            columns: 0,
            ..TerminalConfig::default()
        };
        assert!(empty.validate().is_err());
    }
}
