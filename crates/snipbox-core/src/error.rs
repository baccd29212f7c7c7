//! Error types for the snippet engine.
//!
//! One error hierarchy is shared by every crate in the workspace. The variants
//! follow the engine's failure taxonomy: reference loading, compilation,
//! missing entry point, runtime failure, plus the ambient configuration and
//! transport failures.
//!
//! Cancellation of a run is deliberately absent: it is an outcome, not an
//! error.
//!
//! # Examples
//!
//! ```
//! use snipbox_core::{Error, Result};
//!
//! fn check_columns(columns: u16) -> Result<()> {
//!     if columns == 0 {
//!         return Err(Error::ConfigError {
//!             message: "terminal width must be greater than zero".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = check_columns(0).unwrap_err();
//! assert!(err.is_config_error());
//! ```

use thiserror::Error;

/// Main error type for the snippet engine.
#[derive(Error, Debug)]
pub enum Error {
    /// A single reference module could not be fetched or validated.
    ///
    /// The resolver logs and skips these; they never abort a whole load.
    #[error("Reference module '{module}' could not be loaded: {reason}")]
    ReferenceLoadFailure {
        /// Name of the reference module from the manifest
        module: String,
        /// Why every candidate path was rejected
        reason: String,
    },

    /// Compilation produced error-severity diagnostics.
    #[error("Compilation failed with {error_count} error(s)")]
    CompileFailure {
        /// Number of error-severity diagnostics
        error_count: usize,
    },

    /// The compiled module exports no usable entry point.
    #[error("No entry point: {reason}")]
    MissingEntryPoint {
        /// What was looked for and not found
        reason: String,
    },

    /// The snippet raised an unhandled failure while running.
    #[error("Runtime failure: {message}")]
    RuntimeFailure {
        /// Unwrapped failure message
        message: String,
        /// Trimmed trace frames, innermost first
        trace: Vec<String>,
    },

    /// The terminal transport rejected an operation or went away.
    #[error("Terminal transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// Timeout error.
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// Elapsed budget in milliseconds
        duration_ms: u64,
    },

    /// Invalid argument error.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Wasm engine setup failed.
    #[error("WASM engine error: {message}")]
    WasmError {
        /// Description of the engine failure
        message: String,
    },
}

impl Error {
    /// Returns `true` if this is a reference load failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use snipbox_core::Error;
    ///
    /// let err = Error::ReferenceLoadFailure {
    ///     module: "math".to_string(),
    ///     reason: "404".to_string(),
    /// };
    /// assert!(err.is_reference_failure());
    /// ```
    #[must_use]
    pub const fn is_reference_failure(&self) -> bool {
        matches!(self, Self::ReferenceLoadFailure { .. })
    }

    /// Returns `true` if this is a compile failure.
    #[must_use]
    pub const fn is_compile_failure(&self) -> bool {
        matches!(self, Self::CompileFailure { .. })
    }

    /// Returns `true` if the module had no entry point.
    #[must_use]
    pub const fn is_missing_entry_point(&self) -> bool {
        matches!(self, Self::MissingEntryPoint { .. })
    }

    /// Returns `true` if the snippet failed at runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use snipbox_core::Error;
    ///
    /// let err = Error::RuntimeFailure {
    ///     message: "boom".to_string(),
    ///     trace: vec![],
    /// };
    /// assert!(err.is_runtime_failure());
    /// assert!(!err.is_compile_failure());
    /// ```
    #[must_use]
    pub const fn is_runtime_failure(&self) -> bool {
        matches!(self, Self::RuntimeFailure { .. })
    }

    /// Returns `true` if this is a transport error.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_failure_detection() {
        let err = Error::ReferenceLoadFailure {
            module: "text".to_string(),
            reason: "bad header".to_string(),
        };
        assert!(err.is_reference_failure());
        assert!(!err.is_runtime_failure());
    }

    #[test]
    fn test_compile_failure_display() {
        let err = Error::CompileFailure { error_count: 2 };
        assert!(err.is_compile_failure());
        assert_eq!(err.to_string(), "Compilation failed with 2 error(s)");
    }

    #[test]
    fn test_missing_entry_point_detection() {
        let err = Error::MissingEntryPoint {
            reason: "no export named 'main' or '_start'".to_string(),
        };
        assert!(err.is_missing_entry_point());
        assert!(err.to_string().contains("No entry point"));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            operation: "snippet execution".to_string(),
            duration_ms: 1500,
        };
        assert!(err.is_timeout());
        let display = format!("{err}");
        assert!(display.contains("1500ms"));
        assert!(display.contains("snippet execution"));
    }

    #[test]
    fn test_transport_and_config_detection() {
        let transport = Error::Transport {
            message: "closed".to_string(),
        };
        let config = Error::ConfigError {
            message: "bad".to_string(),
        };
        assert!(transport.is_transport_error());
        assert!(config.is_config_error());
        assert!(!config.is_transport_error());
    }
}
