//! Values shared by the `snipbox` command line and its library.
//!
//! # Examples
//!
//! ```
//! use snipbox_core::cli::{ExitCode, OutputFormat};
//!
//! let format: OutputFormat = "JSON".parse().unwrap();
//! assert_eq!(format, OutputFormat::Json);
//!
//! assert!(ExitCode::SUCCESS.is_success());
//! assert_eq!(ExitCode::COMPILE_ERROR.as_i32(), 2);
//! assert_eq!(ExitCode::from_snippet(-1).as_i32(), 255);
//! ```

use std::fmt;
use std::str::FromStr;

/// How commands print reports and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// Indented JSON
    Json,
    /// One line of compact JSON per report
    Text,
    /// Colored listing for people
    #[default]
    Pretty,
}

impl OutputFormat {
    /// Every format, in the order shown in help text.
    pub const ALL: [Self; 3] = [Self::Json, Self::Text, Self::Pretty];

    /// Lowercase name accepted by `--format`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                crate::Error::InvalidArgument(format!(
                    "unknown output format '{s}', use json, text or pretty"
                ))
            })
    }
}

/// Process exit status of a `snipbox` invocation.
///
/// A completed snippet passes its own exit code through; the other
/// outcomes use the fixed codes below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Everything worked, or the snippet returned 0.
    pub const SUCCESS: Self = Self(0);

    /// The command itself failed (bad file, bad config, engine start-up).
    pub const ERROR: Self = Self(1);

    /// The snippet did not compile.
    pub const COMPILE_ERROR: Self = Self(2);

    /// The snippet failed at runtime, timed out, or had no entry point.
    pub const RUNTIME_ERROR: Self = Self(3);

    /// The run was cancelled, as for SIGINT.
    pub const CANCELLED: Self = Self(130);

    /// Wraps a raw status.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        Self(code)
    }

    /// Status for a snippet that returned `code`, reduced to the 0..=255
    /// range a process can report.
    #[must_use]
    pub const fn from_snippet(code: i32) -> Self {
        Self(code.rem_euclid(256))
    }

    /// Raw status.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Whether the status is zero.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
