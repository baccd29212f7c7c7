//! Output formatters for CLI commands.
//!
//! Provides consistent formatting across all CLI commands for JSON, text, and pretty output modes,
//! plus the compiler diagnostic listing printed by `check` and `run`.

use anyhow::Result;
use colored::Colorize;
use snipbox_core::cli::OutputFormat;
use serde::Serialize;

/// Format data according to the specified output format.
///
/// # Arguments
///
/// * `data` - The data to format (must be serializable)
/// * `format` - The output format (Json, Text, Pretty)
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Examples
///
/// ```
/// use snipbox_cli::formatters::format_output;
/// use snipbox_core::cli::OutputFormat;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Summary {
///     file: String,
///     errors: usize,
/// }
///
/// let summary = Summary {
///     file: "hello.wat".to_string(),
///     errors: 0,
/// };
///
/// let output = format_output(&summary, OutputFormat::Json)?;
/// assert!(output.contains("\"file\""));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json::format(data),
        OutputFormat::Text => text::format(data),
        OutputFormat::Pretty => pretty::format(data),
    }
}

/// JSON output formatting.
pub mod json {
    use super::{Result, Serialize};

    /// Format data as JSON.
    ///
    /// Uses pretty-printing with 2-space indentation.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let json = serde_json::to_string_pretty(data)?;
        Ok(json)
    }

    /// Format data as compact JSON (no formatting).
    pub fn format_compact<T: Serialize>(data: &T) -> Result<String> {
        let json = serde_json::to_string(data)?;
        Ok(json)
    }
}

/// Plain text output formatting.
pub mod text {
    use super::{Result, Serialize, json};

    /// Format data as one line of compact JSON, for piping into scripts.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        json::format_compact(data)
    }
}

/// Pretty (human-readable) output formatting.
///
/// Objects become indented `key: value` lines, arrays become `- item`
/// lines. Scalars are colored by type.
pub mod pretty {
    use super::{Colorize, Result, Serialize};
    use serde_json::Value;

    /// Format data as colorized, human-readable output.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let mut lines = Vec::new();
        match &value {
            Value::Object(_) | Value::Array(_) => render(&value, 0, &mut lines),
            scalar => lines.push(scalar_text(scalar)),
        }
        Ok(lines.join("\n"))
    }

    fn scalar_text(value: &Value) -> String {
        match value {
            Value::Null => "-".dimmed().to_string(),
            Value::Bool(b) => b.to_string().yellow().to_string(),
            Value::Number(n) => n.to_string().cyan().to_string(),
            Value::String(s) => s.green().to_string(),
            Value::Array(items) if items.is_empty() => "[]".dimmed().to_string(),
            Value::Object(map) if map.is_empty() => "{}".dimmed().to_string(),
            Value::Array(_) | Value::Object(_) => String::new(),
        }
    }

    fn is_nested(value: &Value) -> bool {
        match value {
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            _ => false,
        }
    }

    fn render(value: &Value, depth: usize, lines: &mut Vec<String>) {
        let pad = "  ".repeat(depth);
        match value {
            Value::Object(map) => {
                for (key, item) in map {
                    if is_nested(item) {
                        lines.push(format!("{pad}{}:", key.blue().bold()));
                        render(item, depth + 1, lines);
                    } else {
                        lines.push(format!("{pad}{}: {}", key.blue().bold(), scalar_text(item)));
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    if is_nested(item) {
                        lines.push(format!("{pad}-"));
                        render(item, depth + 1, lines);
                    } else {
                        lines.push(format!("{pad}- {}", scalar_text(item)));
                    }
                }
            }
            scalar => lines.push(format!("{pad}{}", scalar_text(scalar))),
        }
    }
}

/// Compiler diagnostic listings.
pub mod diagnostics {
    use super::Colorize;
    use snipbox_core::{Diagnostic, Severity};

    /// Renders one diagnostic as `file:line:col: severity: message`.
    #[must_use]
    pub fn format_one(file: &str, diagnostic: &Diagnostic) -> String {
        let label = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".cyan(),
        };
        let position = diagnostic
            .location
            .map_or_else(|| file.to_string(), |loc| format!("{file}:{loc}"));
        format!("{}: {label}: {}", position.bold(), diagnostic.message)
    }

    /// Renders every diagnostic followed by a summary line.
    #[must_use]
    pub fn format_all(file: &str, diagnostics: &[Diagnostic]) -> String {
        let mut out = String::new();
        for diagnostic in diagnostics {
            out.push_str(&format_one(file, diagnostic));
            out.push('\n');
        }

        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        let warnings = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        let summary = format!("{errors} error(s), {warnings} warning(s)");
        if errors == 0 {
            out.push_str(&summary.green().to_string());
        } else {
            out.push_str(&summary.red().to_string());
        }
        out
    }
}
