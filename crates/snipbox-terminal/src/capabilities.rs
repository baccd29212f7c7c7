//! Fixed description of what the remote surface supports.

use serde::{Deserialize, Serialize};
use snipbox_core::TerminalConfig;

/// Color depth of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorDepth {
    /// No color
    NoColors,
    /// 16 colors
    Standard,
    /// 256 colors
    EightBit,
    /// 24-bit color
    TrueColor,
}

/// Capabilities advertised to renderers.
///
/// The surface is a browser-hosted terminal, so the answers are constant
/// apart from the grid size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalCapabilities {
    /// Grid width in columns
    pub columns: u16,
    /// Grid height in rows
    pub rows: u16,
    /// Color depth
    pub color_depth: ColorDepth,
    /// ANSI escapes are interpreted
    pub ansi: bool,
    /// Keys can be read
    pub interactive: bool,
    /// Unicode box drawing is available
    pub unicode: bool,
    /// OSC 8 hyperlinks are supported
    pub links: bool,
    /// Legacy Windows console quirks apply
    pub legacy_console: bool,
}

impl TerminalCapabilities {
    /// Capabilities for a surface of the configured size.
    #[must_use]
    pub const fn fixed(config: &TerminalConfig) -> Self {
        Self {
            columns: config.columns,
            rows: config.rows,
            color_depth: ColorDepth::TrueColor,
            ansi: true,
            interactive: true,
            unicode: true,
            links: false,
            legacy_console: false,
        }
    }
}

impl Default for TerminalCapabilities {
    fn default() -> Self {
        Self::fixed(&TerminalConfig::default())
    }
}
