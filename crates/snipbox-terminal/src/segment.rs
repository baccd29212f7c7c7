//! Rendered output units.

use crate::ansi;
use crate::style::Style;

/// Cursor and screen control that bypasses text styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCode {
    /// Move up `n` rows
    CursorUp(u16),
    /// Move down `n` rows
    CursorDown(u16),
    /// Move left `n` columns
    CursorLeft(u16),
    /// Move right `n` columns
    CursorRight(u16),
    /// Absolute zero-based placement
    CursorPosition {
        /// Column
        column: u16,
        /// Row
        row: u16,
    },
    /// Raw escape text, sent verbatim
    Raw(String),
}

impl ControlCode {
    /// Whether sending the control would change nothing.
    ///
    /// Terminals read a zero count as one, so zero-count moves must not be
    /// sent at all.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(
            self,
            Self::CursorUp(0) | Self::CursorDown(0) | Self::CursorLeft(0) | Self::CursorRight(0)
        )
    }

    /// Encodes the control as ANSI text.
    #[must_use]
    pub fn to_ansi(&self) -> String {
        match self {
            Self::CursorUp(n) => ansi::cursor_up(*n),
            Self::CursorDown(n) => ansi::cursor_down(*n),
            Self::CursorLeft(n) => ansi::cursor_left(*n),
            Self::CursorRight(n) => ansi::cursor_right(*n),
            Self::CursorPosition { column, row } => ansi::cursor_position(*column, *row),
            Self::Raw(text) => text.clone(),
        }
    }
}

/// A piece of rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Styled text; may contain `\n`
    Text {
        /// The characters
        text: String,
        /// Their style
        style: Style,
    },
    /// A control sequence
    Control(ControlCode),
}

impl Segment {
    /// Creates an unstyled text segment.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            style: Style::PLAIN,
        }
    }

    /// Creates a styled text segment.
    #[must_use]
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self::Text {
            text: text.into(),
            style,
        }
    }

    /// A single line break.
    #[must_use]
    pub fn line_break() -> Self {
        Self::plain("\n")
    }

    /// Whether the segment produces no output.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        match self {
            Self::Text { .. } => false,
            Self::Control(code) => code.is_noop(),
        }
    }

    /// Encodes the segment as it goes over the wire.
    #[must_use]
    pub fn to_ansi(&self) -> String {
        match self {
            Self::Text { text, style } => ansi::styled(text, style),
            Self::Control(code) => code.to_ansi(),
        }
    }
}
