//! ANSI escape sequence encoding.

use crate::style::{Color, Style};
use std::fmt::Write as _;

/// Control sequence introducer.
pub const CSI: &str = "\x1b[";

/// Resets every SGR attribute.
pub const RESET: &str = "\x1b[0m";

/// Builds the SGR sequence for `style`, or `None` when the style is plain.
#[must_use]
pub fn sgr(style: &Style) -> Option<String> {
    if style.is_plain() {
        return None;
    }
    let mut params: Vec<String> = style
        .decoration
        .sgr_codes()
        .map(|code| code.to_string())
        .collect();
    if let Color::Rgb(r, g, b) = style.fg {
        params.push(format!("38;2;{r};{g};{b}"));
    }
    if let Color::Rgb(r, g, b) = style.bg {
        params.push(format!("48;2;{r};{g};{b}"));
    }
    Some(format!("{CSI}{}m", params.join(";")))
}

/// Wraps `text` in the SGR sequence for `style` and a trailing reset.
///
/// Plain text passes through unchanged.
#[must_use]
pub fn styled(text: &str, style: &Style) -> String {
    match sgr(style) {
        Some(prefix) => {
            let mut out = String::with_capacity(prefix.len() + text.len() + RESET.len());
            out.push_str(&prefix);
            out.push_str(text);
            out.push_str(RESET);
            out
        }
        None => text.to_string(),
    }
}

/// Moves the cursor up `n` rows.
#[must_use]
pub fn cursor_up(n: u16) -> String {
    format!("{CSI}{n}A")
}

/// Moves the cursor down `n` rows.
#[must_use]
pub fn cursor_down(n: u16) -> String {
    format!("{CSI}{n}B")
}

/// Moves the cursor right `n` columns.
#[must_use]
pub fn cursor_right(n: u16) -> String {
    format!("{CSI}{n}C")
}

/// Moves the cursor left `n` columns.
#[must_use]
pub fn cursor_left(n: u16) -> String {
    format!("{CSI}{n}D")
}

/// Places the cursor at a zero-based column and row.
#[must_use]
pub fn cursor_position(column: u16, row: u16) -> String {
    let mut out = String::from(CSI);
    let _ = write!(
        out,
        "{};{}H",
        u32::from(row) + 1,
        u32::from(column) + 1
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Decoration;

    #[test]
    fn test_sgr_fg_and_bold() {
        let style = Style::PLAIN
            .fg(Color::rgb(255, 0, 0))
            .decorate(Decoration::BOLD);
        let out = styled("hi", &style);
        assert_eq!(out, "\x1b[1;38;2;255;0;0mhi\x1b[0m");
    }

    #[test]
    fn test_sgr_background_only() {
        let style = Style::PLAIN.bg(Color::rgb(1, 2, 3));
        assert_eq!(sgr(&style).unwrap(), "\x1b[48;2;1;2;3m");
    }

    #[test]
    fn test_plain_text_is_bare() {
        assert_eq!(styled("plain", &Style::PLAIN), "plain");
        assert!(sgr(&Style::default()).is_none());
    }

    #[test]
    fn test_cursor_sequences() {
        assert_eq!(cursor_up(2), "\x1b[2A");
        assert_eq!(cursor_down(1), "\x1b[1B");
        assert_eq!(cursor_right(3), "\x1b[3C");
        assert_eq!(cursor_left(4), "\x1b[4D");
        assert_eq!(cursor_position(0, 0), "\x1b[1;1H");
        assert_eq!(cursor_position(9, 4), "\x1b[5;10H");
    }
}
