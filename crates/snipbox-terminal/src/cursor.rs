//! Local model of the remote cursor.
//!
//! The surface never reports its cursor back, so the bridge keeps its own
//! estimate from everything it sends.

/// Tracks the zero-based cursor column and row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorTracker {
    column: u16,
    row: u16,
    width: u16,
}

#[derive(Clone, Copy)]
enum Scan {
    Text,
    Escape,
    Csi,
}

impl CursorTracker {
    /// Creates a tracker at the origin for a grid `width` columns wide.
    #[must_use]
    pub const fn new(width: u16) -> Self {
        Self {
            column: 0,
            row: 0,
            width: if width == 0 { 1 } else { width },
        }
    }

    /// Current `(column, row)`.
    #[must_use]
    pub const fn position(&self) -> (u16, u16) {
        (self.column, self.row)
    }

    /// Accounts for text written at the cursor.
    ///
    /// Escape sequences are skipped. Wrapping is deferred: a character that
    /// lands past the last column first moves to the next row.
    pub fn advance(&mut self, text: &str) {
        let mut state = Scan::Text;
        for ch in text.chars() {
            state = match state {
                Scan::Escape => {
                    if ch == '[' {
                        Scan::Csi
                    } else {
                        Scan::Text
                    }
                }
                Scan::Csi => {
                    if ('\x40'..='\x7e').contains(&ch) {
                        Scan::Text
                    } else {
                        Scan::Csi
                    }
                }
                Scan::Text => {
                    self.advance_char(ch);
                    if ch == '\x1b' { Scan::Escape } else { Scan::Text }
                }
            };
        }
    }

    fn advance_char(&mut self, ch: char) {
        match ch {
            '\n' => {
                self.row = self.row.saturating_add(1);
                self.column = 0;
            }
            '\r' => self.column = 0,
            '\x08' => self.column = self.column.saturating_sub(1),
            c if c.is_control() => {}
            _ => {
                if self.column >= self.width {
                    self.row = self.row.saturating_add(1);
                    self.column = 0;
                }
                self.column += 1;
            }
        }
    }

    /// Moves up, stopping at row zero.
    pub const fn move_up(&mut self, n: u16) {
        self.row = self.row.saturating_sub(n);
    }

    /// Moves down.
    pub const fn move_down(&mut self, n: u16) {
        self.row = self.row.saturating_add(n);
    }

    /// Moves left, stopping at column zero.
    pub const fn move_left(&mut self, n: u16) {
        self.column = self.column.saturating_sub(n);
    }

    /// Moves right, stopping at the last column.
    pub fn move_right(&mut self, n: u16) {
        self.column = self.column.saturating_add(n).min(self.width - 1);
    }

    /// Places the cursor absolutely.
    pub const fn set(&mut self, column: u16, row: u16) {
        self.column = column;
        self.row = row;
    }

    /// Returns to the origin.
    pub const fn home(&mut self) {
        self.set(0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newline_and_carriage_return() {
        let mut cursor = CursorTracker::new(80);
        cursor.advance("Hello\nab");
        assert_eq!(cursor.position(), (2, 1));
        cursor.advance("\r");
        assert_eq!(cursor.position(), (0, 1));
    }

    #[test]
    fn test_deferred_wrap() {
        let mut cursor = CursorTracker::new(3);
        cursor.advance("abc");
        assert_eq!(cursor.position(), (3, 0));
        cursor.advance("\n");
        assert_eq!(cursor.position(), (0, 1));
        cursor.advance("abcd");
        assert_eq!(cursor.position(), (1, 2));
    }

    #[test]
    fn test_escape_sequences_do_not_move() {
        let mut cursor = CursorTracker::new(80);
        cursor.advance("\x1b[1;38;2;255;0;0mhi\x1b[0m");
        assert_eq!(cursor.position(), (2, 0));
    }

    #[test]
    fn test_moves_clamp() {
        let mut cursor = CursorTracker::new(10);
        cursor.move_up(3);
        cursor.move_left(3);
        assert_eq!(cursor.position(), (0, 0));
        cursor.move_right(50);
        cursor.move_down(2);
        assert_eq!(cursor.position(), (9, 2));
        cursor.set(4, 7);
        assert_eq!(cursor.position(), (4, 7));
        cursor.home();
        assert_eq!(cursor.position(), (0, 0));
    }

    #[test]
    fn test_backspace() {
        let mut cursor = CursorTracker::new(10);
        cursor.advance("ab\x08 \x08");
        assert_eq!(cursor.position(), (1, 0));
    }
}
