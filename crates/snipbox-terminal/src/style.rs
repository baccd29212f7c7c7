//! Text styles: colors and decorations.

use bitflags::bitflags;
use std::fmt;

/// Foreground or background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// The surface's own default color; emits no SGR parameter.
    #[default]
    Default,
    /// 24-bit color.
    Rgb(u8, u8, u8),
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("maroon", (128, 0, 0)),
    ("green", (0, 128, 0)),
    ("olive", (128, 128, 0)),
    ("navy", (0, 0, 128)),
    ("purple", (128, 0, 128)),
    ("teal", (0, 128, 128)),
    ("silver", (192, 192, 192)),
    ("grey", (128, 128, 128)),
    ("gray", (128, 128, 128)),
    ("red", (255, 0, 0)),
    ("lime", (0, 255, 0)),
    ("yellow", (255, 255, 0)),
    ("blue", (0, 0, 255)),
    ("fuchsia", (255, 0, 255)),
    ("magenta", (255, 0, 255)),
    ("aqua", (0, 255, 255)),
    ("cyan", (0, 255, 255)),
    ("white", (255, 255, 255)),
    ("orange", (255, 165, 0)),
];

impl Color {
    /// Creates a 24-bit color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgb(r, g, b)
    }

    /// Parses a color name, `#rrggbb`, or `rgb(r,g,b)`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "default" {
            return Some(Self::Default);
        }
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 {
                return None;
            }
            let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
            return Some(Self::Rgb(channel(0)?, channel(2)?, channel(4)?));
        }
        if let Some(body) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
            let mut parts = body.split(',').map(|p| p.trim().parse::<u8>());
            let r = parts.next()?.ok()?;
            let g = parts.next()?.ok()?;
            let b = parts.next()?.ok()?;
            return parts.next().is_none().then_some(Self::Rgb(r, g, b));
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, (r, g, b))| Self::Rgb(*r, *g, *b))
    }

    /// Whether this is the default color.
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }
}

bitflags! {
    /// Text decorations, one bit per SGR attribute 1 through 9.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Decoration: u16 {
        /// SGR 1
        const BOLD = 1 << 0;
        /// SGR 2
        const DIM = 1 << 1;
        /// SGR 3
        const ITALIC = 1 << 2;
        /// SGR 4
        const UNDERLINE = 1 << 3;
        /// SGR 5
        const SLOW_BLINK = 1 << 4;
        /// SGR 6
        const RAPID_BLINK = 1 << 5;
        /// SGR 7
        const INVERT = 1 << 6;
        /// SGR 8
        const CONCEAL = 1 << 7;
        /// SGR 9
        const STRIKETHROUGH = 1 << 8;
    }
}

const DECORATION_CODES: [(Decoration, u8); 9] = [
    (Decoration::BOLD, 1),
    (Decoration::DIM, 2),
    (Decoration::ITALIC, 3),
    (Decoration::UNDERLINE, 4),
    (Decoration::SLOW_BLINK, 5),
    (Decoration::RAPID_BLINK, 6),
    (Decoration::INVERT, 7),
    (Decoration::CONCEAL, 8),
    (Decoration::STRIKETHROUGH, 9),
];

impl Decoration {
    /// SGR parameters for the set bits, in ascending order.
    pub fn sgr_codes(self) -> impl Iterator<Item = u8> {
        DECORATION_CODES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, code)| code)
    }

    /// Parses a decoration keyword as used in markup.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "bold" | "b" => Some(Self::BOLD),
            "dim" => Some(Self::DIM),
            "italic" | "i" => Some(Self::ITALIC),
            "underline" | "u" => Some(Self::UNDERLINE),
            "blink" | "slowblink" => Some(Self::SLOW_BLINK),
            "rapidblink" => Some(Self::RAPID_BLINK),
            "invert" | "reverse" => Some(Self::INVERT),
            "conceal" => Some(Self::CONCEAL),
            "strikethrough" | "s" => Some(Self::STRIKETHROUGH),
            _ => None,
        }
    }
}

/// Complete style of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Decorations
    pub decoration: Decoration,
}

impl Style {
    /// The unstyled style.
    pub const PLAIN: Self = Self {
        fg: Color::Default,
        bg: Color::Default,
        decoration: Decoration::empty(),
    };

    /// Sets the foreground color.
    #[must_use]
    pub const fn fg(mut self, color: Color) -> Self {
        self.fg = color;
        self
    }

    /// Sets the background color.
    #[must_use]
    pub const fn bg(mut self, color: Color) -> Self {
        self.bg = color;
        self
    }

    /// Adds decorations.
    #[must_use]
    pub fn decorate(mut self, decoration: Decoration) -> Self {
        self.decoration |= decoration;
        self
    }

    /// True when rendering this style needs no escape sequence.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.fg.is_default() && self.bg.is_default() && self.decoration.is_empty()
    }

    /// Layers `other` on top of `self`: explicit colors win and decorations accumulate.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            fg: if other.fg.is_default() { self.fg } else { other.fg },
            bg: if other.bg.is_default() { self.bg } else { other.bg },
            decoration: self.decoration | other.decoration,
        }
    }

    /// Parses a style description such as `bold red on #202020`.
    ///
    /// # Errors
    ///
    /// Returns the offending word when it is neither a decoration nor a color.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut style = Self::PLAIN;
        let mut words = spec.split_whitespace();
        while let Some(word) = words.next() {
            if word.eq_ignore_ascii_case("on") {
                let color = words
                    .next()
                    .ok_or_else(|| "expected a color after 'on'".to_string())?;
                style.bg = Color::parse(color).ok_or_else(|| format!("unknown color '{color}'"))?;
            } else if let Some(deco) = Decoration::parse(word) {
                style.decoration |= deco;
            } else if let Some(color) = Color::parse(word) {
                style.fg = color;
            } else {
                return Err(format!("unknown style '{word}'"));
            }
        }
        Ok(style)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse() {
        assert_eq!(Color::parse("red"), Some(Color::Rgb(255, 0, 0)));
        assert_eq!(Color::parse("#0A0b0c"), Some(Color::Rgb(10, 11, 12)));
        assert_eq!(Color::parse("rgb(1, 2, 3)"), Some(Color::Rgb(1, 2, 3)));
        assert_eq!(Color::parse("default"), Some(Color::Default));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("rgb(1,2)"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn test_sgr_codes_order() {
        let deco = Decoration::STRIKETHROUGH | Decoration::BOLD | Decoration::UNDERLINE;
        assert_eq!(deco.sgr_codes().collect::<Vec<_>>(), vec![1, 4, 9]);
        assert_eq!(Decoration::empty().sgr_codes().count(), 0);
    }

    #[test]
    fn test_style_parse() {
        let style = Style::parse("bold red on #202020").unwrap();
        assert_eq!(style.fg, Color::Rgb(255, 0, 0));
        assert_eq!(style.bg, Color::Rgb(32, 32, 32));
        assert!(style.decoration.contains(Decoration::BOLD));

        assert!(Style::parse("bold on").is_err());
        assert!(Style::parse("sparkly").is_err());
        assert!(Style::parse("").unwrap().is_plain());
    }

    #[test]
    fn test_combine() {
        let outer = Style::PLAIN.fg(Color::rgb(1, 1, 1)).decorate(Decoration::BOLD);
        let inner = Style::PLAIN.decorate(Decoration::ITALIC);
        let combined = outer.combine(&inner);
        assert_eq!(combined.fg, Color::rgb(1, 1, 1));
        assert_eq!(combined.decoration, Decoration::BOLD | Decoration::ITALIC);
    }
}
