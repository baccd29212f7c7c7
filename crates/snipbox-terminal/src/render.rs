//! Renderable output objects.
//!
//! A [`Renderable`] turns itself into [`Segment`]s for a given grid width.
//! The output bridge encodes the segments as ANSI text and ships them to
//! the transport.

use crate::capabilities::TerminalCapabilities;
use crate::segment::{ControlCode, Segment};
use crate::style::Style;

/// Layout parameters for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Width of the grid in columns
    pub width: usize,
    /// Whether box-drawing characters may be used
    pub unicode: bool,
    /// Column the cursor sits at when the output starts
    pub column: usize,
}

impl RenderOptions {
    /// Options derived from the surface capabilities.
    #[must_use]
    pub fn from_capabilities(caps: &TerminalCapabilities) -> Self {
        Self {
            width: usize::from(caps.columns.max(1)),
            unicode: caps.unicode,
            column: 0,
        }
    }

    /// The same options for output starting at `column`.
    #[must_use]
    pub const fn at_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }
}

/// Something that can be drawn on the terminal.
pub trait Renderable: Send + Sync {
    /// Produces the segments for this object.
    fn render(&self, options: &RenderOptions) -> Vec<Segment>;
}

impl Renderable for str {
    fn render(&self, _options: &RenderOptions) -> Vec<Segment> {
        vec![Segment::plain(self)]
    }
}

impl Renderable for String {
    fn render(&self, options: &RenderOptions) -> Vec<Segment> {
        self.as_str().render(options)
    }
}

impl Renderable for ControlCode {
    fn render(&self, _options: &RenderOptions) -> Vec<Segment> {
        vec![Segment::Control(self.clone())]
    }
}

impl<T: Renderable + ?Sized> Renderable for &T {
    fn render(&self, options: &RenderOptions) -> Vec<Segment> {
        (**self).render(options)
    }
}

/// A run of characters sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// The characters
    pub text: String,
    /// Their style
    pub style: Style,
}

/// Styled text that hard-wraps at the grid width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    spans: Vec<Span>,
}

impl Text {
    /// Creates empty text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates text from a single styled run.
    #[must_use]
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        let mut out = Self::new();
        out.push(text, style);
        out
    }

    /// Appends a styled run.
    pub fn push(&mut self, text: impl Into<String>, style: Style) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.spans.push(Span { text, style }),
        }
    }

    /// Builder form of [`Text::push`].
    #[must_use]
    pub fn with(mut self, text: impl Into<String>, style: Style) -> Self {
        self.push(text, style);
        self
    }

    /// The runs making up this text.
    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Concatenated characters without styling.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

impl Renderable for Text {
    fn render(&self, options: &RenderOptions) -> Vec<Segment> {
        let width = options.width.max(1);
        let mut segments = Vec::with_capacity(self.spans.len());
        let mut column = options.column.min(width);

        for span in &self.spans {
            let mut current = String::new();
            for ch in span.text.chars() {
                if ch == '\n' {
                    current.push('\n');
                    column = 0;
                    continue;
                }
                if column == width {
                    current.push('\n');
                    column = 0;
                }
                current.push(ch);
                column += 1;
            }
            if !current.is_empty() {
                segments.push(Segment::styled(current, span.style));
            }
        }
        segments
    }
}

/// A horizontal line across the grid, optionally with a centered title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    title: Option<String>,
    style: Style,
}

impl Rule {
    /// Creates an untitled rule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the line style.
    #[must_use]
    pub const fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

impl Renderable for Rule {
    fn render(&self, options: &RenderOptions) -> Vec<Segment> {
        let width = options.width.max(1);
        let line_char = if options.unicode { '─' } else { '-' };

        let line = match &self.title {
            Some(title) if title.chars().count() + 4 <= width => {
                let title_len = title.chars().count() + 2;
                let left = (width - title_len) / 2;
                let right = width - title_len - left;
                format!(
                    "{} {title} {}",
                    line_char.to_string().repeat(left),
                    line_char.to_string().repeat(right)
                )
            }
            _ => line_char.to_string().repeat(width),
        };

        let mut segments = Vec::with_capacity(3);
        if options.column > 0 {
            segments.push(Segment::line_break());
        }
        segments.push(Segment::styled(line, self.style));
        segments.push(Segment::line_break());
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(width: usize) -> RenderOptions {
        RenderOptions {
            width,
            unicode: true,
            column: 0,
        }
    }

    fn joined(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|s| match s {
                Segment::Text { text, .. } => text.clone(),
                Segment::Control(c) => c.to_ansi(),
            })
            .collect()
    }

    #[test]
    fn test_text_wraps_at_width() {
        let text = Text::styled("abcdefgh", Style::PLAIN);
        assert_eq!(joined(&text.render(&opts(3))), "abc\ndef\ngh");
    }

    #[test]
    fn test_text_wrap_resets_on_newline() {
        let text = Text::styled("ab\ncdef", Style::PLAIN);
        assert_eq!(joined(&text.render(&opts(3))), "ab\ncde\nf");
    }

    #[test]
    fn test_text_wrap_counts_from_start_column() {
        let text = Text::styled("abcde", Style::PLAIN);
        assert_eq!(joined(&text.render(&opts(4).at_column(2))), "ab\ncde");
        assert_eq!(joined(&text.render(&opts(4).at_column(4))), "\nabcd\ne");
    }

    #[test]
    fn test_text_merges_same_style_spans() {
        let text = Text::new()
            .with("a", Style::PLAIN)
            .with("b", Style::PLAIN)
            .with("", Style::PLAIN);
        assert_eq!(text.spans().len(), 1);
        assert_eq!(text.plain_text(), "ab");
    }

    #[test]
    fn test_rule_with_title() {
        let rule = Rule::new().title("hi");
        let segments = rule.render(&opts(10));
        assert_eq!(joined(&segments), "─── hi ───\n");
    }

    #[test]
    fn test_rule_mid_line_starts_on_a_fresh_row() {
        let segments = Rule::new().render(&opts(3).at_column(1));
        assert_eq!(joined(&segments), "\n───\n");
    }

    #[test]
    fn test_rule_ascii_fallback() {
        let segments = Rule::new().render(&RenderOptions {
            width: 4,
            unicode: false,
            column: 0,
        });
        assert_eq!(joined(&segments), "----\n");
    }
}
