//! Inline markup: `[bold red]warning[/] plain`.
//!
//! Tags open a style that layers on the enclosing one; `[/]` closes the
//! innermost tag. `[[` and `]]` produce literal brackets.

use crate::error::{Result, TerminalError};
use crate::render::{RenderOptions, Renderable, Text};
use crate::segment::Segment;
use crate::style::Style;

/// Parsed markup, rendered like [`Text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    text: Text,
}

impl Markup {
    /// Parses markup text.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Markup`] for unknown styles, unterminated
    /// tags, or a close tag with nothing open.
    pub fn parse(source: &str) -> Result<Self> {
        let mut text = Text::new();
        let mut stack: Vec<Style> = vec![Style::PLAIN];
        let mut buffer = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '[' if chars.peek().map(|(_, c)| *c) == Some('[') => {
                    chars.next();
                    buffer.push('[');
                }
                ']' if chars.peek().map(|(_, c)| *c) == Some(']') => {
                    chars.next();
                    buffer.push(']');
                }
                '[' => {
                    let mut tag = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        tag.push(c);
                    }
                    if !closed {
                        return Err(markup_error(offset, "unterminated tag"));
                    }

                    let current = stack.last().copied().unwrap_or_default();
                    text.push(std::mem::take(&mut buffer), current);

                    if tag.starts_with('/') {
                        if stack.len() == 1 {
                            return Err(markup_error(offset, "close tag without an open tag"));
                        }
                        stack.pop();
                    } else {
                        let style = Style::parse(&tag).map_err(|msg| markup_error(offset, &msg))?;
                        stack.push(current.combine(&style));
                    }
                }
                c => buffer.push(c),
            }
        }

        let current = stack.last().copied().unwrap_or_default();
        text.push(buffer, current);
        Ok(Self { text })
    }

    /// The styled text this markup produced.
    #[must_use]
    pub const fn text(&self) -> &Text {
        &self.text
    }
}

impl Renderable for Markup {
    fn render(&self, options: &RenderOptions) -> Vec<Segment> {
        self.text.render(options)
    }
}

/// Escapes brackets so `text` renders literally inside markup.
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace('[', "[[").replace(']', "]]")
}

fn markup_error(offset: usize, message: &str) -> TerminalError {
    TerminalError::Markup {
        offset,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Color, Decoration};

    #[test]
    fn test_parse_nested_tags() {
        let markup = Markup::parse("a[bold]b[red]c[/]d[/]e").unwrap();
        let spans = markup.text().spans();
        assert_eq!(spans.len(), 5);
        assert_eq!(spans[0].style, Style::PLAIN);
        assert_eq!(spans[1].style.decoration, Decoration::BOLD);
        assert_eq!(spans[2].style.fg, Color::rgb(255, 0, 0));
        assert!(spans[2].style.decoration.contains(Decoration::BOLD));
        assert_eq!(spans[3].style.fg, Color::Default);
        assert_eq!(spans[4].text, "e");
    }

    #[test]
    fn test_escaped_brackets() {
        let markup = Markup::parse("[[x]] ok").unwrap();
        assert_eq!(markup.text().plain_text(), "[x] ok");
        assert_eq!(escape("[a]"), "[[a]]");
    }

    #[test]
    fn test_unclosed_tags_keep_style() {
        let markup = Markup::parse("[italic]tail").unwrap();
        assert_eq!(
            markup.text().spans()[0].style.decoration,
            Decoration::ITALIC
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Markup::parse("[bold"),
            Err(TerminalError::Markup { offset: 0, .. })
        ));
        assert!(Markup::parse("x[/]").is_err());
        assert!(Markup::parse("[glitter]x").is_err());
    }
}
