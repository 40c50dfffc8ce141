//! Styled line output using crossterm

use std::io::{self, IsTerminal, Stdout, Write};

use crossterm::{
    queue,
    style::{Attribute, Color as TermColor, ContentStyle, Print, PrintStyledContent},
};

use ctxlight::syntax::{Color, Grammar, Span, Style};
use ctxlight::Result;

/// Writes highlighted lines to a terminal or a plain stream
pub struct Terminal<W: Write> {
    out: W,
    /// Emit escape sequences; off when stdout is not a terminal
    color: bool,
}

impl Terminal<Stdout> {
    /// Stdout, colored only when it is a terminal
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_terminal();
        Self { out, color }
    }
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Write a line's text, one styled run per span, then a newline
    pub fn write_line(&mut self, text: &str, spans: &[Span], grammar: &Grammar) -> Result<()> {
        if !self.color || spans.is_empty() {
            queue!(self.out, Print(text), Print("\n"))?;
            return Ok(());
        }
        for span in spans {
            let Some(slice) = text.get(span.start..span.end) else {
                continue;
            };
            let style = content_style(&grammar.resolve_style(&span.style));
            queue!(self.out, PrintStyledContent(style.apply(slice)))?;
        }
        queue!(self.out, Print("\n"))?;
        Ok(())
    }

    /// Write an unstyled prefix such as a line-state column
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        queue!(self.out, Print(s))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn content_style(style: &Style) -> ContentStyle {
    let mut content = ContentStyle::new();
    content.foreground_color = term_color(style.fg);
    content.background_color = term_color(style.bg);
    if style.bold {
        content.attributes.set(Attribute::Bold);
    }
    if style.italic {
        content.attributes.set(Attribute::Italic);
    }
    if style.underline {
        content.attributes.set(Attribute::Underlined);
    }
    if style.strike_out {
        content.attributes.set(Attribute::CrossedOut);
    }
    content
}

fn term_color(color: Color) -> Option<TermColor> {
    let mapped = match color {
        Color::Default => return None,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::White => TermColor::Grey,
        Color::BrightBlack => TermColor::DarkGrey,
        Color::BrightRed => TermColor::Red,
        Color::BrightGreen => TermColor::Green,
        Color::BrightYellow => TermColor::Yellow,
        Color::BrightBlue => TermColor::Blue,
        Color::BrightMagenta => TermColor::Magenta,
        Color::BrightCyan => TermColor::Cyan,
        Color::BrightWhite => TermColor::White,
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxlight::syntax::c_definition;

    #[test]
    fn test_plain_output_when_color_is_off() {
        let grammar = c_definition().resolve().unwrap();
        let mut term = Terminal::new(Vec::new(), false);
        let spans = vec![Span::new(0, 3, "DataType".into()), Span::new(3, 5, "Normal".into())];
        term.write_line("int x", &spans, &grammar).unwrap();
        assert_eq!(term.into_inner(), b"int x\n");
    }

    #[test]
    fn test_colored_output_keeps_text() {
        let grammar = c_definition().resolve().unwrap();
        let mut term = Terminal::new(Vec::new(), true);
        let spans = vec![Span::new(0, 6, "Keyword".into())];
        term.write_line("return", &spans, &grammar).unwrap();
        let out = String::from_utf8(term.into_inner()).unwrap();
        assert!(out.contains("return"));
        assert!(out.contains('\u{1b}'));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_color_mapping() {
        assert_eq!(term_color(Color::Default), None);
        assert_eq!(term_color(Color::Red), Some(TermColor::DarkRed));
        assert_eq!(term_color(Color::BrightWhite), Some(TermColor::White));
        assert_eq!(
            term_color(Color::Rgb(1, 2, 3)),
            Some(TermColor::Rgb { r: 1, g: 2, b: 3 })
        );
    }
}
