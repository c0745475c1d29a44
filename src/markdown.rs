//! Terminal rendering of the Markdown that models tend to answer with.

use crossterm::style::Stylize;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, Copy, Default)]
struct Style {
    heading: bool,
    strong: bool,
    emphasis: bool,
    strike: bool,
}

/// Render `text` to styled terminal lines, without the Markdown markers.
pub(crate) fn render(text: &str) -> Vec<String> {
    let mut w = Writer::default();

    for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(tag) => match tag {
                Tag::Heading { .. } => {
                    w.block_break();
                    w.style.heading = true;
                }
                Tag::Paragraph => w.block_break(),
                Tag::CodeBlock(_) => {
                    w.block_break();
                    w.in_code_block = true;
                }
                Tag::List(start) => {
                    if w.lists.is_empty() {
                        w.block_break();
                    } else {
                        w.flush_line();
                    }
                    w.lists.push(start);
                }
                Tag::Item => {
                    w.flush_line();
                    let depth = w.lists.len().saturating_sub(1);
                    let marker = match w.lists.last_mut() {
                        Some(Some(n)) => {
                            let m = format!("{n}.");
                            *n += 1;
                            m
                        }
                        _ => "•".to_string(),
                    };
                    w.line.push_str(&"  ".repeat(depth));
                    w.line.push_str(&format!("{} ", marker.dark_grey()));
                }
                Tag::Strong => w.style.strong = true,
                Tag::Emphasis => w.style.emphasis = true,
                Tag::Strikethrough => w.style.strike = true,
                _ => {}
            },
            Event::End(tag) => match tag {
                TagEnd::Heading(_) => {
                    w.style.heading = false;
                    w.flush_line();
                }
                TagEnd::Paragraph | TagEnd::Item => w.flush_line(),
                TagEnd::CodeBlock => {
                    w.in_code_block = false;
                    w.flush_line();
                }
                TagEnd::List(_) => {
                    w.lists.pop();
                    w.flush_line();
                }
                TagEnd::Strong => w.style.strong = false,
                TagEnd::Emphasis => w.style.emphasis = false,
                TagEnd::Strikethrough => w.style.strike = false,
                _ => {}
            },
            Event::Text(t) if w.in_code_block => {
                for line in t.lines() {
                    w.lines.push(code_line(line));
                }
            }
            Event::Text(t) => {
                let painted = paint(&t, w.style);
                w.line.push_str(&painted);
            }
            Event::Code(code) => w.line.push_str(&code.to_string().yellow().to_string()),
            Event::SoftBreak | Event::HardBreak => w.flush_line(),
            Event::Rule => {
                w.block_break();
                w.lines.push("─".repeat(24).dark_grey().to_string());
            }
            _ => {}
        }
    }

    w.flush_line();
    while w.lines.last().is_some_and(String::is_empty) {
        w.lines.pop();
    }
    w.lines
}

/// One line of a fenced code block.
pub(crate) fn code_line(line: &str) -> String {
    format!("  {}", line.to_string().yellow())
}

fn paint(text: &str, style: Style) -> String {
    let mut styled = text.to_string().stylize();
    if style.heading {
        styled = styled.bold().underlined();
    }
    if style.strong {
        styled = styled.bold();
    }
    if style.emphasis {
        styled = styled.italic();
    }
    if style.strike {
        styled = styled.crossed_out();
    }
    styled.to_string()
}

#[derive(Default)]
struct Writer {
    lines: Vec<String>,
    line: String,
    style: Style,
    lists: Vec<Option<u64>>,
    in_code_block: bool,
}

impl Writer {
    fn flush_line(&mut self) {
        if !self.line.is_empty() {
            self.lines.push(std::mem::take(&mut self.line));
        }
    }

    /// Separate top-level blocks by one blank line. Items of a list stay
    /// together.
    fn block_break(&mut self) {
        self.flush_line();
        if self.lists.is_empty() && self.lines.last().is_some_and(|l| !l.is_empty()) {
            self.lines.push(String::new());
        }
    }
}
