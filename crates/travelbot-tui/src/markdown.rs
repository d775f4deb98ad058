//! Markdown to styled terminal lines.
//!
//! Supports paragraphs, emphasis, links and (nested) lists. Headings and
//! code fall back to plain styled text. Images and raw HTML produce nothing,
//! and control characters are stripped so reply text can never smuggle
//! terminal escape sequences onto the screen.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Drop control characters (C0, DEL, C1); tabs become spaces.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

struct ListLevel {
    /// Next ordinal for ordered lists.
    next: Option<u64>,
}

struct Renderer {
    base: Style,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    strong: usize,
    emphasis: usize,
    heading: usize,
    image: usize,
    in_code_block: bool,
    link: Option<(String, String)>, // (destination, text seen so far)
    lists: Vec<ListLevel>,
}

impl Renderer {
    fn new(base: Style) -> Self {
        Self {
            base,
            lines: Vec::new(),
            current: Vec::new(),
            strong: 0,
            emphasis: 0,
            heading: 0,
            image: 0,
            in_code_block: false,
            link: None,
            lists: Vec::new(),
        }
    }

    fn style(&self) -> Style {
        let mut style = self.base;
        if self.strong > 0 || self.heading > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.emphasis > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.link.is_some() {
            style = style.fg(Color::LightBlue).add_modifier(Modifier::UNDERLINED);
        }
        style
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.image > 0 {
            return;
        }
        let text = sanitize(text);
        if text.is_empty() {
            return;
        }
        if let Some((_, seen)) = self.link.as_mut() {
            seen.push_str(&text);
        }
        let style = self.style();
        self.current.push(Span::styled(text, style));
    }

    fn push_code_block(&mut self, text: &str) {
        let style = self.base.fg(Color::Yellow);
        for line in text.lines() {
            self.lines.push(Line::from(Span::styled(format!("  {}", sanitize(line)), style)));
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            // a list item's marker may already be pending on the line
            Tag::Paragraph => {}
            Tag::Heading { .. } => {
                self.blank();
                self.heading += 1;
            }
            Tag::Strong => self.strong += 1,
            Tag::Emphasis => self.emphasis += 1,
            Tag::Link { dest_url, .. } => self.link = Some((dest_url.to_string(), String::new())),
            Tag::Image { .. } => self.image += 1,
            Tag::List(start) => {
                self.flush();
                self.lists.push(ListLevel { next: start });
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(ListLevel { next: Some(n) }) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.current
                    .push(Span::styled(format!("{}{}", "  ".repeat(depth), marker), self.base));
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code_block = true;
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
            }
            TagEnd::Heading(_) => {
                self.heading = self.heading.saturating_sub(1);
                self.blank();
            }
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::Link => {
                if let Some((dest, seen)) = self.link.take() {
                    let dest = sanitize(&dest);
                    if !dest.is_empty() && dest != seen {
                        self.current.push(Span::styled(
                            format!(" <{}>", dest),
                            self.base.fg(Color::DarkGray),
                        ));
                    }
                }
            }
            TagEnd::Image => self.image = self.image.saturating_sub(1),
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.blank();
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Render markdown `text` into lines styled on top of `base`.
pub fn render(text: &str, base: Style) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(base);

    for event in Parser::new_ext(text, Options::empty()) {
        match event {
            Event::Start(tag) => renderer.start(tag),
            Event::End(tag) => renderer.end(tag),
            Event::Text(t) if renderer.in_code_block => renderer.push_code_block(&t),
            Event::Text(t) => renderer.push_text(&t),
            Event::Code(t) => {
                if renderer.image == 0 {
                    let style = renderer.style().fg(Color::Yellow);
                    renderer.current.push(Span::styled(sanitize(&t), style));
                }
            }
            Event::SoftBreak => renderer.push_text(" "),
            Event::HardBreak => renderer.flush(),
            Event::Rule => {
                renderer.flush();
                renderer
                    .lines
                    .push(Line::from(Span::styled("────────", base.fg(Color::DarkGray))));
            }
            // raw HTML is never rendered
            Event::Html(_) | Event::InlineHtml(_) => {}
            _ => {}
        }
    }

    renderer.finish()
}

/// Flatten rendered lines back to text, one line per row.
pub fn to_plain(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|s| s.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
