//! Turns formatter HTML fragments into styled terminal lines.
//!
//! Only the tag set the formatter emits is understood. Every literal `<` in a
//! fragment is already escaped, so each `<` starts a tag.

use std::sync::LazyLock;

use codementor_core::unescape_html;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)([a-z]+)((?:\s+[a-z]+="[^"]*")*)\s*>"#).expect("tag pattern is valid")
});

static ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-z]+)="([^"]*)""#).expect("attribute pattern is valid"));

fn code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn code_block_style() -> Style {
    Style::default().fg(Color::LightGreen)
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::LightBlue)
        .add_modifier(Modifier::UNDERLINED)
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Bullet,
    Ordered(usize),
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<ListKind>,
    in_pre: bool,
    link: Option<(String, String)>, // (href, visible text so far)
}

impl LineBuilder {
    fn style(&self) -> Style {
        let base = if self.in_pre {
            code_block_style()
        } else {
            Style::default()
        };
        self.styles.iter().fold(base, |acc, s| acc.patch(*s))
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

    fn text(&mut self, raw: &str) {
        let text = unescape_html(raw);
        let style = self.style();
        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                self.force_break();
            }
            if segment.is_empty() {
                continue;
            }
            if let Some((_, seen)) = self.link.as_mut() {
                seen.push_str(segment);
            }
            self.current.push(Span::styled(segment.to_string(), style));
        }
    }

    // Code blocks keep their empty lines.
    fn force_break(&mut self) {
        let line = Line::from(std::mem::take(&mut self.current));
        self.lines.push(line);
    }

    fn open(&mut self, name: &str, attrs: &str) {
        match name {
            "p" => self.flush(),
            "ul" => {
                self.flush();
                self.lists.push(ListKind::Bullet);
            }
            "ol" => {
                self.flush();
                self.lists.push(ListKind::Ordered(0));
            }
            "li" => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().max(1));
                let marker = match self.lists.last_mut() {
                    Some(ListKind::Ordered(n)) => {
                        *n += 1;
                        format!("{}{}. ", indent, n)
                    }
                    _ => format!("{}• ", indent),
                };
                self.current
                    .push(Span::styled(marker, Style::default().fg(Color::DarkGray)));
            }
            "pre" => {
                self.flush();
                self.in_pre = true;
            }
            "code" if self.in_pre => {
                let lang = attr(attrs, "class")
                    .and_then(|class| class.strip_prefix("language-").map(str::to_string))
                    .unwrap_or_else(|| "plaintext".to_string());
                self.lines.push(Line::from(Span::styled(
                    format!("─── {} ", lang),
                    Style::default().fg(Color::DarkGray),
                )));
                self.styles.push(Style::default());
            }
            "code" => self.styles.push(code_style()),
            "strong" => self
                .styles
                .push(Style::default().add_modifier(Modifier::BOLD)),
            "em" => self
                .styles
                .push(Style::default().add_modifier(Modifier::ITALIC)),
            "a" => {
                let href = attr(attrs, "href").unwrap_or_default();
                self.link = Some((href, String::new()));
                self.styles.push(link_style());
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "p" => self.blank(),
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            "li" => self.flush(),
            "pre" => {
                self.flush();
                self.in_pre = false;
                self.blank();
            }
            "code" | "strong" | "em" => {
                self.styles.pop();
            }
            "a" => {
                self.styles.pop();
                if let Some((href, seen)) = self.link.take() {
                    if !href.is_empty() && href != seen {
                        self.current.push(Span::styled(
                            format!(" ({})", href),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
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

fn attr(attrs: &str, name: &str) -> Option<String> {
    ATTR.captures_iter(attrs)
        .find(|caps| &caps[1] == name)
        .map(|caps| unescape_html(&caps[2]))
}

/// Render one formatter fragment as terminal lines
pub fn html_to_lines(html: &str) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::default();
    let mut last = 0;

    for caps in TAG.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        builder.text(&html[last..whole.start()]);

        let closing = !caps[1].is_empty();
        let name = &caps[2];
        if closing {
            builder.close(name);
        } else {
            builder.open(name, caps.get(3).map_or("", |m| m.as_str()));
        }
        last = whole.end();
    }
    builder.text(&html[last..]);

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codementor_core::format_message;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn texts(lines: &[Line<'_>]) -> Vec<String> {
        lines.iter().map(line_text).collect()
    }

    #[test]
    fn test_paragraph_with_emphasis() {
        let lines = html_to_lines(&format_message("plain **bold** and *soft*"));
        assert_eq!(texts(&lines), vec!["plain bold and soft"]);

        let spans = &lines[0].spans;
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(spans[1].content, "bold");
        assert!(spans[3].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_entities_are_decoded_for_display() {
        let lines = html_to_lines(&format_message("if a < b && c > \"d\""));
        assert_eq!(texts(&lines), vec!["if a < b && c > \"d\""]);
    }

    #[test]
    fn test_lists() {
        let lines = html_to_lines(&format_message("- one\n- two\n\n1. first\n2. second"));
        assert_eq!(
            texts(&lines),
            vec!["  • one", "  • two", "", "  1. first", "  2. second"]
        );
    }

    #[test]
    fn test_code_block_keeps_blank_lines() {
        let lines = html_to_lines(&format_message("```python\ndef f():\n\n    return 1\n```"));
        assert_eq!(
            texts(&lines),
            vec!["─── python ", "def f():", "", "    return 1"]
        );
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::LightGreen));
    }

    #[test]
    fn test_inline_code_is_highlighted() {
        let lines = html_to_lines(&format_message("use `Vec<T>`"));
        assert_eq!(texts(&lines), vec!["use Vec<T>"]);
        assert_eq!(lines[0].spans[1].style.fg, Some(Color::Yellow));
    }

    #[test]
    fn test_link_shows_target() {
        let lines = html_to_lines(&format_message("[docs](https://doc.rust-lang.org)"));
        assert_eq!(texts(&lines), vec!["docs (https://doc.rust-lang.org)"]);

        let bare = html_to_lines(&format_message("[https://x.io](https://x.io)"));
        assert_eq!(texts(&bare), vec!["https://x.io"]);
    }

    #[test]
    fn test_paragraphs_are_separated() {
        let lines = html_to_lines(&format_message("one\n\ntwo"));
        assert_eq!(texts(&lines), vec!["one", "", "two"]);
    }

    #[test]
    fn test_empty_fragment() {
        assert!(html_to_lines("").is_empty());
    }
}
