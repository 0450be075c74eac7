//! Message formatting: a constrained Markdown subset rendered to safe HTML.
//!
//! The whole input is entity-escaped before any markup is recognised, so no
//! input can smuggle raw tags into the output. Recognised constructs are then
//! layered on top of the escaped text:
//!
//! - fenced code blocks (```` ```lang ````) become `<pre><code class="language-lang">`
//! - `` `inline code` `` becomes `<code>`
//! - `**bold**` and `*italic*` become `<strong>` and `<em>`
//! - `[label](url)` becomes an anchor opening in a new browsing context
//! - blank-line separated paragraphs become `<p>`, `<ul>` or `<ol>`

use regex::{Captures, Regex};
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```([A-Za-z0-9_+#.\-]*)\n((?s:.*?))```").expect("fence pattern is valid")
});

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n)+").expect("blank line pattern is valid"));

// A run of three or more backticks is never an inline code delimiter; this is
// what keeps an unterminated fence literal.
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(`{3,})|`([^`]+)`").expect("inline code pattern is valid"));

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern is valid")
});

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"));

// Runs after bold, so the body may hold whole `<strong>` spans but never a
// lone open or close tag. Italic and bold therefore always nest.
static ITALIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*((?:[^*\n<>]|<strong>[^<>]*</strong>)+)\*").expect("italic pattern is valid")
});

static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*[-*][ \t]+(.*)$").expect("bullet pattern is valid"));

static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\d+\.[ \t]+(.*)$").expect("ordered pattern is valid"));

/// Escape the five HTML-significant characters.
pub fn escape_html(unsafe_text: &str) -> String {
    let mut out = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_html`]. `&amp;` is decoded last so `&amp;lt;` stays `&lt;`.
pub fn unescape_html(escaped: &str) -> String {
    escaped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Convert raw message text into an HTML fragment.
///
/// Pure and deterministic: the same input always yields byte-identical output.
pub fn format_message(text: &str) -> String {
    let escaped = escape_html(text);
    let mut paragraphs = Paragraphs::default();

    let mut last = 0;
    for caps in FENCE.captures_iter(&escaped) {
        let Some(whole) = caps.get(0) else { continue };
        paragraphs.push_prose(&escaped[last..whole.start()]);

        let lang = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|lang| !lang.is_empty())
            .unwrap_or("plaintext");
        let body = caps.get(2).map_or("", |m| m.as_str()).trim();
        paragraphs.push_code(format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            lang, body
        ));

        last = whole.end();
    }
    paragraphs.push_prose(&escaped[last..]);

    paragraphs
        .finish()
        .iter()
        .map(|pieces| render_paragraph(pieces))
        .collect()
}

enum Piece<'a> {
    Prose(&'a str),
    Code(String),
}

/// Groups escaped text into paragraphs. Blank lines inside a fenced block do
/// not split it because code arrives as a single piece.
#[derive(Default)]
struct Paragraphs<'a> {
    done: Vec<Vec<Piece<'a>>>,
    current: Vec<Piece<'a>>,
}

impl<'a> Paragraphs<'a> {
    fn push_prose(&mut self, prose: &'a str) {
        let mut parts = BLANK_LINES.split(prose);
        if let Some(first) = parts.next() {
            self.current.push(Piece::Prose(first));
        }
        for part in parts {
            self.done.push(std::mem::take(&mut self.current));
            self.current.push(Piece::Prose(part));
        }
    }

    fn push_code(&mut self, html: String) {
        self.current.push(Piece::Code(html));
    }

    fn finish(mut self) -> Vec<Vec<Piece<'a>>> {
        self.done.push(self.current);
        self.done
    }
}

fn render_paragraph(pieces: &[Piece<'_>]) -> String {
    let has_code = pieces.iter().any(|p| matches!(p, Piece::Code(_)));

    if has_code {
        let mut out = String::new();
        for piece in pieces {
            match piece {
                Piece::Code(html) => out.push_str(html),
                Piece::Prose(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        out.push_str(&format_inline(text));
                    }
                }
            }
        }
        return out;
    }

    let text: String = pieces
        .iter()
        .filter_map(|p| match p {
            Piece::Prose(text) => Some(*text),
            Piece::Code(_) => None,
        })
        .collect();
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some(items) = list_items(text, &BULLET_ITEM) {
        return render_list("ul", &items);
    }
    if let Some(items) = list_items(text, &ORDERED_ITEM) {
        return render_list("ol", &items);
    }

    format!("<p>{}</p>", format_inline(text))
}

/// Returns the item texts if every line of the paragraph matches the marker.
fn list_items<'t>(text: &'t str, marker: &Regex) -> Option<Vec<&'t str>> {
    text.lines()
        .map(|line| {
            marker
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
        })
        .collect()
}

fn render_list(tag: &str, items: &[&str]) -> String {
    let mut out = format!("<{}>", tag);
    for item in items {
        out.push_str("<li>");
        out.push_str(&format_inline(item));
        out.push_str("</li>");
    }
    out.push_str(&format!("</{}>", tag));
    out
}

/// Inline code spans are opaque; links and emphasis apply to the rest.
fn format_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in INLINE_CODE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&format_links(&text[last..whole.start()]));
        match caps.get(2) {
            Some(code) => {
                out.push_str("<code>");
                out.push_str(code.as_str());
                out.push_str("</code>");
            }
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&format_links(&text[last..]));
    out
}

fn format_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in LINK.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&format_emphasis(&text[last..whole.start()]));
        out.push_str(&render_link(&caps));
        last = whole.end();
    }
    out.push_str(&format_emphasis(&text[last..]));
    out
}

fn render_link(caps: &Captures<'_>) -> String {
    let label = caps.get(1).map_or("", |m| m.as_str());
    let url = caps.get(2).map_or("", |m| m.as_str()).trim();

    if !is_safe_href(url) {
        return format_emphasis(caps.get(0).map_or("", |m| m.as_str()));
    }

    format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
        url,
        format_emphasis(label)
    )
}

/// Relative URLs and http(s)/mailto schemes only.
fn is_safe_href(url: &str) -> bool {
    let scheme_end = url.find(|c| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(idx) if url[idx..].starts_with(':') => {
            let scheme = url[..idx].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => !url.is_empty(),
    }
}

fn format_emphasis(text: &str) -> String {
    let bold = BOLD.replace_all(text, "<strong>${1}</strong>");
    ITALIC.replace_all(&bold, "<em>${1}</em>").into_owned()
}
