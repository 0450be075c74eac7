use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::display::DisplaySink;
use crate::format::escape_html;
use crate::state::DisplayEntry;

const STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;background:#1e1e1e;color:#ccc;max-width:860px;margin:0 auto;padding:20px}
.message{margin:10px 0;padding:10px 14px;border-radius:12px;line-height:1.5}
.user-message{background:#2a2d2e;margin-left:20%}
.bot-message{background:#252526;border:1px solid #3c3c3c;margin-right:20%}
pre{background:#111;padding:10px;border-radius:6px;overflow-x:auto}
code{font-family:ui-monospace,Menlo,monospace;color:#ce9178}
a{color:#4fc1ff}";

/// Display sink that mirrors the conversation into a standalone HTML page.
///
/// The page is rewritten in full on every append so it is always a complete
/// document, even if the process is killed mid-session.
pub struct HtmlTranscript {
    path: PathBuf,
    title: String,
    fragments: Mutex<Vec<String>>,
}

impl HtmlTranscript {
    pub fn create(path: &Path, title: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let transcript = Self {
            path: path.to_path_buf(),
            title: title.to_string(),
            fragments: Mutex::new(Vec::new()),
        };
        transcript.write(&[])?;
        Ok(transcript)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, fragments: &[String]) -> Result<()> {
        fs::write(&self.path, render_document(&self.title, fragments))?;
        Ok(())
    }
}

impl DisplaySink for HtmlTranscript {
    fn append_message(&self, entry: &DisplayEntry) {
        let mut fragments = self
            .fragments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        fragments.push(render_entry(entry));

        if let Err(e) = self.write(&fragments) {
            warn!(path = ?self.path, error = %e, "failed to write transcript");
        }
    }
}

fn render_entry(entry: &DisplayEntry) -> String {
    format!(
        "<div class=\"message {}\"><div class=\"message-content\">{}</div></div>",
        entry.message.role.css_class(),
        entry.html
    )
}

fn render_document(title: &str, fragments: &[String]) -> String {
    let title = escape_html(title);
    let mut doc = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n<div class=\"chat-messages\">\n",
        title, STYLE
    );
    for fragment in fragments {
        doc.push_str(fragment);
        doc.push('\n');
    }
    doc.push_str("</div>\n</body>\n</html>\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_message;
    use crate::state::ChatMessage;
    use tempfile::tempdir;

    fn entry(message: ChatMessage) -> DisplayEntry {
        DisplayEntry {
            html: format_message(&message.text),
            message,
        }
    }

    #[test]
    fn test_create_writes_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("chat.html");

        let transcript = HtmlTranscript::create(&path, "Chat <log>").unwrap();
        let doc = fs::read_to_string(transcript.path()).unwrap();

        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>Chat &lt;log&gt;</title>"));
        assert!(doc.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_entries_are_tagged_by_role_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.html");
        let transcript = HtmlTranscript::create(&path, "Chat").unwrap();

        transcript.append_message(&entry(ChatMessage::user("is <b> safe?")));
        transcript.append_message(&entry(ChatMessage::assistant("Yes, **escaped**.")));

        let doc = fs::read_to_string(&path).unwrap();
        let user = doc
            .find("<div class=\"message user-message\"><div class=\"message-content\"><p>is &lt;b&gt; safe?</p></div></div>")
            .unwrap();
        let bot = doc
            .find("<div class=\"message bot-message\"><div class=\"message-content\"><p>Yes, <strong>escaped</strong>.</p></div></div>")
            .unwrap();
        assert!(user < bot);
        assert!(doc.trim_end().ends_with("</html>"));
    }
}
