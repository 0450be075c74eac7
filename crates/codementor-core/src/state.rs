//! UI-agnostic conversation state
//!
//! This module contains the data structures that flow between the request
//! lifecycle, the chat session and any display surface (TUI, transcript file,
//! etc.) without depending on a specific UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A chat message in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// CSS class used when the message is rendered as HTML
    pub fn css_class(&self) -> &'static str {
        match self {
            ChatRole::User => "user-message",
            ChatRole::Assistant => "bot-message",
        }
    }
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }
}

/// Append-only, ordered record of the visible conversation
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The endpoint answered with a non-success HTTP status
    ApiError,
    /// Success status, but the payload was malformed or missing the text
    UnexpectedFormat,
    /// The request deadline elapsed before the endpoint answered
    Timeout,
    /// Transport-level failure (DNS, refused connection, reset)
    NetworkError,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ApiError => "api_error",
            ErrorKind::UnexpectedFormat => "unexpected_format",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
pub const NETWORK_MESSAGE: &str = "Network error. Please check your connection.";
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, I encountered an error processing your request.";

/// Terminal result of one request lifecycle invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Success(String),
    Failure { kind: ErrorKind, detail: String },
}

impl ResponseOutcome {
    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        ResponseOutcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseOutcome::Success(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ResponseOutcome::Success(_) => None,
            ResponseOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// The human-readable string shown in the conversation log.
    ///
    /// Successful text is passed through verbatim. Timeouts and network
    /// failures get fixed messages; everything else gets the generic apology
    /// with the technical detail appended in parentheses.
    pub fn display_text(&self) -> String {
        match self {
            ResponseOutcome::Success(text) => text.clone(),
            ResponseOutcome::Failure { kind, detail } => match kind {
                ErrorKind::Timeout => TIMEOUT_MESSAGE.to_string(),
                ErrorKind::NetworkError => NETWORK_MESSAGE.to_string(),
                _ if detail.is_empty() => GENERIC_FAILURE_MESSAGE.to_string(),
                _ => format!("{} ({})", GENERIC_FAILURE_MESSAGE, detail),
            },
        }
    }
}

/// A message paired with its rendered HTML fragment, as handed to display sinks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntry {
    pub message: ChatMessage,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_ordered() {
        let mut history = ChatHistory::new();
        history.push(ChatMessage::user("hi"));
        history.push(ChatMessage::assistant("hello"));

        assert_eq!(history.len(), 2);
        assert!(history.messages()[0].is_user());
        assert!(!history.messages()[1].is_user());
    }

    #[test]
    fn test_display_text_success_is_verbatim() {
        let outcome = ResponseOutcome::Success("**raw** <text>".to_string());
        assert_eq!(outcome.display_text(), "**raw** <text>");
    }

    #[test]
    fn test_display_text_fixed_messages() {
        let timeout = ResponseOutcome::failure(ErrorKind::Timeout, "after 10s");
        assert_eq!(timeout.display_text(), TIMEOUT_MESSAGE);

        let network = ResponseOutcome::failure(ErrorKind::NetworkError, "refused");
        assert_eq!(network.display_text(), NETWORK_MESSAGE);
    }

    #[test]
    fn test_display_text_appends_detail() {
        let outcome = ResponseOutcome::failure(ErrorKind::ApiError, "API key not valid");
        assert_eq!(
            outcome.display_text(),
            "Sorry, I encountered an error processing your request. (API key not valid)"
        );
    }

    #[test]
    fn test_css_class_by_role() {
        assert_eq!(ChatMessage::user("x").role.css_class(), "user-message");
        assert_eq!(ChatMessage::assistant("x").role.css_class(), "bot-message");
    }
}
