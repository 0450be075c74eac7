use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::display::DisplaySink;
use crate::error::SubmitError;
use crate::format::format_message;
use crate::lifecycle::RequestLifecycle;
use crate::state::{ChatHistory, ChatMessage, DisplayEntry, ResponseOutcome};

/// One visible conversation: validates sends, keeps the history and feeds
/// formatted entries to the display.
///
/// At most one send is in flight at a time; a second `submit` while the first
/// is pending is rejected with [`SubmitError::Busy`] rather than queued.
pub struct ChatSession {
    lifecycle: RequestLifecycle,
    sink: Arc<dyn DisplaySink>,
    history: Mutex<ChatHistory>,
    sending: AtomicBool,
}

impl ChatSession {
    pub fn new(lifecycle: RequestLifecycle, sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            lifecycle,
            sink,
            history: Mutex::new(ChatHistory::new()),
            sending: AtomicBool::new(false),
        }
    }

    pub fn lifecycle(&self) -> &RequestLifecycle {
        &self.lifecycle
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Send user input and wait for the single outcome.
    ///
    /// The trimmed input is logged as a user message before the request and
    /// the outcome's display text is logged as an assistant message after it.
    pub async fn submit(&self, input: &str) -> Result<ResponseOutcome, SubmitError> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Err(SubmitError::Empty);
        }

        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("submit rejected, a request is already in flight");
            return Err(SubmitError::Busy);
        }
        let _sending = Sending(&self.sending);

        self.post(ChatMessage::user(prompt));
        let outcome = self.lifecycle.send(prompt).await;
        self.post(ChatMessage::assistant(outcome.display_text()));

        info!(success = outcome.is_success(), "exchange complete");
        Ok(outcome)
    }

    /// Post an assistant message that did not come from a request
    pub fn greet(&self, text: &str) {
        self.post(ChatMessage::assistant(text));
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages()
            .to_vec()
    }

    fn post(&self, message: ChatMessage) {
        let entry = DisplayEntry {
            html: format_message(&message.text),
            message,
        };
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.message.clone());
        self.sink.append_message(&entry);
    }
}

struct Sending<'a>(&'a AtomicBool);

impl Drop for Sending<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::display::NoopIndicator;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<DisplayEntry>>);

    impl DisplaySink for CollectingSink {
        fn append_message(&self, entry: &DisplayEntry) {
            self.0.lock().unwrap().push(entry.clone());
        }
    }

    async fn session_with(
        template: ResponseTemplate,
        timeout_ms: u64,
    ) -> (MockServer, Arc<ChatSession>, Arc<CollectingSink>) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(template)
            .mount(&server)
            .await;

        let config = Config {
            endpoint: format!("{}/v1beta", server.uri()),
            timeout_ms,
            ..Config::default()
        };
        let sink = Arc::new(CollectingSink::default());
        let lifecycle = RequestLifecycle::new(config, Arc::new(NoopIndicator));
        let session = Arc::new(ChatSession::new(lifecycle, sink.clone()));
        (server, session, sink)
    }

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_assistant() {
        let (_server, session, sink) = session_with(reply("Use a **stack**."), 5_000).await;

        let outcome = session.submit("  how does DFS work?  ").await.unwrap();
        assert_eq!(outcome, ResponseOutcome::Success("Use a **stack**.".to_string()));

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("how does DFS work?"));
        assert_eq!(history[1], ChatMessage::assistant("Use a **stack**."));

        let entries = sink.0.lock().unwrap();
        assert_eq!(entries[0].html, "<p>how does DFS work?</p>");
        assert_eq!(entries[1].html, "<p>Use a <strong>stack</strong>.</p>");
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_without_request() {
        let (server, session, sink) = session_with(reply("unused"), 5_000).await;

        assert_eq!(session.submit("   \n ").await, Err(SubmitError::Empty));
        assert!(session.history().is_empty());
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_submit_is_rejected() {
        let (_server, session, _sink) =
            session_with(reply("slow").set_delay(Duration::from_millis(300)), 5_000).await;

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("first").await })
        };
        while !session.is_sending() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(session.submit("second").await, Err(SubmitError::Busy));

        let first = first.await.unwrap().unwrap();
        assert!(first.is_success());
        assert!(!session.is_sending());

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "first");
    }

    #[tokio::test]
    async fn test_failure_is_logged_as_assistant_message() {
        let (_server, session, sink) =
            session_with(reply("late").set_delay(Duration::from_secs(30)), 150).await;

        let outcome = session.submit("hello").await.unwrap();
        assert!(!outcome.is_success());

        let entries = sink.0.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[1].message.is_user());
        assert_eq!(entries[1].html, "<p>Request timed out. Please try again.</p>");
    }

    #[test]
    fn test_greet_posts_formatted_message() {
        let sink = Arc::new(CollectingSink::default());
        let lifecycle = RequestLifecycle::new(Config::default(), Arc::new(NoopIndicator));
        let session = ChatSession::new(lifecycle, sink.clone());

        session.greet(crate::config::WELCOME_MESSAGE);

        let entries = sink.0.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0]
            .html
            .starts_with("<p>Here are some DSA topics you can ask about:</p><ul><li>"));
        assert!(entries[0].html.contains("<code>Binary search implementation</code>"));
    }
}
