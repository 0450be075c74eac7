use std::sync::Arc;

use codementor_core::{ChatRole, ChatSession, Config, DisplayEntry, LifecycleState, SubmitError};
use ratatui::text::Line;
use tracing::{debug, warn};

use crate::render::html_to_lines;
use crate::tui::ChannelBridge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chat,
    Topics,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Chat => "Chat",
            Tab::Topics => "Topics",
        }
    }
}

pub const TOPICS: &[&str] = &[
    "Binary search implementation",
    "Time complexity of merge sort",
    "How hash tables work",
    "DFS vs BFS differences",
    "Dynamic programming examples",
    "When to use a heap",
    "Explain two-pointer techniques",
];

/// A fixed set of items with exactly one active at a time
#[derive(Debug, Clone)]
pub struct Selection<T> {
    items: Vec<T>,
    active: usize,
}

impl<T> Selection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, active: 0 }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> Option<&T> {
        self.items.get(self.active)
    }

    /// Activate `index`, deactivating whatever was active. Out of range is ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.items.len() {
            self.active = index;
        }
    }

    pub fn next(&mut self) {
        if !self.items.is_empty() {
            self.active = (self.active + 1) % self.items.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.items.is_empty() {
            self.active = (self.active + self.items.len() - 1) % self.items.len();
        }
    }
}

/// A log entry pre-rendered for the terminal
pub struct RenderedEntry {
    pub role: ChatRole,
    pub lines: Vec<Line<'static>>,
}

pub struct App {
    pub should_quit: bool,
    pub tabs: Selection<Tab>,
    pub topics: Selection<&'static str>,

    // Input line
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Message log
    pub entries: Vec<RenderedEntry>,
    pub scroll: u16,
    pub follow: bool, // stick to the newest entry
    pub chat_height: u16,

    // Request state
    pub busy: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub status: Option<String>,

    pub model: String,
    pub session: Arc<ChatSession>,
    bridge: ChannelBridge,
}

const WAITING_STATUS: &str = "Still waiting for the last reply";

impl App {
    pub fn new(session: Arc<ChatSession>, config: &Config, bridge: ChannelBridge) -> Self {
        Self {
            should_quit: false,
            tabs: Selection::new(vec![Tab::Chat, Tab::Topics]),
            topics: Selection::new(TOPICS.to_vec()),

            input: String::new(),
            cursor: 0,

            entries: Vec::new(),
            scroll: 0,
            follow: true,
            chat_height: 0,

            busy: false,
            animation_frame: 0,
            status: None,

            model: config.model.clone(),
            session,
            bridge,
        }
    }

    pub fn active_tab(&self) -> Tab {
        self.tabs.active().copied().unwrap_or(Tab::Chat)
    }

    pub fn push_entry(&mut self, entry: DisplayEntry) {
        self.entries.push(RenderedEntry {
            role: entry.message.role,
            lines: html_to_lines(&entry.html),
        });
        self.follow = true;
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        if !busy {
            self.animation_frame = 0;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.busy {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Submit the input line. Does nothing while a request is in flight.
    pub fn submit_input(&mut self) {
        if self.busy {
            self.status = Some(WAITING_STATUS.to_string());
            return;
        }
        if self.input.trim().is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.send(text);
    }

    /// Send the highlighted topic and jump back to the chat
    pub fn submit_topic(&mut self) {
        if self.busy {
            self.status = Some(WAITING_STATUS.to_string());
            return;
        }
        if let Some(topic) = self.topics.active() {
            let text = topic.to_string();
            self.tabs.select(0);
            self.send(text);
        }
    }

    // Busy is raised here rather than on the lifecycle's event so a second
    // Enter queued behind this one is already refused.
    fn send(&mut self, text: String) {
        self.status = None;
        self.follow = true;
        self.set_busy(true);
        let session = self.session.clone();
        let bridge = self.bridge.clone();
        tokio::spawn(async move {
            match session.submit(&text).await {
                Ok(outcome) => debug!(success = outcome.is_success(), "send finished"),
                Err(SubmitError::Busy) => {
                    warn!("send refused, another request is in flight");
                    bridge.reject(text);
                }
                Err(SubmitError::Empty) => bridge.reject(text),
            }
        });
    }

    /// Put a refused message back in the input line unless the user has
    /// already started typing something else.
    pub fn restore_rejected(&mut self, text: String) {
        if self.input.trim().is_empty() {
            self.cursor = text.chars().count();
            self.input = text;
        }
        self.status = Some(WAITING_STATUS.to_string());
        self.set_busy(self.session.lifecycle().state() == LifecycleState::InFlight);
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(amount);
    }

    /// The renderer clamps and re-enables follow when the bottom is reached
    pub fn scroll_down(&mut self, amount: u16) {
        self.scroll = self.scroll.saturating_add(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::AppEvent;
    use codementor_core::{ChatMessage, NoopIndicator, RequestLifecycle};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_with(config: Config) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let lifecycle = RequestLifecycle::new(config.clone(), Arc::new(NoopIndicator));
        let sinks: Vec<Arc<dyn codementor_core::DisplaySink>> = Vec::new();
        let session = Arc::new(ChatSession::new(lifecycle, Arc::new(sinks)));
        (App::new(session, &config, ChannelBridge::new(tx)), rx)
    }

    fn app() -> App {
        app_with(Config::default()).0
    }

    #[test]
    fn test_selection_is_exclusive_and_wraps() {
        let mut tabs = Selection::new(vec![Tab::Chat, Tab::Topics]);
        assert_eq!(tabs.active(), Some(&Tab::Chat));

        tabs.next();
        assert_eq!(tabs.active(), Some(&Tab::Topics));
        tabs.next();
        assert_eq!(tabs.active(), Some(&Tab::Chat));
        tabs.previous();
        assert_eq!(tabs.active_index(), 1);

        tabs.select(7);
        assert_eq!(tabs.active_index(), 1);
    }

    #[test]
    fn test_push_entry_renders_and_follows() {
        let mut app = app();
        app.follow = false;
        app.push_entry(DisplayEntry {
            message: ChatMessage::assistant("**hi**"),
            html: "<p><strong>hi</strong></p>".to_string(),
        });

        assert!(app.follow);
        assert_eq!(app.entries.len(), 1);
        assert_eq!(app.entries[0].role, ChatRole::Assistant);
        assert_eq!(app.entries[0].lines.len(), 1);
    }

    #[test]
    fn test_submit_is_ignored_while_busy() {
        let mut app = app();
        app.input = "what is a trie?".to_string();
        app.cursor = app.input.chars().count();
        app.set_busy(true);

        app.submit_input();

        assert_eq!(app.input, "what is a trie?");
        assert!(app.status.is_some());
    }

    #[test]
    fn test_busy_animation() {
        let mut app = app();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.set_busy(true);
        app.tick_animation();
        app.tick_animation();
        assert_eq!(app.animation_frame, 2);

        app.set_busy(false);
        assert_eq!(app.animation_frame, 0);
    }

    #[test]
    fn test_restore_rejected_refills_empty_input() {
        let mut app = app();
        app.set_busy(true);

        app.restore_rejected("second question".to_string());

        assert_eq!(app.input, "second question");
        assert_eq!(app.cursor, 15);
        assert!(app.status.is_some());
        assert!(!app.busy);
    }

    #[test]
    fn test_restore_rejected_keeps_newer_draft() {
        let mut app = app();
        app.input = "newer".to_string();
        app.cursor = 5;

        app.restore_rejected("older".to_string());

        assert_eq!(app.input, "newer");
        assert_eq!(app.cursor, 5);
    }

    #[tokio::test]
    async fn test_send_refused_by_session_is_handed_back() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        let config = Config {
            endpoint: format!("{}/v1beta", server.uri()),
            timeout_ms: 5_000,
            ..Config::default()
        };
        let (mut app, mut rx) = app_with(config);

        // A send the app does not know about holds the session
        let session = app.session.clone();
        let first = tokio::spawn(async move { session.submit("first").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        app.input = "second".to_string();
        app.cursor = 6;
        app.submit_input();
        assert!(app.input.is_empty());

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        match event {
            Some(AppEvent::Rejected(text)) => {
                assert_eq!(text, "second");
                app.restore_rejected(text);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        assert_eq!(app.input, "second");
        assert!(app.busy);
        assert!(first.await.unwrap().is_ok());
        assert_eq!(
            app.session.history().iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["first", "ok"]
        );
    }
}
