pub mod ai;
pub mod config;
pub mod display;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod session;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use ai::GeminiClient;
pub use config::{Config, RequestConfig, WELCOME_MESSAGE};
pub use display::{BusyIndicator, DisplaySink, NoopIndicator};
pub use error::{RequestError, SubmitError};
pub use format::{escape_html, format_message, unescape_html};
pub use lifecycle::{LifecycleState, RequestLifecycle};
pub use session::ChatSession;
pub use state::{ChatHistory, ChatMessage, ChatRole, DisplayEntry, ErrorKind, ResponseOutcome};
pub use transcript::HtmlTranscript;
