//! Ports between the core and whatever renders the conversation.
//!
//! The core never touches a terminal or a document directly; it talks to a
//! [`DisplaySink`] for new log entries and a [`BusyIndicator`] for the
//! "request in flight" affordances (spinner shown, submit disabled).

use std::sync::Arc;

use crate::state::DisplayEntry;

/// Append-only display surface
pub trait DisplaySink: Send + Sync {
    fn append_message(&self, entry: &DisplayEntry);
}

/// Loading indicator plus submit-control enablement, toggled together
pub trait BusyIndicator: Send + Sync {
    fn set_busy(&self, busy: bool);
}

/// Fan out every entry to several sinks, in order
impl DisplaySink for Vec<Arc<dyn DisplaySink>> {
    fn append_message(&self, entry: &DisplayEntry) {
        for sink in self {
            sink.append_message(entry);
        }
    }
}

/// For callers that have no surface to drive (one-shot CLI use)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl BusyIndicator for NoopIndicator {
    fn set_busy(&self, _busy: bool) {}
}
