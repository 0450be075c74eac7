use std::io::{self, Stderr};
use anyhow::Result;
use codementor_core::{BusyIndicator, DisplayEntry, DisplaySink};
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// A formatted entry for the message log
    Display(DisplayEntry),
    /// Request lifecycle entered (`true`) or left (`false`) flight
    Busy(bool),
    /// A send the session turned away, handed back so it is not lost
    Rejected(String),
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let Ok(evt) = evt else { continue };
                let app_event = match evt {
                    // Only handle key press events, not release
                    Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                    Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
                    Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
                    _ => None,
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        // Tick timer drives the busy animation
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// A bridge that lets the core post into this event loop
    pub fn bridge(&self) -> ChannelBridge {
        ChannelBridge::new(self.tx.clone())
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

/// Display sink and busy indicator backed by the UI event channel.
///
/// Sends fail only once the UI loop has exited, at which point there is
/// nothing left to update.
#[derive(Clone)]
pub struct ChannelBridge {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelBridge {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    pub fn reject(&self, text: String) {
        let _ = self.tx.send(AppEvent::Rejected(text));
    }
}

impl DisplaySink for ChannelBridge {
    fn append_message(&self, entry: &DisplayEntry) {
        let _ = self.tx.send(AppEvent::Display(entry.clone()));
    }
}

impl BusyIndicator for ChannelBridge {
    fn set_busy(&self, busy: bool) {
        let _ = self.tx.send(AppEvent::Busy(busy));
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use codementor_core::ChatMessage;

    #[test]
    fn test_bridge_forwards_entries_and_busy_state() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = ChannelBridge { tx };

        bridge.set_busy(true);
        bridge.append_message(&DisplayEntry {
            message: ChatMessage::assistant("hi"),
            html: "<p>hi</p>".to_string(),
        });
        bridge.set_busy(false);

        assert!(matches!(rx.try_recv(), Ok(AppEvent::Busy(true))));
        match rx.try_recv() {
            Ok(AppEvent::Display(entry)) => assert_eq!(entry.html, "<p>hi</p>"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Ok(AppEvent::Busy(false))));
    }

    #[test]
    fn test_bridge_ignores_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let bridge = ChannelBridge { tx };
        bridge.set_busy(true);
        bridge.reject("lost".to_string());
    }
}
