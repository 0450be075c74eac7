//! Request lifecycle: one bounded call per send.
//!
//! `Idle -> InFlight -> Idle`. Entering `InFlight` shows the busy indicator
//! and disables submission; leaving it undoes both. The exit is tied to a drop
//! guard, so it runs exactly once on every path, including when the caller
//! drops the `send` future. The deadline is a `tokio::time::timeout` around
//! the whole exchange and dies with it.
//!
//! A lifecycle runs one request at a time. A `send` that arrives while another
//! is in flight fails at once with [`RequestError::AlreadyInFlight`] and leaves
//! the indicator alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::ai::GeminiClient;
use crate::config::{Config, RequestConfig};
use crate::display::BusyIndicator;
use crate::error::RequestError;
use crate::state::{ErrorKind, ResponseOutcome, NETWORK_MESSAGE, TIMEOUT_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    InFlight,
}

pub struct RequestLifecycle {
    client: GeminiClient,
    config: Config,
    indicator: Arc<dyn BusyIndicator>,
    in_flight: AtomicBool,
}

impl RequestLifecycle {
    pub fn new(config: Config, indicator: Arc<dyn BusyIndicator>) -> Self {
        Self {
            client: GeminiClient::new(&config),
            config,
            indicator,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        if self.in_flight.load(Ordering::Acquire) {
            LifecycleState::InFlight
        } else {
            LifecycleState::Idle
        }
    }

    /// Issue one request for `prompt` and return its single terminal outcome.
    pub async fn send(&self, prompt: &str) -> ResponseOutcome {
        let Some(_flight) = InFlight::enter(self) else {
            warn!("send rejected, a request is already in flight");
            return ResponseOutcome::from(RequestError::AlreadyInFlight);
        };
        let request = self.config.request_for(prompt);
        let started = Instant::now();

        debug!(
            url = %self.client.url(),
            prompt_chars = request.prompt.chars().count(),
            timeout_ms = request.timeout_ms,
            "sending generate request"
        );

        match self.execute(&request).await {
            Ok(text) => {
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    response_chars = text.chars().count(),
                    "generate request succeeded"
                );
                ResponseOutcome::Success(text)
            }
            Err(err) => {
                warn!(
                    kind = %err.kind(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "generate request failed"
                );
                ResponseOutcome::from(err)
            }
        }
    }

    async fn execute(&self, request: &RequestConfig) -> Result<String, RequestError> {
        let deadline = request.timeout();
        tokio::time::timeout(deadline, self.client.generate(request))
            .await
            .map_err(|_| RequestError::Timeout(deadline))?
    }
}

impl From<RequestError> for ResponseOutcome {
    fn from(err: RequestError) -> Self {
        match err.kind() {
            ErrorKind::Timeout => ResponseOutcome::failure(ErrorKind::Timeout, TIMEOUT_MESSAGE),
            ErrorKind::NetworkError => {
                ResponseOutcome::failure(ErrorKind::NetworkError, NETWORK_MESSAGE)
            }
            kind => ResponseOutcome::failure(kind, err.to_string()),
        }
    }
}

/// Holds the lifecycle in `InFlight` for as long as it lives
struct InFlight<'a> {
    lifecycle: &'a RequestLifecycle,
}

impl<'a> InFlight<'a> {
    fn enter(lifecycle: &'a RequestLifecycle) -> Option<Self> {
        lifecycle
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        lifecycle.indicator.set_busy(true);
        Some(Self { lifecycle })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.lifecycle.in_flight.store(false, Ordering::Release);
        self.lifecycle.indicator.set_busy(false);
    }
}
