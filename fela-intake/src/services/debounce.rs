//! Debounced, latest-request-guarded search task per input field
//!
//! Each keystroke cancels the pending timer of the previous one. Requests
//! already in flight are not aborted; their results are dropped when a newer
//! request has started since.

use crate::services::suggestion_engine::{FieldOptions, SuggestionEngine, SuggestionList};
use fela_common::events::{EventBus, FelaEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of one search, tagged with the request that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionUpdate {
    pub request_id: u64,
    pub list: SuggestionList,
}

pub struct DebouncedSearch {
    engine: SuggestionEngine,
    options: FieldOptions,
    delay: Duration,
    latest: Arc<AtomicU64>,
    pending: Mutex<Option<CancellationToken>>,
    updates: mpsc::UnboundedSender<SuggestionUpdate>,
    events: Option<EventBus>,
}

impl DebouncedSearch {
    /// Must be used from within a tokio runtime; searches run as spawned tasks.
    pub fn new(
        engine: SuggestionEngine,
        options: FieldOptions,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SuggestionUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let search = Self {
            engine,
            options,
            delay,
            latest: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            updates,
            events: None,
        };
        (search, rx)
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    pub fn latest_request(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, request_id: u64) -> bool {
        self.latest_request() == request_id
    }

    /// Drop the pending timer, if any
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = pending.take() {
            token.cancel();
        }
    }

    /// Register a keystroke and return its request id
    ///
    /// Input below the minimum length clears the list immediately without a
    /// network call.
    pub fn input(&self, text: &str, scope_country: Option<&str>) -> u64 {
        let request_id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel();

        let text = text.trim().to_string();
        if !self.options.accepts(&text) {
            let _ = self.updates.send(SuggestionUpdate {
                request_id,
                list: SuggestionList::empty(self.options.kind, text),
            });
            return request_id;
        }

        let token = CancellationToken::new();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            *pending = Some(token.clone());
        }

        let engine = self.engine.clone();
        let options = self.options;
        let delay = self.delay;
        let latest = Arc::clone(&self.latest);
        let updates = self.updates.clone();
        let events = self.events.clone();
        let scope = scope_country.map(str::to_string);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(request_id, "Debounce timer superseded");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let list = engine.suggest(&options, &text, scope.as_deref()).await;

            if latest.load(Ordering::SeqCst) != request_id {
                debug!(request_id, query = %text, "Discarding stale suggestions");
                return;
            }

            if let Some(bus) = &events {
                bus.emit_lossy(FelaEvent::SuggestionsReady {
                    kind: options.kind,
                    query: text.clone(),
                    request_id,
                    count: list.len(),
                    timestamp: chrono::Utc::now(),
                });
            }
            let _ = updates.send(SuggestionUpdate { request_id, list });
        });

        request_id
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}
