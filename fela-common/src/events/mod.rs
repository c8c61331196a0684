//! Event types for the FELA event system
//!
//! Provides shared event definitions and the EventBus. The intake pipeline
//! reports resolver and submission progress here so that any front-end can
//! render inline status without being wired into the pipeline itself.

mod submission_types;

pub use submission_types::{SubmissionKind, SubmissionStep};

use crate::ReferenceKind;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// FELA event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FelaEvent {
    /// A debounced search produced a list that is still the latest for its field
    SuggestionsReady {
        kind: ReferenceKind,
        query: String,
        request_id: u64,
        count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Resolution of a free-text name began
    ResolutionStarted {
        kind: ReferenceKind,
        name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Resolution produced a canonical entity
    ResolutionCompleted {
        kind: ReferenceKind,
        name: String,
        /// True when the entity was created by this resolution
        created_now: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Resolution ended without an entity
    ResolutionFailed {
        kind: ReferenceKind,
        name: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A concurrent creation of the same name was detected and reconciled
    ConflictRecovered {
        kind: ReferenceKind,
        name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    SubmissionStarted {
        draft_id: Uuid,
        kind: SubmissionKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    SubmissionStepCompleted {
        draft_id: Uuid,
        step: SubmissionStep,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Submission stopped; `completed` lists the steps already committed
    SubmissionFailed {
        draft_id: Uuid,
        step: Option<SubmissionStep>,
        message: String,
        completed: Vec<SubmissionStep>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    SubmissionSucceeded {
        draft_id: Uuid,
        record_id: Option<i64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution bus
///
/// Uses tokio::broadcast for one-to-many event distribution. Cloning the bus
/// shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FelaEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use fela_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<FelaEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: FelaEvent,
    ) -> Result<usize, broadcast::error::SendError<FelaEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FelaEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_BUS_CAPACITY)
    }
}
