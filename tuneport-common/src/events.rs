//! Progress events for resolution runs
//!
//! The batch driver emits [`ResolveEvent`]s on an [`EventBus`]; front ends
//! subscribe to render progress. Emission is lossy: a run never fails because
//! nobody is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted while a batch of songs is resolved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ResolveEvent {
    /// A batch run started
    BatchStarted {
        run_id: Uuid,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// One strategy query is about to be issued (or served from cache)
    StrategyAttempted {
        request_index: usize,
        strategy: String,
        query: String,
    },

    /// A song reached a terminal result
    SongResolved {
        request_index: usize,
        title: String,
        /// "matched", "skipped:<reason>" or "unresolved"
        outcome: String,
    },

    /// The run finished
    BatchCompleted {
        run_id: Uuid,
        matched: usize,
        skipped: usize,
        unresolved: usize,
        timestamp: DateTime<Utc>,
    },

    /// The run stopped early (authentication failure or cancellation)
    BatchAborted { run_id: Uuid, reason: String },
}

impl ResolveEvent {
    /// Event type name (for log fields)
    pub fn event_type(&self) -> &str {
        match self {
            ResolveEvent::BatchStarted { .. } => "BatchStarted",
            ResolveEvent::StrategyAttempted { .. } => "StrategyAttempted",
            ResolveEvent::SongResolved { .. } => "SongResolved",
            ResolveEvent::BatchCompleted { .. } => "BatchCompleted",
            ResolveEvent::BatchAborted { .. } => "BatchAborted",
        }
    }
}

/// Broadcast bus for [`ResolveEvent`]s
///
/// # Examples
///
/// ```
/// use tuneport_common::events::{EventBus, ResolveEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(ResolveEvent::BatchAborted {
///     run_id: uuid::Uuid::new_v4(),
///     reason: "cancelled".to_string(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ResolveEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ResolveEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ResolveEvent,
    ) -> Result<usize, broadcast::error::SendError<ResolveEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ResolveEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
