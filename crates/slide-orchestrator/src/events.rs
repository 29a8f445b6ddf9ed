//! Progress events pushed to batch observers.
//!
//! Every event carries a full [`BatchProgress`] snapshot or enough to render
//! one, so a reporter never needs to poll the orchestrator.
//!
//! # Event Types
//!
//! - `batch_started` - Batch accepted and fan-out spawned
//! - `slide_progress` - One slide reached a terminal state
//! - `batch_complete` - No slide is pending any more
//!
//! # Example
//!
//! ```no_run
//! use slide_orchestrator::events::{BatchEvent, ProgressBroadcaster};
//!
//! # async fn example() {
//! let broadcaster = ProgressBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{}: {:?}", event.event_name(), event.batch_id());
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::batch::{BatchId, BatchProgress, SlideEditState, SlideRecord};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `batch_started` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStartedPayload {
    /// Batch identifier.
    pub batch_id: BatchId,
    /// The instruction being applied.
    pub instruction: String,
    /// Targets in submission order.
    pub slide_ids: Vec<String>,
    /// Maximum requests in flight.
    pub max_concurrency: usize,
    /// When the batch started.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `slide_progress` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideProgressPayload {
    /// The slide's terminal record.
    pub slide: SlideRecord,
    /// Batch snapshot after the transition.
    pub progress: BatchProgress,
}

/// Payload for the `batch_complete` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCompletePayload {
    /// Final batch snapshot.
    pub progress: BatchProgress,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Batch progress events.
///
/// Serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Sent when a batch is accepted.
    BatchStarted(BatchStartedPayload),
    /// Sent when one slide reaches a terminal state.
    SlideProgress(SlideProgressPayload),
    /// Sent when the batch has no pending slides left.
    BatchComplete(BatchCompletePayload),
}

impl BatchEvent {
    /// Creates a `BatchStarted` event.
    #[must_use]
    pub fn batch_started(
        batch_id: BatchId,
        instruction: impl Into<String>,
        slide_ids: Vec<String>,
        max_concurrency: usize,
    ) -> Self {
        Self::BatchStarted(BatchStartedPayload {
            batch_id,
            instruction: instruction.into(),
            slide_ids,
            max_concurrency,
            timestamp: Utc::now(),
        })
    }

    /// Creates a `SlideProgress` event.
    #[must_use]
    pub const fn slide_progress(slide: SlideRecord, progress: BatchProgress) -> Self {
        Self::SlideProgress(SlideProgressPayload { slide, progress })
    }

    /// Creates a `BatchComplete` event.
    #[must_use]
    pub const fn batch_complete(progress: BatchProgress) -> Self {
        Self::BatchComplete(BatchCompletePayload { progress })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::BatchStarted(_) => "batch_started",
            Self::SlideProgress(_) => "slide_progress",
            Self::BatchComplete(_) => "batch_complete",
        }
    }

    /// Returns the batch this event belongs to.
    #[must_use]
    pub const fn batch_id(&self) -> BatchId {
        match self {
            Self::BatchStarted(payload) => payload.batch_id,
            Self::SlideProgress(payload) => payload.progress.batch_id,
            Self::BatchComplete(payload) => payload.progress.batch_id,
        }
    }

    /// Returns the slide state carried by a `slide_progress` event.
    #[must_use]
    pub fn slide_state(&self) -> Option<(&str, SlideEditState)> {
        match self {
            Self::SlideProgress(payload) => {
                Some((payload.slide.slide_id.as_str(), payload.slide.state))
            }
            _ => None,
        }
    }
}

// ============================================================================
// Progress Broadcaster
// ============================================================================

/// Broadcasts batch events to every subscribed observer.
///
/// Events are not replayed for late subscribers; use
/// `BatchOrchestrator::progress` for the current snapshot.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    sender: broadcast::Sender<BatchEvent>,
}

impl ProgressBroadcaster {
    /// Creates a broadcaster buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event. Returns the number of receivers reached.
    pub fn send(&self, event: BatchEvent) -> usize {
        // Err only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
