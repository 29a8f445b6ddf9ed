//! Batch edit job state.
//!
//! A [`BatchJob`] tracks one fan-out of an instruction over a list of slides.
//! Each slide has a [`SlideRecord`] that moves from `Pending` to exactly one
//! terminal state and never changes again.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EditFailure, EditFailureKind};

// ============================================================================
// BatchId
// ============================================================================

/// Unique identifier of one batch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SlideEditState
// ============================================================================

/// State of one slide within a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideEditState {
    /// Queued or in flight.
    #[default]
    Pending,
    /// Edit applied to the store.
    Succeeded,
    /// Edit failed; the slide is unchanged.
    Failed,
    /// Batch was cancelled before this slide finished.
    Cancelled,
}

impl SlideEditState {
    /// Returns `true` if this state is final.
    ///
    /// # Examples
    ///
    /// ```
    /// use slide_orchestrator::SlideEditState;
    ///
    /// assert!(SlideEditState::Failed.is_terminal());
    /// assert!(!SlideEditState::Pending.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for SlideEditState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ============================================================================
// SlideRecord
// ============================================================================

/// Outcome record for one slide in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRecord {
    /// Target slide.
    pub slide_id: String,
    /// Position of the slide in the batch's target list.
    pub index: usize,
    /// Current state.
    pub state: SlideEditState,
    /// Attempt number; every batch is a single attempt per slide.
    pub attempt: u32,
    /// Round-trip time measured here, from submission to response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    /// Processing time reported by the edit endpoint, if it answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_elapsed_ms: Option<u64>,
    /// Failure message, if the slide failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure category, if the slide failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<EditFailureKind>,
    /// When the record became terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SlideRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn pending(slide_id: impl Into<String>, index: usize) -> Self {
        Self {
            slide_id: slide_id.into(),
            index,
            state: SlideEditState::Pending,
            attempt: 1,
            elapsed_ms: None,
            endpoint_elapsed_ms: None,
            error: None,
            failure_kind: None,
            finished_at: None,
        }
    }

    /// Marks the record succeeded. Returns `false` if it was already terminal.
    pub fn succeed(&mut self, elapsed_ms: u64) -> bool {
        self.finish(SlideEditState::Succeeded, Some(elapsed_ms), None)
    }

    /// Marks the record failed. Returns `false` if it was already terminal.
    pub fn fail(&mut self, failure: &EditFailure, elapsed_ms: Option<u64>) -> bool {
        self.finish(SlideEditState::Failed, elapsed_ms, Some(failure))
    }

    /// Marks the record cancelled. Returns `false` if it was already terminal.
    pub fn cancel(&mut self) -> bool {
        self.finish(SlideEditState::Cancelled, None, None)
    }

    fn finish(
        &mut self,
        state: SlideEditState,
        elapsed_ms: Option<u64>,
        failure: Option<&EditFailure>,
    ) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        self.elapsed_ms = elapsed_ms;
        self.error = failure.map(|f| f.message.clone());
        self.failure_kind = failure.map(|f| f.kind);
        self.finished_at = Some(Utc::now());
        true
    }
}

// ============================================================================
// BatchStatus
// ============================================================================

/// Overall status of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// At least one slide is still pending.
    #[default]
    Running,
    /// Every slide succeeded.
    Completed,
    /// Every slide finished and at least one failed.
    CompletedWithErrors,
    /// The batch was cancelled.
    Cancelled,
}

impl BatchStatus {
    /// Returns `true` if no further slide can change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithErrors => write!(f, "completed_with_errors"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ============================================================================
// BatchJob
// ============================================================================

/// Live state of one batch edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    /// Batch identifier.
    pub id: BatchId,
    /// The instruction sent for every slide.
    pub instruction: String,
    /// Per-slide records in target order.
    pub records: Vec<SlideRecord>,
    /// Set once `cancel` has been requested.
    pub cancel_requested: bool,
    /// When the batch was started.
    pub started_at: DateTime<Utc>,
    /// When the last slide became terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Creates a job with every slide pending.
    #[must_use]
    pub fn new<I, S>(id: BatchId, instruction: impl Into<String>, slide_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = slide_ids
            .into_iter()
            .enumerate()
            .map(|(index, slide_id)| SlideRecord::pending(slide_id, index))
            .collect();
        Self {
            id,
            instruction: instruction.into(),
            records,
            cancel_requested: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Returns the record for a slide.
    #[must_use]
    pub fn record(&self, slide_id: &str) -> Option<&SlideRecord> {
        self.records.iter().find(|r| r.slide_id == slide_id)
    }

    /// Returns the record for a slide, for mutation.
    pub fn record_mut(&mut self, slide_id: &str) -> Option<&mut SlideRecord> {
        self.records.iter_mut().find(|r| r.slide_id == slide_id)
    }

    /// Returns `true` if the slide is still pending and the batch has not
    /// been cancelled.
    #[must_use]
    pub fn is_live(&self, slide_id: &str) -> bool {
        !self.cancel_requested
            && self
                .record(slide_id)
                .is_some_and(|r| r.state == SlideEditState::Pending)
    }

    /// Requests cancellation and cancels every pending record.
    ///
    /// Returns the ids of the slides that were cancelled.
    pub fn cancel(&mut self) -> Vec<String> {
        self.cancel_requested = true;
        let cancelled: Vec<String> = self
            .records
            .iter_mut()
            .filter_map(|r| r.cancel().then(|| r.slide_id.clone()))
            .collect();
        self.mark_finished_if_done();
        cancelled
    }

    /// Stamps `finished_at` once no slide is pending.
    pub fn mark_finished_if_done(&mut self) {
        if self.finished_at.is_none() && self.records.iter().all(|r| r.state.is_terminal()) {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Returns an immutable snapshot of the job.
    #[must_use]
    pub fn progress(&self) -> BatchProgress {
        let count =
            |state: SlideEditState| self.records.iter().filter(|r| r.state == state).count();
        let succeeded = count(SlideEditState::Succeeded);
        let failed = count(SlideEditState::Failed);
        let pending = count(SlideEditState::Pending);
        let cancelled = count(SlideEditState::Cancelled);

        let status = if pending > 0 {
            BatchStatus::Running
        } else if cancelled > 0 {
            BatchStatus::Cancelled
        } else if failed > 0 {
            BatchStatus::CompletedWithErrors
        } else {
            BatchStatus::Completed
        };

        BatchProgress {
            batch_id: self.id,
            instruction: self.instruction.clone(),
            status,
            total: self.records.len(),
            succeeded,
            failed,
            pending,
            cancelled,
            slides: self.records.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Snapshot of a batch pushed to progress observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    /// Batch identifier.
    pub batch_id: BatchId,
    /// The instruction being applied.
    pub instruction: String,
    /// Overall status.
    pub status: BatchStatus,
    /// Number of target slides.
    pub total: usize,
    /// Slides edited successfully.
    pub succeeded: usize,
    /// Slides that failed.
    pub failed: usize,
    /// Slides still queued or in flight.
    pub pending: usize,
    /// Slides cancelled before finishing.
    pub cancelled: usize,
    /// Per-slide records in target order.
    pub slides: Vec<SlideRecord>,
    /// When the batch was started.
    pub started_at: DateTime<Utc>,
    /// When the last slide became terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchProgress {
    /// Returns the state of one slide.
    #[must_use]
    pub fn state_of(&self, slide_id: &str) -> Option<SlideEditState> {
        self.slides
            .iter()
            .find(|r| r.slide_id == slide_id)
            .map(|r| r.state)
    }

    /// Returns the ids of failed slides, for building a retry batch.
    #[must_use]
    pub fn failed_slide_ids(&self) -> Vec<String> {
        self.slides
            .iter()
            .filter(|r| r.state == SlideEditState::Failed)
            .map(|r| r.slide_id.clone())
            .collect()
    }

    /// Returns `true` if no slide is pending.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Returns the first id that appears more than once.
pub(crate) fn first_duplicate<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}
