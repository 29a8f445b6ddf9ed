//! Cursor-based undo/redo ledger.
//!
//! Entries before the cursor are applied; entries at or after it can be
//! redone. Undo and redo only move the cursor. Recording a change truncates
//! the redo tail and evicts the oldest entry once `max_depth` is exceeded.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of entries kept.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Validation errors keyed by field path, e.g. `"s1.title"`.
pub type ValidationErrors = BTreeMap<String, String>;

// ============================================================================
// ChangeScope
// ============================================================================

/// What a recorded change touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeScope {
    /// A standalone form field.
    Field {
        /// Field name.
        name: String,
    },
    /// A field of one slide, edited by the user.
    SlideField {
        /// Slide the field belongs to.
        slide_id: String,
        /// Field name.
        field: String,
    },
    /// A slide's markup replaced by a batch edit.
    BatchEdit {
        /// Batch that produced the edit.
        batch_id: String,
        /// Slide that was edited.
        slide_id: String,
    },
}

impl ChangeScope {
    /// Returns the slide this change touched, if any.
    #[must_use]
    pub fn slide_id(&self) -> Option<&str> {
        match self {
            Self::Field { .. } => None,
            Self::SlideField { slide_id, .. } | Self::BatchEdit { slide_id, .. } => {
                Some(slide_id)
            }
        }
    }
}

impl std::fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field { name } => write!(f, "{name}"),
            Self::SlideField { slide_id, field } => write!(f, "{slide_id}.{field}"),
            Self::BatchEdit { batch_id, slide_id } => write!(f, "batch {batch_id} on {slide_id}"),
        }
    }
}

// ============================================================================
// Change / HistoryEntry
// ============================================================================

/// A change about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<V> {
    /// What was touched.
    pub scope: ChangeScope,
    /// Value before the change.
    pub previous: V,
    /// Value after the change.
    pub next: V,
    /// Validation errors before the change.
    pub errors_before: ValidationErrors,
    /// Validation errors after the change.
    pub errors_after: ValidationErrors,
}

impl<V> Change<V> {
    /// Creates a change with empty error snapshots.
    #[must_use]
    pub fn new(scope: ChangeScope, previous: V, next: V) -> Self {
        Self {
            scope,
            previous,
            next,
            errors_before: ValidationErrors::new(),
            errors_after: ValidationErrors::new(),
        }
    }

    /// Attaches the validation error snapshots.
    #[must_use]
    pub fn with_errors(mut self, before: ValidationErrors, after: ValidationErrors) -> Self {
        self.errors_before = before;
        self.errors_after = after;
        self
    }
}

/// One recorded, reversible change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry<V> {
    /// Monotonic id within this ledger.
    pub id: u64,
    /// What was touched.
    pub scope: ChangeScope,
    /// Value to restore on undo.
    pub previous: V,
    /// Value to restore on redo.
    pub next: V,
    /// Errors to restore on undo.
    pub errors_before: ValidationErrors,
    /// Errors to restore on redo.
    pub errors_after: ValidationErrors,
    /// When the change was recorded.
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// History
// ============================================================================

/// Bounded undo/redo ledger over values of type `V`.
#[derive(Debug, Clone)]
pub struct History<V> {
    entries: VecDeque<HistoryEntry<V>>,
    cursor: usize,
    max_depth: usize,
    next_id: u64,
}

impl<V> Default for History<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl<V> History<V> {
    /// Creates an empty ledger keeping at most `max_depth` entries (minimum 1).
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            entries: VecDeque::with_capacity(max_depth.min(DEFAULT_MAX_DEPTH)),
            cursor: 0,
            max_depth,
            next_id: 0,
        }
    }

    /// Records a change at the cursor, discarding anything that could have
    /// been redone. Returns the id of the new entry.
    pub fn record(&mut self, change: Change<V>) -> u64 {
        if self.cursor < self.entries.len() {
            debug!(
                dropped = self.entries.len() - self.cursor,
                "Pruning redo tail"
            );
            self.entries.truncate(self.cursor);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(HistoryEntry {
            id,
            scope: change.scope,
            previous: change.previous,
            next: change.next,
            errors_before: change.errors_before,
            errors_after: change.errors_after,
            recorded_at: Utc::now(),
        });

        while self.entries.len() > self.max_depth {
            if let Some(evicted) = self.entries.pop_front() {
                debug!(entry = evicted.id, scope = %evicted.scope, "Evicted oldest history entry");
            }
        }
        self.cursor = self.entries.len();
        id
    }

    /// Steps back one entry. The caller restores `previous` and `errors_before`.
    pub fn undo(&mut self) -> Option<&HistoryEntry<V>> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Steps forward one entry. The caller restores `next` and `errors_after`.
    pub fn redo(&mut self) -> Option<&HistoryEntry<V>> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(entry)
    }

    /// Returns the entry [`History::undo`] would return, without moving.
    #[must_use]
    pub fn peek_undo(&self) -> Option<&HistoryEntry<V>> {
        self.cursor.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Returns the entry [`History::redo`] would return, without moving.
    #[must_use]
    pub fn peek_redo(&self) -> Option<&HistoryEntry<V>> {
        self.entries.get(self.cursor)
    }

    /// Returns `true` if there is an entry to undo.
    #[must_use]
    pub const fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Returns `true` if there is an entry to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Drops every entry and resets the cursor.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    /// Number of entries, applied or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of applied entries.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Maximum number of entries kept.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Iterates entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry<V>> {
        self.entries.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn field(name: &str) -> ChangeScope {
        ChangeScope::Field {
            name: name.to_string(),
        }
    }

    fn change(prev: i32, next: i32) -> Change<i32> {
        Change::new(field("n"), prev, next)
    }

    /// Records `0 -> 1 -> ... -> n` against `value`.
    fn record_steps(history: &mut History<i32>, value: &mut i32, n: i32) {
        for step in 1..=n {
            history.record(change(*value, step));
            *value = step;
        }
    }

    #[test]
    fn empty_history_has_nothing_to_do() {
        let mut history: History<i32> = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn undo_all_then_redo_all_roundtrips() {
        let mut history = History::new(10);
        let mut value = 0;
        record_steps(&mut history, &mut value, 4);

        while let Some(entry) = history.undo() {
            value = entry.previous;
        }
        assert_eq!(value, 0);
        assert_eq!(history.cursor(), 0);

        while let Some(entry) = history.redo() {
            value = entry.next;
        }
        assert_eq!(value, 4);
        assert_eq!(history.cursor(), 4);
    }

    #[test]
    fn record_after_undo_prunes_redo_tail() {
        let mut history = History::new(10);
        let mut value = 0;
        record_steps(&mut history, &mut value, 3);

        history.undo();
        history.undo();
        assert!(history.can_redo());

        history.record(change(1, 42));
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert_eq!(history.len(), 2);
        assert_eq!(history.peek_undo().unwrap().next, 42);
    }

    #[test]
    fn oldest_entry_evicted_beyond_max_depth() {
        let mut history = History::new(3);
        let mut value = 0;
        record_steps(&mut history, &mut value, 5);

        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 3);
        let nexts: Vec<i32> = history.entries().map(|e| e.next).collect();
        assert_eq!(nexts, vec![3, 4, 5]);

        while let Some(entry) = history.undo() {
            value = entry.previous;
        }
        assert_eq!(value, 2);
    }

    #[test]
    fn zero_depth_is_clamped_to_one() {
        let mut history = History::new(0);
        history.record(change(0, 1));
        history.record(change(1, 2));
        assert_eq!(history.max_depth(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn peek_does_not_move_cursor() {
        let mut history = History::new(5);
        history.record(change(0, 1));
        assert_eq!(history.peek_undo().unwrap().next, 1);
        assert!(history.peek_redo().is_none());
        assert_eq!(history.cursor(), 1);

        history.undo();
        assert!(history.peek_undo().is_none());
        assert_eq!(history.peek_redo().unwrap().next, 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut history = History::new(5);
        history.record(change(0, 1));
        history.record(change(1, 2));
        history.undo();
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.cursor(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn entry_ids_are_monotonic_across_pruning() {
        let mut history = History::new(5);
        let first = history.record(change(0, 1));
        history.undo();
        let second = history.record(change(0, 2));
        assert!(second > first);
    }

    #[test]
    fn error_snapshots_travel_with_entry() {
        let mut history = History::new(5);
        let before = ValidationErrors::new();
        let after =
            ValidationErrors::from([("s1.title".to_string(), "Title is required".to_string())]);
        history.record(change(0, 1).with_errors(before.clone(), after.clone()));

        let entry = history.undo().unwrap();
        assert_eq!(entry.errors_before, before);
        assert_eq!(entry.errors_after, after);
    }

    #[test]
    fn scope_reports_slide_and_serializes_with_kind() {
        let scope = ChangeScope::BatchEdit {
            batch_id: "b-1".into(),
            slide_id: "s1".into(),
        };
        assert_eq!(scope.slide_id(), Some("s1"));
        assert_eq!(field("x").slide_id(), None);

        let json = serde_json::to_string(&scope).unwrap();
        assert!(json.contains(r#""kind":"batch_edit""#));

        let slide_field = ChangeScope::SlideField {
            slide_id: "s2".into(),
            field: "title".into(),
        };
        assert_eq!(slide_field.to_string(), "s2.title");
    }
}
