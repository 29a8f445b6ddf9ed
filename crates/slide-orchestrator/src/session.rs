//! Editing session: a store paired with its undo/redo ledger.
//!
//! Every tracked change goes through [`EditorSession`]. Mutating operations
//! are serialized by a writer lock. Each one records its history entry first
//! and dispatches the store update afterwards, so observers never see a store
//! change without its entry.
//!
//! The ledger itself is only locked for short reads and updates, never while
//! the store notifies. Store listeners may therefore query
//! [`EditorSession::can_undo`], [`EditorSession::entries`] and the other
//! read accessors. They must not start another tracked edit synchronously.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use slide_history::{Change, ChangeScope, History, HistoryEntry, ValidationErrors};
use slide_store::{Action, Lesson, SlideField, Store, StoreDefaults, StoreState};
use tracing::{debug, info};

use crate::batch::BatchId;
use crate::config::EditorConfig;
use crate::error::EditFailure;
use crate::validation::revalidate;

/// Held for the whole of one tracked change.
pub(crate) type WriterGuard<'a> = MutexGuard<'a, ()>;

/// History and validation state guarded together.
#[derive(Debug)]
struct Ledger {
    history: History<String>,
    errors: ValidationErrors,
}

impl Ledger {
    fn clear(&mut self) {
        self.history.clear();
        self.errors.clear();
    }
}

/// A change applied by [`EditorSession::undo`] or [`EditorSession::redo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    /// What was touched.
    pub scope: ChangeScope,
    /// The value now in place.
    pub value: String,
}

/// Cloneable handle to one editing session.
#[derive(Debug, Clone)]
pub struct EditorSession {
    store: Store,
    defaults: StoreDefaults,
    ledger: Arc<Mutex<Ledger>>,
    writer: Arc<Mutex<()>>,
}

impl EditorSession {
    /// Creates a session over `store`, keeping at most `history_depth` entries.
    #[must_use]
    pub fn new(store: Store, defaults: StoreDefaults, history_depth: usize) -> Self {
        Self {
            store,
            defaults,
            ledger: Arc::new(Mutex::new(Ledger {
                history: History::new(history_depth),
                errors: ValidationErrors::new(),
            })),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a session with a fresh store configured from `config`.
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        let defaults = config.store_defaults();
        Self::new(Store::new(defaults), defaults, config.history_depth)
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the current store state.
    #[must_use]
    pub fn state(&self) -> Arc<StoreState> {
        self.store.state()
    }

    /// Serializes tracked changes. Never taken by the read accessors.
    pub(crate) fn lock_writer(&self) -> WriterGuard<'_> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Loads a lesson and starts a fresh history.
    ///
    /// A lesson with duplicate slide ids is rejected by the store and leaves
    /// the history untouched.
    pub fn load_lesson(&self, lesson: Lesson) -> Arc<StoreState> {
        let _writer = self.lock_writer();
        if lesson.has_unique_slide_ids() {
            info!(lesson_id = %lesson.id, slides = lesson.slides.len(), "Loading lesson");
            self.lock_ledger().clear();
        } else {
            debug!(lesson_id = %lesson.id, "Rejecting lesson with duplicate slide ids");
        }
        self.store.dispatch(Action::SetLesson(lesson))
    }

    /// Resets the store to its defaults and drops all history.
    pub fn close(&self) -> Arc<StoreState> {
        let _writer = self.lock_writer();
        self.lock_ledger().clear();
        debug!("Editing session closed");
        self.store.reset(self.defaults)
    }

    // ========================================================================
    // Tracked edits
    // ========================================================================

    /// Sets one text field of a slide and records the change.
    ///
    /// Returns `false` if the slide does not exist or the value is unchanged.
    /// An invalid value is still applied; its error shows up in
    /// [`EditorSession::validation_errors`].
    pub fn edit_slide_field(&self, slide_id: &str, field: SlideField, value: &str) -> bool {
        let _writer = self.lock_writer();
        let state = self.store.state();
        let Some(slide) = state.slide(slide_id) else {
            debug!(slide_id, "Ignoring edit of unknown slide");
            return false;
        };
        let previous = field.value_of(slide);
        if previous == value {
            return false;
        }

        let scope = ChangeScope::SlideField {
            slide_id: slide_id.to_string(),
            field: field.name().to_string(),
        };
        self.record(scope, slide_id, field, previous, value);
        self.store.dispatch(Action::UpdateSlide {
            id: slide_id.to_string(),
            patch: field.patch(value),
        });
        true
    }

    /// Applies one batch result: replaces the slide's markup and records it.
    ///
    /// # Errors
    ///
    /// Returns a `slide_missing` failure if the slide is no longer in the lesson.
    pub fn apply_batch_edit(
        &self,
        batch_id: BatchId,
        slide_id: &str,
        markup: &str,
    ) -> Result<(), EditFailure> {
        let writer = self.lock_writer();
        self.apply_batch_edit_locked(&writer, batch_id, slide_id, markup)
    }

    /// [`EditorSession::apply_batch_edit`] for a caller already holding the
    /// writer lock.
    pub(crate) fn apply_batch_edit_locked(
        &self,
        _writer: &WriterGuard<'_>,
        batch_id: BatchId,
        slide_id: &str,
        markup: &str,
    ) -> Result<(), EditFailure> {
        let state = self.store.state();
        let Some(slide) = state.slide(slide_id) else {
            return Err(EditFailure::slide_missing(slide_id));
        };

        let scope = ChangeScope::BatchEdit {
            batch_id: batch_id.to_string(),
            slide_id: slide_id.to_string(),
        };
        self.record(scope, slide_id, SlideField::Markup, &slide.markup, markup);
        self.store.dispatch(Action::UpdateSlide {
            id: slide_id.to_string(),
            patch: SlideField::Markup.patch(markup),
        });
        debug!(%batch_id, slide_id, "Applied batch edit");
        Ok(())
    }

    /// Records a change and its validation snapshots. The ledger lock is
    /// released before the caller dispatches.
    fn record(
        &self,
        scope: ChangeScope,
        slide_id: &str,
        field: SlideField,
        previous: &str,
        next: &str,
    ) {
        let mut ledger = self.lock_ledger();
        let errors_after = revalidate(&ledger.errors, slide_id, field, next);
        let change = Change::new(scope, previous.to_string(), next.to_string())
            .with_errors(ledger.errors.clone(), errors_after.clone());
        ledger.history.record(change);
        ledger.errors = errors_after;
    }

    // ========================================================================
    // Undo / redo
    // ========================================================================

    /// Reverts the most recent applied change.
    ///
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&self) -> Option<AppliedChange> {
        let _writer = self.lock_writer();
        let entry = {
            let mut ledger = self.lock_ledger();
            let entry = ledger.history.undo()?.clone();
            ledger.errors.clone_from(&entry.errors_before);
            entry
        };
        self.restore(&entry.scope, &entry.previous);
        Some(AppliedChange {
            scope: entry.scope,
            value: entry.previous,
        })
    }

    /// Re-applies the most recently undone change.
    ///
    /// Returns `None` when there is nothing to redo.
    pub fn redo(&self) -> Option<AppliedChange> {
        let _writer = self.lock_writer();
        let entry = {
            let mut ledger = self.lock_ledger();
            let entry = ledger.history.redo()?.clone();
            ledger.errors.clone_from(&entry.errors_after);
            entry
        };
        self.restore(&entry.scope, &entry.next);
        Some(AppliedChange {
            scope: entry.scope,
            value: entry.next,
        })
    }

    fn restore(&self, scope: &ChangeScope, value: &str) {
        let (slide_id, field) = match scope {
            ChangeScope::SlideField { slide_id, field } => match SlideField::from_name(field) {
                Some(field) => (slide_id, field),
                None => return,
            },
            ChangeScope::BatchEdit { slide_id, .. } => (slide_id, SlideField::Markup),
            // Standalone form fields are not part of the store.
            ChangeScope::Field { .. } => return,
        };
        self.store.dispatch(Action::UpdateSlide {
            id: slide_id.clone(),
            patch: field.patch(value),
        });
    }

    /// Returns `true` if there is a change to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.lock_ledger().history.can_undo()
    }

    /// Returns `true` if there is a change to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.lock_ledger().history.can_redo()
    }

    /// Returns the current validation errors.
    #[must_use]
    pub fn validation_errors(&self) -> ValidationErrors {
        self.lock_ledger().errors.clone()
    }

    /// Returns a copy of every history entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry<String>> {
        self.lock_ledger().history.entries().cloned().collect()
    }

    /// Returns the number of applied history entries.
    #[must_use]
    pub fn history_cursor(&self) -> usize {
        self.lock_ledger().history.cursor()
    }
}
