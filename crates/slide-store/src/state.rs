//! Store state, actions, and the pure transition function.
//!
//! [`StoreState::apply`] is the only place state changes. It returns `false`
//! for malformed actions (unknown slide ids, out-of-range indices, duplicate
//! ids, no lesson loaded), in which case the caller keeps the previous state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::lesson::{Lesson, Slide, SlideId, SlidePatch};

// ============================================================================
// ViewMode
// ============================================================================

/// Editor view mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// Single-slide editing view (default).
    #[default]
    Edit,
    /// Read-only presentation preview.
    Preview,
    /// Thumbnail grid of all slides.
    Grid,
}

impl ViewMode {
    /// Parses a view mode name, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "edit" => Some(Self::Edit),
            "preview" => Some(Self::Preview),
            "grid" => Some(Self::Grid),
            _ => None,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Preview => "preview",
            Self::Grid => "grid",
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ViewMode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid view mode '{s}': expected one of 'edit', 'preview', 'grid'"
            ))
        })
    }
}

impl Serialize for ViewMode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Busy and dialog flags
// ============================================================================

/// Long-running operations the UI shows a spinner for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyFlag {
    /// Lesson or slide generation in progress.
    Generating,
    /// Save to durable storage in progress.
    Saving,
}

/// Current values of every [`BusyFlag`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyFlags {
    /// Generation in progress.
    pub generating: bool,
    /// Save in progress.
    pub saving: bool,
}

impl BusyFlags {
    /// Reads a flag.
    #[must_use]
    pub const fn get(self, flag: BusyFlag) -> bool {
        match flag {
            BusyFlag::Generating => self.generating,
            BusyFlag::Saving => self.saving,
        }
    }

    /// Writes a flag.
    pub fn set(&mut self, flag: BusyFlag, value: bool) {
        match flag {
            BusyFlag::Generating => self.generating = value,
            BusyFlag::Saving => self.saving = value,
        }
    }

    /// Returns `true` if any operation is in progress.
    #[must_use]
    pub const fn any(self) -> bool {
        self.generating || self.saving
    }
}

/// Modal dialogs owned by the editor page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialog {
    /// Batch AI-edit instruction dialog.
    BatchEdit,
    /// Export dialog.
    Export,
    /// Slide deletion confirmation.
    ConfirmDelete,
}

/// Open/closed state of every [`Dialog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogFlags {
    /// Batch edit dialog open.
    pub batch_edit: bool,
    /// Export dialog open.
    pub export: bool,
    /// Delete confirmation open.
    pub confirm_delete: bool,
}

impl DialogFlags {
    /// Reads a dialog flag.
    #[must_use]
    pub const fn is_open(self, dialog: Dialog) -> bool {
        match dialog {
            Dialog::BatchEdit => self.batch_edit,
            Dialog::Export => self.export,
            Dialog::ConfirmDelete => self.confirm_delete,
        }
    }

    /// Writes a dialog flag.
    pub fn set(&mut self, dialog: Dialog, open: bool) {
        match dialog {
            Dialog::BatchEdit => self.batch_edit = open,
            Dialog::Export => self.export = open,
            Dialog::ConfirmDelete => self.confirm_delete = open,
        }
    }
}

// ============================================================================
// StoreDefaults
// ============================================================================

/// Values a store starts from and returns to on reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDefaults {
    /// Initial view mode.
    #[serde(default)]
    pub view_mode: ViewMode,
}

// ============================================================================
// Action
// ============================================================================

/// A declared store transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    /// Load a lesson, selecting its first slide.
    SetLesson(Lesson),
    /// Insert a slide at `position`, or append when `None`.
    AddSlide {
        /// The slide to insert.
        slide: Slide,
        /// Insertion index, clamped to the slide count.
        position: Option<usize>,
    },
    /// Patch an existing slide.
    UpdateSlide {
        /// Target slide.
        id: SlideId,
        /// Fields to change.
        patch: SlidePatch,
    },
    /// Remove a slide.
    RemoveSlide {
        /// Target slide.
        id: SlideId,
    },
    /// Move the slide at `from` to `to`.
    ReorderSlides {
        /// Current index.
        from: usize,
        /// Destination index.
        to: usize,
    },
    /// Make a slide the focused one.
    SelectSlide {
        /// Target slide.
        id: SlideId,
    },
    /// Replace the multi-selection used for batch targeting.
    SetSelection(BTreeSet<SlideId>),
    /// Switch the view mode.
    SetViewMode(ViewMode),
    /// Toggle a busy flag.
    SetBusyFlag {
        /// Which flag.
        flag: BusyFlag,
        /// New value.
        value: bool,
    },
    /// Open or close a dialog.
    SetDialogOpen {
        /// Which dialog.
        dialog: Dialog,
        /// New value.
        open: bool,
    },
    /// Restore default state.
    Reset(StoreDefaults),
}

impl Action {
    /// Returns the action name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetLesson(_) => "set_lesson",
            Self::AddSlide { .. } => "add_slide",
            Self::UpdateSlide { .. } => "update_slide",
            Self::RemoveSlide { .. } => "remove_slide",
            Self::ReorderSlides { .. } => "reorder_slides",
            Self::SelectSlide { .. } => "select_slide",
            Self::SetSelection(_) => "set_selection",
            Self::SetViewMode(_) => "set_view_mode",
            Self::SetBusyFlag { .. } => "set_busy_flag",
            Self::SetDialogOpen { .. } => "set_dialog_open",
            Self::Reset(_) => "reset",
        }
    }
}

// ============================================================================
// StoreState
// ============================================================================

/// Complete editor state held by the store.
///
/// `selected_slide_id` is always `None` or the id of a slide in
/// `current_lesson`, and `current_slide_index` is always the position of that
/// slide. Both are `None` exactly when there is no slide to point at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    /// The lesson being edited.
    pub current_lesson: Option<Lesson>,
    /// The focused slide.
    pub selected_slide_id: Option<SlideId>,
    /// Slides picked for batch targeting.
    pub selected_slide_ids: BTreeSet<SlideId>,
    /// Current view mode.
    pub view_mode: ViewMode,
    /// Busy flags.
    pub busy: BusyFlags,
    /// Dialog flags.
    pub dialogs: DialogFlags,
    /// Position of the focused slide; `None` when there are no slides.
    pub current_slide_index: Option<usize>,
}

impl StoreState {
    /// Creates an empty state from the given defaults.
    #[must_use]
    pub fn with_defaults(defaults: StoreDefaults) -> Self {
        Self {
            view_mode: defaults.view_mode,
            ..Self::default()
        }
    }

    /// Returns the slides of the current lesson, or an empty slice.
    #[must_use]
    pub fn slides(&self) -> &[Slide] {
        self.current_lesson
            .as_ref()
            .map_or(&[], |lesson| lesson.slides.as_slice())
    }

    /// Looks up a slide in the current lesson.
    #[must_use]
    pub fn slide(&self, id: &str) -> Option<&Slide> {
        self.current_lesson.as_ref().and_then(|lesson| lesson.slide(id))
    }

    /// Returns the focused slide.
    #[must_use]
    pub fn selected_slide(&self) -> Option<&Slide> {
        self.selected_slide_id
            .as_deref()
            .and_then(|id| self.slide(id))
    }

    /// Checks the selection and index invariants.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let slides = self.slides();
        let index_ok = match self.current_slide_index {
            Some(index) => index < slides.len(),
            None => slides.is_empty(),
        };
        let selected_ok = match self.selected_slide_id.as_deref() {
            Some(id) => {
                self.current_lesson
                    .as_ref()
                    .and_then(|lesson| lesson.position(id))
                    == self.current_slide_index
            }
            None => self.current_slide_index.is_none(),
        };
        let multi_ok = self
            .selected_slide_ids
            .iter()
            .all(|id| self.slide(id).is_some());
        index_ok && selected_ok && multi_ok
    }

    /// Applies `action` in place. Returns `false` for a malformed action;
    /// `self` may then be partially modified and must be discarded.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::SetLesson(lesson) => self.set_lesson(lesson),
            Action::AddSlide { slide, position } => self.add_slide(slide, position),
            Action::UpdateSlide { id, patch } => self.update_slide(&id, patch),
            Action::RemoveSlide { id } => self.remove_slide(&id),
            Action::ReorderSlides { from, to } => self.reorder_slides(from, to),
            Action::SelectSlide { id } => self.select_slide(&id),
            Action::SetSelection(ids) => self.set_selection(ids),
            Action::SetViewMode(mode) => {
                self.view_mode = mode;
                true
            }
            Action::SetBusyFlag { flag, value } => {
                self.busy.set(flag, value);
                true
            }
            Action::SetDialogOpen { dialog, open } => {
                self.dialogs.set(dialog, open);
                true
            }
            Action::Reset(defaults) => {
                *self = Self::with_defaults(defaults);
                true
            }
        }
    }

    fn set_lesson(&mut self, lesson: Lesson) -> bool {
        if !lesson.has_unique_slide_ids() {
            return false;
        }
        self.selected_slide_id = lesson.slides.first().map(|slide| slide.id.clone());
        self.selected_slide_ids.clear();
        self.current_lesson = Some(lesson);
        self.sync_index();
        true
    }

    fn add_slide(&mut self, slide: Slide, position: Option<usize>) -> bool {
        let Some(lesson) = self.current_lesson.as_mut() else {
            return false;
        };
        if lesson.slide(&slide.id).is_some() {
            return false;
        }
        let position = position.map_or(lesson.slides.len(), |p| p.min(lesson.slides.len()));
        if self.selected_slide_id.is_none() {
            self.selected_slide_id = Some(slide.id.clone());
        }
        lesson.slides.insert(position, slide);
        self.sync_index();
        true
    }

    fn update_slide(&mut self, id: &str, patch: SlidePatch) -> bool {
        let Some(slide) = self
            .current_lesson
            .as_mut()
            .and_then(|lesson| lesson.slide_mut(id))
        else {
            return false;
        };
        patch.apply_to(slide);
        true
    }

    fn remove_slide(&mut self, id: &str) -> bool {
        let Some(lesson) = self.current_lesson.as_mut() else {
            return false;
        };
        let Some(position) = lesson.position(id) else {
            return false;
        };
        lesson.slides.remove(position);
        self.selected_slide_ids.remove(id);
        if self.selected_slide_id.as_deref() == Some(id) {
            // Focus moves to the slide that took its place, or the new last one.
            let fallback = position.min(lesson.slides.len().saturating_sub(1));
            self.selected_slide_id = lesson.slides.get(fallback).map(|slide| slide.id.clone());
        }
        self.sync_index();
        true
    }

    fn reorder_slides(&mut self, from: usize, to: usize) -> bool {
        let Some(lesson) = self.current_lesson.as_mut() else {
            return false;
        };
        let len = lesson.slides.len();
        if from >= len || to >= len {
            return false;
        }
        let slide = lesson.slides.remove(from);
        lesson.slides.insert(to, slide);
        self.sync_index();
        true
    }

    fn select_slide(&mut self, id: &str) -> bool {
        if self.slide(id).is_none() {
            return false;
        }
        self.selected_slide_id = Some(id.to_string());
        self.sync_index();
        true
    }

    fn set_selection(&mut self, ids: BTreeSet<SlideId>) -> bool {
        if !ids.iter().all(|id| self.slide(id).is_some()) {
            return false;
        }
        self.selected_slide_ids = ids;
        true
    }

    fn sync_index(&mut self) {
        self.current_slide_index = match (&self.current_lesson, &self.selected_slide_id) {
            (Some(lesson), Some(id)) => lesson.position(id),
            _ => None,
        };
    }
}

/// Computes the state after `action`, or `None` if the action is malformed.
#[must_use]
pub fn reduce(state: &StoreState, action: Action) -> Option<StoreState> {
    let mut next = state.clone();
    next.apply(action).then_some(next)
}
