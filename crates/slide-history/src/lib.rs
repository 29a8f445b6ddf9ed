//! Slide History
//!
//! Generic undo/redo ledger for form-like editor state. Each entry carries
//! the value before and after a change plus the validation errors at both
//! moments, so undo can restore what the user saw.
//!
//! The ledger never touches the store itself; callers apply
//! [`HistoryEntry::previous`] or [`HistoryEntry::next`] as they see fit.

pub mod history;

pub use history::{
    Change, ChangeScope, History, HistoryEntry, ValidationErrors, DEFAULT_MAX_DEPTH,
};
