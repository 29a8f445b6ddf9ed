//! Slide Editor Orchestrator
//!
//! Runs AI-driven batch edits over a lesson's slides and ties the store and
//! the undo/redo ledger together into an editing session.
//!
//! - [`EditorSession`]: tracked field edits, undo/redo, validation errors
//! - [`BatchOrchestrator`]: bounded fan-out of one instruction over many slides
//! - [`HttpEditClient`]: the per-slide AI-edit endpoint client
//! - [`events`]: progress events pushed to observers

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod session;
pub mod target;
pub mod validation;

pub use batch::{BatchId, BatchJob, BatchProgress, BatchStatus, SlideEditState, SlideRecord};
pub use client::{
    normalize_markup, HttpEditClient, SlideEditClient, SlideEditRequest, SlideEditResponse,
};
pub use config::{EditorConfig, CONFIG_FILE_NAME};
pub use error::{EditFailure, EditFailureKind, EditorError, Result};
pub use events::{BatchEvent, ProgressBroadcaster};
pub use orchestrator::BatchOrchestrator;
pub use session::{AppliedChange, EditorSession};
pub use target::{targets_from_state, BatchContext, SlideTarget};
pub use validation::{MAX_MARKUP_BYTES, MAX_TITLE_CHARS};
