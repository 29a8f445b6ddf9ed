//! Field validation for tracked slide edits.
//!
//! Validation never blocks an edit. Its result is folded into the session's
//! error map, which history snapshots before and after every change.

use slide_history::ValidationErrors;
use slide_store::SlideField;

/// Maximum slide title length, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum slide markup size, in bytes.
pub const MAX_MARKUP_BYTES: usize = 100 * 1024;

/// Returns the error key for one field of one slide, e.g. `"s1.title"`.
#[must_use]
pub fn error_key(slide_id: &str, field: SlideField) -> String {
    format!("{slide_id}.{field}")
}

/// Checks a field value. Returns the error message, if any.
#[must_use]
pub fn validate_field(field: SlideField, value: &str) -> Option<String> {
    match field {
        SlideField::Title if value.trim().is_empty() => Some("Title is required".to_string()),
        SlideField::Title if value.chars().count() > MAX_TITLE_CHARS => Some(format!(
            "Title must be at most {MAX_TITLE_CHARS} characters"
        )),
        SlideField::Markup if value.len() > MAX_MARKUP_BYTES => Some(format!(
            "Markup must be at most {} KB",
            MAX_MARKUP_BYTES / 1024
        )),
        _ => None,
    }
}

/// Returns `errors` updated for the new value of one field.
#[must_use]
pub fn revalidate(
    errors: &ValidationErrors,
    slide_id: &str,
    field: SlideField,
    value: &str,
) -> ValidationErrors {
    let mut next = errors.clone();
    let key = error_key(slide_id, field);
    match validate_field(field, value) {
        Some(message) => {
            next.insert(key, message);
        }
        None => {
            next.remove(&key);
        }
    }
    next
}
