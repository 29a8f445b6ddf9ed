//! Batch targets built from store state.

use serde::{Deserialize, Serialize};
use slide_store::{Lesson, StoreState};

/// One slide to edit, with the markup the request will be based on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideTarget {
    /// Slide to edit.
    pub slide_id: String,
    /// Markup sent as `currentMarkup`.
    pub markup: String,
}

impl SlideTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(slide_id: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            slide_id: slide_id.into(),
            markup: markup.into(),
        }
    }
}

/// Lesson-level context sent with every request in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchContext {
    /// Lesson topic.
    pub topic: String,
    /// Lesson age group.
    pub age_group: String,
}

impl BatchContext {
    /// Takes the topic and age group from a lesson. The topic is the subject,
    /// or the title when no subject is set.
    #[must_use]
    pub fn from_lesson(lesson: &Lesson) -> Self {
        let topic = if lesson.subject.trim().is_empty() {
            lesson.title.clone()
        } else {
            lesson.subject.clone()
        };
        Self {
            topic,
            age_group: lesson.age_group.clone(),
        }
    }
}

/// Builds targets from the store's current lesson, in lesson order.
///
/// With an empty `ids` every slide is targeted. Unknown ids are skipped, so
/// an empty result means nothing could be targeted.
#[must_use]
pub fn targets_from_state(state: &StoreState, ids: &[String]) -> Vec<SlideTarget> {
    state
        .slides()
        .iter()
        .filter(|slide| ids.is_empty() || ids.iter().any(|id| *id == slide.id))
        .map(|slide| SlideTarget::new(slide.id.clone(), slide.markup.clone()))
        .collect()
}
