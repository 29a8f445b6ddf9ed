//! Lesson and slide domain types.
//!
//! A [`Lesson`] is handed to the store by the external generation pipeline
//! and is only ever mutated through store actions afterwards.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a slide, unique within its lesson.
pub type SlideId = String;

// ============================================================================
// SlideVariant / SlideStatus
// ============================================================================

/// Layout variant of a slide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideVariant {
    /// Opening title slide.
    Title,
    /// Regular content slide.
    #[default]
    Content,
    /// Slide with an interactive activity.
    Interactive,
    /// Closing summary slide.
    Summary,
}

impl std::fmt::Display for SlideVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Content => write!(f, "content"),
            Self::Interactive => write!(f, "interactive"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// Authoring status of a slide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideStatus {
    /// Slide content is final.
    Completed,
    /// Slide is still being authored.
    #[default]
    Draft,
}

impl std::fmt::Display for SlideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Draft => write!(f, "draft"),
        }
    }
}

// ============================================================================
// Slide
// ============================================================================

/// One page of a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// Identifier, unique within the owning lesson.
    pub id: SlideId,
    /// Slide heading.
    pub title: String,
    /// Plain-text content.
    #[serde(default)]
    pub content: String,
    /// Rendered markup shown to learners.
    #[serde(default)]
    pub markup: String,
    /// Layout variant.
    #[serde(default)]
    pub variant: SlideVariant,
    /// Authoring status.
    #[serde(default)]
    pub status: SlideStatus,
    /// Reference to a rendered preview image, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
}

impl Slide {
    /// Creates a draft content slide with empty body.
    #[must_use]
    pub fn new(id: impl Into<SlideId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            markup: String::new(),
            variant: SlideVariant::default(),
            status: SlideStatus::default(),
            preview_image: None,
        }
    }

    /// Sets the plain-text content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the rendered markup.
    #[must_use]
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    /// Sets the layout variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: SlideVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the authoring status.
    #[must_use]
    pub const fn with_status(mut self, status: SlideStatus) -> Self {
        self.status = status;
        self
    }
}

// ============================================================================
// SlideField
// ============================================================================

/// Text fields of a slide that are edited through tracked history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideField {
    /// The slide heading.
    Title,
    /// The plain-text content.
    Content,
    /// The rendered markup.
    Markup,
}

impl SlideField {
    /// Returns the stable field name used in history scopes and error keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
            Self::Markup => "markup",
        }
    }

    /// Parses a field name produced by [`SlideField::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "content" => Some(Self::Content),
            "markup" => Some(Self::Markup),
            _ => None,
        }
    }

    /// Reads this field from a slide.
    #[must_use]
    pub fn value_of(self, slide: &Slide) -> &str {
        match self {
            Self::Title => &slide.title,
            Self::Content => &slide.content,
            Self::Markup => &slide.markup,
        }
    }

    /// Builds a patch that sets only this field.
    #[must_use]
    pub fn patch(self, value: impl Into<String>) -> SlidePatch {
        let patch = SlidePatch::default();
        match self {
            Self::Title => patch.with_title(value),
            Self::Content => patch.with_content(value),
            Self::Markup => patch.with_markup(value),
        }
    }
}

impl std::fmt::Display for SlideField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// SlidePatch
// ============================================================================

/// Partial update of a slide. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidePatch {
    /// New heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New plain-text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New rendered markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    /// New layout variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<SlideVariant>,
    /// New authoring status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SlideStatus>,
    /// New preview image; `Some(None)` clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<Option<String>>,
}

impl SlidePatch {
    /// Sets the heading.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the plain-text content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the rendered markup.
    #[must_use]
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    /// Sets the layout variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: SlideVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Sets the authoring status.
    #[must_use]
    pub const fn with_status(mut self, status: SlideStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets or clears the preview image.
    #[must_use]
    pub fn with_preview_image(mut self, preview_image: Option<String>) -> Self {
        self.preview_image = Some(preview_image);
        self
    }

    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.markup.is_none()
            && self.variant.is_none()
            && self.status.is_none()
            && self.preview_image.is_none()
    }

    /// Writes every set field into `slide`.
    pub fn apply_to(self, slide: &mut Slide) {
        if let Some(title) = self.title {
            slide.title = title;
        }
        if let Some(content) = self.content {
            slide.content = content;
        }
        if let Some(markup) = self.markup {
            slide.markup = markup;
        }
        if let Some(variant) = self.variant {
            slide.variant = variant;
        }
        if let Some(status) = self.status {
            slide.status = status;
        }
        if let Some(preview_image) = self.preview_image {
            slide.preview_image = preview_image;
        }
    }
}

// ============================================================================
// Lesson
// ============================================================================

/// A multi-slide lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Lesson identifier.
    pub id: String,
    /// Lesson title.
    pub title: String,
    /// Short description shown in listings.
    #[serde(default)]
    pub description: String,
    /// Subject area, e.g. "Biology".
    #[serde(default)]
    pub subject: String,
    /// Target age group tag, e.g. "11-14".
    #[serde(default)]
    pub age_group: String,
    /// Planned duration in minutes.
    #[serde(default)]
    pub duration_minutes: u32,
    /// Ordered slides.
    #[serde(default)]
    pub slides: Vec<Slide>,
    /// When the lesson was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the lesson was last modified upstream.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Identifier of the authoring user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

impl Lesson {
    /// Creates an empty lesson stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            subject: String::new(),
            age_group: String::new(),
            duration_minutes: 0,
            slides: Vec::new(),
            created_at: now,
            updated_at: now,
            author_id: None,
        }
    }

    /// Sets the subject area.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the age group tag.
    #[must_use]
    pub fn with_age_group(mut self, age_group: impl Into<String>) -> Self {
        self.age_group = age_group.into();
        self
    }

    /// Appends a slide.
    #[must_use]
    pub fn with_slide(mut self, slide: Slide) -> Self {
        self.slides.push(slide);
        self
    }

    /// Appends multiple slides.
    #[must_use]
    pub fn with_slides(mut self, slides: impl IntoIterator<Item = Slide>) -> Self {
        self.slides.extend(slides);
        self
    }

    /// Looks up a slide by id.
    #[must_use]
    pub fn slide(&self, id: &str) -> Option<&Slide> {
        self.slides.iter().find(|slide| slide.id == id)
    }

    /// Looks up a slide by id for mutation.
    pub fn slide_mut(&mut self, id: &str) -> Option<&mut Slide> {
        self.slides.iter_mut().find(|slide| slide.id == id)
    }

    /// Returns the index of a slide within the sequence.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.slides.iter().position(|slide| slide.id == id)
    }

    /// Returns `true` if no two slides share an id.
    #[must_use]
    pub fn has_unique_slide_ids(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.slides.len());
        self.slides.iter().all(|slide| seen.insert(slide.id.as_str()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_lesson() -> Lesson {
        Lesson::new("lesson-1", "Photosynthesis")
            .with_subject("Biology")
            .with_age_group("11-14")
            .with_slides([
                Slide::new("s1", "Intro").with_variant(SlideVariant::Title),
                Slide::new("s2", "Light reactions"),
                Slide::new("s3", "Recap").with_variant(SlideVariant::Summary),
            ])
    }

    #[test]
    fn slide_new_defaults_to_draft_content() {
        let slide = Slide::new("s1", "Intro");
        assert_eq!(slide.variant, SlideVariant::Content);
        assert_eq!(slide.status, SlideStatus::Draft);
        assert!(slide.markup.is_empty());
        assert!(slide.preview_image.is_none());
    }

    #[test]
    fn lesson_lookup_by_id() {
        let lesson = sample_lesson();
        assert_eq!(lesson.slide("s2").map(|s| s.title.as_str()), Some("Light reactions"));
        assert_eq!(lesson.position("s3"), Some(2));
        assert!(lesson.slide("missing").is_none());
        assert!(lesson.position("missing").is_none());
    }

    #[test]
    fn duplicate_slide_ids_detected() {
        let lesson = sample_lesson();
        assert!(lesson.has_unique_slide_ids());

        let lesson = lesson.with_slide(Slide::new("s1", "Duplicate"));
        assert!(!lesson.has_unique_slide_ids());
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut slide = Slide::new("s1", "Intro").with_content("Hello");
        SlidePatch::default()
            .with_markup("<h1>Intro</h1>")
            .with_status(SlideStatus::Completed)
            .apply_to(&mut slide);

        assert_eq!(slide.title, "Intro");
        assert_eq!(slide.content, "Hello");
        assert_eq!(slide.markup, "<h1>Intro</h1>");
        assert_eq!(slide.status, SlideStatus::Completed);
    }

    #[test]
    fn patch_can_clear_preview_image() {
        let mut slide = Slide::new("s1", "Intro");
        slide.preview_image = Some("previews/s1.png".to_string());

        SlidePatch::default()
            .with_preview_image(None)
            .apply_to(&mut slide);
        assert!(slide.preview_image.is_none());
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(SlidePatch::default().is_empty());
        assert!(!SlidePatch::default().with_title("x").is_empty());
    }

    #[test]
    fn slide_field_roundtrips_names() {
        for field in [SlideField::Title, SlideField::Content, SlideField::Markup] {
            assert_eq!(SlideField::from_name(field.name()), Some(field));
        }
        assert_eq!(SlideField::from_name("status"), None);
    }

    #[test]
    fn slide_field_reads_and_patches() {
        let mut slide = Slide::new("s1", "Intro").with_markup("<p>old</p>");
        assert_eq!(SlideField::Markup.value_of(&slide), "<p>old</p>");

        SlideField::Markup.patch("<p>new</p>").apply_to(&mut slide);
        assert_eq!(slide.markup, "<p>new</p>");
        assert_eq!(slide.title, "Intro");
    }

    #[test]
    fn lesson_deserializes_camel_case_with_defaults() {
        let json = r#"{
            "id": "lesson-9",
            "title": "Fractions",
            "ageGroup": "8-10",
            "durationMinutes": 45,
            "slides": [
                {"id": "a", "title": "Halves", "markup": "<p>1/2</p>", "variant": "interactive"}
            ]
        }"#;

        let lesson: Lesson = serde_json::from_str(json).unwrap();
        assert_eq!(lesson.age_group, "8-10");
        assert_eq!(lesson.duration_minutes, 45);
        assert_eq!(lesson.slides[0].variant, SlideVariant::Interactive);
        assert_eq!(lesson.slides[0].status, SlideStatus::Draft);
        assert!(lesson.author_id.is_none());
    }

    #[test]
    fn variant_and_status_display() {
        assert_eq!(SlideVariant::Interactive.to_string(), "interactive");
        assert_eq!(SlideStatus::Completed.to_string(), "completed");
        assert_eq!(
            serde_json::to_string(&SlideVariant::Summary).unwrap(),
            r#""summary""#
        );
    }
}
