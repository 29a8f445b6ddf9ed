//! Integration tests for a full editing session.
//!
//! These tests combine the store, the undo/redo ledger and the batch
//! orchestrator the way an editor front end would, using an in-process
//! edit client so timing is under test control.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slide_history::ChangeScope;
use slide_orchestrator::validation::error_key;
use slide_orchestrator::{
    targets_from_state, BatchContext, BatchEvent, BatchOrchestrator, BatchStatus, EditFailure,
    EditorConfig, EditorSession, SlideEditClient, SlideEditRequest, SlideEditResponse,
    SlideEditState, MAX_MARKUP_BYTES,
};
use slide_store::{Lesson, Slide, SlideField};

/// Edit client that doubles every `font-size` it finds after a delay.
struct FontDoublingClient {
    delay: Duration,
    oversized: HashSet<String>,
}

impl FontDoublingClient {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            oversized: HashSet::new(),
        }
    }

    fn with_oversized(mut self, slide_id: &str) -> Self {
        self.oversized.insert(slide_id.to_string());
        self
    }
}

#[async_trait]
impl SlideEditClient for FontDoublingClient {
    async fn edit_slide(
        &self,
        request: SlideEditRequest,
    ) -> Result<SlideEditResponse, EditFailure> {
        tokio::time::sleep(self.delay).await;
        if self.oversized.contains(&request.slide_id) {
            return Ok(SlideEditResponse::edited("x".repeat(MAX_MARKUP_BYTES + 1), 1));
        }
        let edited = request
            .current_markup
            .replace("font-size: 24px", "font-size: 48px");
        Ok(SlideEditResponse::edited(edited, 1))
    }
}

fn lesson(count: usize) -> Lesson {
    Lesson::new("lesson-flow", "Volcanoes")
        .with_age_group("11-14")
        .with_slides((1..=count).map(|n| {
            Slide::new(format!("s{n}"), format!("Slide {n}"))
                .with_markup(format!("<h1 style=\"font-size: 24px\">Slide {n}</h1>"))
        }))
}

fn setup(
    slides: usize,
    max_concurrency: usize,
    client: FontDoublingClient,
) -> (EditorSession, BatchOrchestrator, Lesson) {
    let config = EditorConfig {
        max_concurrency,
        ..EditorConfig::default()
    };
    let session = EditorSession::from_config(&config);
    let lesson = lesson(slides);
    session.load_lesson(lesson.clone());
    let orchestrator = BatchOrchestrator::from_config(&config, session.clone(), Arc::new(client));
    (session, orchestrator, lesson)
}

// ============================================================================
// Store + History Tests
// ============================================================================

/// Tests that store observers see each batch edit as it lands, and that
/// every observed change has a matching history entry.
#[tokio::test]
async fn test_store_observers_see_batch_edits() {
    let (session, orchestrator, lesson) =
        setup(3, 3, FontDoublingClient::new(Duration::from_millis(10)));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_listener = Arc::clone(&seen);
    let _subscription = session.store().subscribe(move |state| {
        let edited = state
            .slides()
            .iter()
            .filter(|s| s.markup.contains("48px"))
            .count();
        seen_in_listener.lock().unwrap().push(edited);
    });

    let targets = targets_from_state(&session.state(), &[]);
    let batch_id = orchestrator
        .start_batch(
            "double all title font sizes",
            targets,
            BatchContext::from_lesson(&lesson),
        )
        .expect("batch starts");
    let progress = orchestrator.wait(batch_id).await.expect("progress");

    assert_eq!(progress.status, BatchStatus::Completed);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(session.entries().len(), 3);
    assert!(session
        .entries()
        .iter()
        .all(|e| matches!(e.scope, ChangeScope::BatchEdit { .. })));
}

/// Tests that manual edits made during a batch share one undo stack with
/// the batch, and that undoing everything restores the loaded lesson.
#[tokio::test]
async fn test_manual_and_batch_edits_undo_together() {
    let (session, orchestrator, lesson) =
        setup(3, 2, FontDoublingClient::new(Duration::from_millis(50)));

    let targets = targets_from_state(&session.state(), &[]);
    let batch_id = orchestrator
        .start_batch("double all title font sizes", targets, BatchContext::default())
        .expect("batch starts");
    assert!(session.edit_slide_field("s2", SlideField::Title, "Eruptions"));
    orchestrator.wait(batch_id).await.expect("progress");

    assert_eq!(session.entries().len(), 4);
    let state = session.state();
    assert_eq!(state.slide("s2").expect("s2").title, "Eruptions");
    assert!(state.slides().iter().all(|s| s.markup.contains("48px")));

    let mut undone = 0;
    while session.undo().is_some() {
        undone += 1;
    }
    assert_eq!(undone, 4);
    assert_eq!(
        session.state().current_lesson.as_ref().expect("lesson").slides,
        lesson.slides
    );

    while session.redo().is_some() {}
    let state = session.state();
    assert_eq!(state.slide("s2").expect("s2").title, "Eruptions");
    assert!(state.slides().iter().all(|s| s.markup.contains("48px")));
}

/// Tests that an oversized batch result is applied, flagged, and un-flagged
/// by undo.
#[tokio::test]
async fn test_batch_edit_validation_errors_follow_history() {
    let client = FontDoublingClient::new(Duration::from_millis(5)).with_oversized("s2");
    let (session, orchestrator, _lesson) = setup(2, 1, client);

    let targets = targets_from_state(&session.state(), &[]);
    let batch_id = orchestrator
        .start_batch("expand everything", targets, BatchContext::default())
        .expect("batch starts");
    let progress = orchestrator.wait(batch_id).await.expect("progress");
    assert_eq!(progress.succeeded, 2);

    let key = error_key("s2", SlideField::Markup);
    assert_eq!(
        session.validation_errors().get(&key).map(String::as_str),
        Some("Markup must be at most 100 KB")
    );

    let undone = session.undo().expect("undo");
    assert_eq!(undone.scope.slide_id(), Some("s2"));
    assert!(session.validation_errors().is_empty());
}

/// Tests that closing the session clears the lesson and its history.
#[tokio::test]
async fn test_close_after_batch_clears_history() {
    let (session, orchestrator, _lesson) =
        setup(2, 2, FontDoublingClient::new(Duration::from_millis(5)));

    let targets = targets_from_state(&session.state(), &[]);
    let batch_id = orchestrator
        .start_batch("bigger", targets, BatchContext::default())
        .expect("batch starts");
    orchestrator.wait(batch_id).await.expect("progress");
    assert!(session.can_undo());

    let state = session.close();
    assert!(state.current_lesson.is_none());
    assert!(!session.can_undo());
    assert!(session.entries().is_empty());
}

// ============================================================================
// Cancellation Tests
// ============================================================================

/// Tests cancelling from an event observer: the in-flight response is
/// discarded and only the completed slide keeps its edit.
#[tokio::test]
async fn test_cancel_from_progress_observer() {
    let (session, orchestrator, lesson) =
        setup(4, 1, FontDoublingClient::new(Duration::from_millis(150)));
    let mut events = orchestrator.subscribe();

    let targets = targets_from_state(&session.state(), &[]);
    let batch_id = orchestrator
        .start_batch("double all title font sizes", targets, BatchContext::default())
        .expect("batch starts");

    let mut names = Vec::new();
    let mut cancelled = false;
    let final_progress = loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event in time")
            .expect("channel open");
        names.push(event.event_name());
        match event {
            BatchEvent::SlideProgress(_) if !cancelled => {
                assert!(orchestrator.cancel(batch_id));
                cancelled = true;
            }
            BatchEvent::BatchComplete(payload) => break payload.progress,
            _ => {}
        }
    };

    assert_eq!(
        names,
        [
            "batch_started",
            "slide_progress",
            "slide_progress",
            "slide_progress",
            "slide_progress",
            "batch_complete"
        ]
    );
    assert_eq!(final_progress.status, BatchStatus::Cancelled);
    assert_eq!(final_progress.succeeded, 1);
    assert_eq!(final_progress.cancelled, 3);
    assert_eq!(final_progress.state_of("s1"), Some(SlideEditState::Succeeded));

    // Let the discarded in-flight request finish.
    let progress = orchestrator.wait(batch_id).await.expect("progress");
    assert_eq!(progress.succeeded, 1);
    assert_eq!(progress.cancelled, 3);

    let state = session.state();
    assert!(state.slide("s1").expect("s1").markup.contains("48px"));
    for id in ["s2", "s3", "s4"] {
        assert_eq!(
            state.slide(id).expect("slide").markup,
            lesson.slide(id).expect("slide").markup
        );
    }
    assert_eq!(session.entries().len(), 1);
    assert!(!orchestrator.cancel(batch_id));
}
