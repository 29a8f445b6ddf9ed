//! Integration tests for batch edits over HTTP.
//!
//! These tests run a mock AI-edit endpoint on a local port and drive the
//! real `HttpEditClient` through the orchestrator.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use slide_orchestrator::{
    targets_from_state, BatchContext, BatchOrchestrator, BatchStatus, EditFailureKind,
    EditorConfig, EditorSession, HttpEditClient, SlideEditClient, SlideEditRequest,
    SlideEditState,
};
use slide_store::{Lesson, Slide};

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Counters shared with the mock endpoint.
#[derive(Default)]
struct MockEndpoint {
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Behaves according to the slide id:
/// - `rate-limited`: success=false with "rate limited"
/// - `overloaded`: HTTP 500 with an error body
/// - `throttled`: HTTP 429
/// - `slow`: sleeps past the client timeout
/// - `fenced`: markup wrapped in a code fence
/// - `garbage`: a body that is not JSON
/// - anything else: wraps the current markup
async fn edit_handler(
    State(mock): State<Arc<MockEndpoint>>,
    Json(request): Json<SlideEditRequest>,
) -> Response {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    let now = mock.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    mock.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let response = match request.slide_id.as_str() {
        "rate-limited" => Json(serde_json::json!({
            "success": false,
            "elapsedMs": 5,
            "error": "rate limited"
        }))
        .into_response(),
        "overloaded" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"success": false, "error": "model overloaded"})),
        )
            .into_response(),
        "throttled" => StatusCode::TOO_MANY_REQUESTS.into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            StatusCode::OK.into_response()
        }
        "fenced" => Json(serde_json::json!({
            "success": true,
            "editedMarkup": "```html\n<h1>Fenced</h1>\n```",
            "elapsedMs": 5
        }))
        .into_response(),
        "garbage" => "definitely not json".into_response(),
        _ => Json(serde_json::json!({
            "success": true,
            "editedMarkup": format!(
                "<div data-instruction=\"{}\" data-topic=\"{}\">{}</div>",
                request.instruction, request.topic, request.current_markup
            ),
            "elapsedMs": 12
        }))
        .into_response(),
    };

    mock.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

/// Spawns the mock endpoint and returns its URL.
async fn spawn_mock_endpoint() -> (String, Arc<MockEndpoint>, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let url = format!("http://{addr}/api/slides/edit");

    let mock = Arc::new(MockEndpoint::default());
    let router = Router::new()
        .route("/api/slides/edit", post(edit_handler))
        .with_state(Arc::clone(&mock));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (url, mock, handle)
}

fn config_for(url: &str, max_concurrency: usize) -> EditorConfig {
    EditorConfig {
        edit_endpoint: url.to_string(),
        max_concurrency,
        request_timeout_secs: 1,
        ..EditorConfig::default()
    }
}

fn lesson(ids: &[&str]) -> Lesson {
    Lesson::new("lesson-http", "Rivers")
        .with_subject("Geography")
        .with_age_group("8-10")
        .with_slides(ids.iter().map(|id| {
            Slide::new(*id, format!("Slide {id}")).with_markup(format!("<p>{id}</p>"))
        }))
}

fn request(slide_id: &str) -> SlideEditRequest {
    SlideEditRequest {
        slide_id: slide_id.to_string(),
        current_markup: "<p>x</p>".to_string(),
        instruction: "bigger".to_string(),
        topic: "Rivers".to_string(),
        age_group: "8-10".to_string(),
        batch_id: slide_orchestrator::BatchId::new(),
        index_in_batch: 0,
    }
}

// ============================================================================
// Client Tests
// ============================================================================

/// Tests that a successful edit round-trips through the HTTP client.
#[tokio::test]
async fn test_client_success() {
    let (url, _mock, _handle) = spawn_mock_endpoint().await;
    let client = HttpEditClient::from_config(&config_for(&url, 1)).expect("client");

    let response = client.edit_slide(request("s1")).await.expect("edit");
    assert!(response.success);
    assert_eq!(response.elapsed_ms, 12);
    let markup = response.into_markup().expect("markup");
    assert!(markup.contains("data-instruction=\"bigger\""));
    assert!(markup.contains("<p>x</p>"));
}

/// Tests how transport and endpoint failures are classified.
#[tokio::test]
async fn test_client_failure_classification() {
    let (url, _mock, _handle) = spawn_mock_endpoint().await;
    let client = HttpEditClient::from_config(&config_for(&url, 1)).expect("client");

    let failure = client.edit_slide(request("overloaded")).await.unwrap_err();
    assert_eq!(failure.kind, EditFailureKind::Endpoint);
    assert_eq!(failure.message, "model overloaded");

    let failure = client.edit_slide(request("throttled")).await.unwrap_err();
    assert_eq!(failure.kind, EditFailureKind::RateLimit);

    let failure = client.edit_slide(request("slow")).await.unwrap_err();
    assert_eq!(failure.kind, EditFailureKind::Timeout);

    let failure = client.edit_slide(request("garbage")).await.unwrap_err();
    assert_eq!(failure.kind, EditFailureKind::MalformedResponse);

    let failure = client
        .edit_slide(request("rate-limited"))
        .await
        .expect("well-formed body")
        .into_markup()
        .unwrap_err();
    assert_eq!(failure.kind, EditFailureKind::RateLimit);
}

// ============================================================================
// Batch Tests
// ============================================================================

/// Tests a mixed batch end to end: successes land, failures are recorded.
#[tokio::test]
async fn test_batch_over_http_with_partial_failure() {
    let (url, mock, _handle) = spawn_mock_endpoint().await;
    let config = config_for(&url, 2);
    let session = EditorSession::from_config(&config);
    let lesson = lesson(&["intro", "rate-limited", "fenced", "garbage", "outro"]);
    let context = BatchContext::from_lesson(&lesson);
    session.load_lesson(lesson);

    let client = HttpEditClient::from_config(&config).expect("client");
    let orchestrator = BatchOrchestrator::from_config(&config, session.clone(), Arc::new(client));
    let targets = targets_from_state(&session.state(), &[]);

    let batch_id = orchestrator
        .start_batch("double all title font sizes", targets, context)
        .expect("batch starts");
    let progress = orchestrator.wait(batch_id).await.expect("progress");

    assert_eq!(progress.status, BatchStatus::CompletedWithErrors);
    assert_eq!(progress.succeeded, 3);
    assert_eq!(progress.failed, 2);
    assert_eq!(mock.requests.load(Ordering::SeqCst), 5);
    assert!(mock.max_in_flight.load(Ordering::SeqCst) <= 2);

    let state = session.state();
    let intro = &state.slide("intro").expect("intro").markup;
    assert!(intro.contains("data-topic=\"Geography\""));
    assert_eq!(state.slide("fenced").expect("fenced").markup, "<h1>Fenced</h1>");
    assert_eq!(state.slide("garbage").expect("garbage").markup, "<p>garbage</p>");
    assert_eq!(
        state.slide("rate-limited").expect("slide").markup,
        "<p>rate-limited</p>"
    );

    assert_eq!(progress.state_of("garbage"), Some(SlideEditState::Failed));
    assert_eq!(session.entries().len(), 3);
}

/// Tests that an unreachable endpoint fails every slide without aborting.
#[tokio::test]
async fn test_batch_with_unreachable_endpoint() {
    let url = format!("http://127.0.0.1:{}/edit", find_available_port());
    let config = config_for(&url, 3);
    let session = EditorSession::from_config(&config);
    session.load_lesson(lesson(&["a", "b"]));

    let client = HttpEditClient::from_config(&config).expect("client");
    let orchestrator = BatchOrchestrator::from_config(&config, session.clone(), Arc::new(client));
    let batch_id = orchestrator
        .start_batch(
            "bigger",
            targets_from_state(&session.state(), &[]),
            BatchContext::default(),
        )
        .expect("batch starts");
    let progress = orchestrator.wait(batch_id).await.expect("progress");

    assert_eq!(progress.failed, 2);
    assert!(progress.slides.iter().all(|r| matches!(
        r.failure_kind,
        Some(EditFailureKind::Network | EditFailureKind::Timeout)
    )));
    assert!(!session.can_undo());
}
