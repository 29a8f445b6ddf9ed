//! Slide Edit CLI
//!
//! Applies one AI edit instruction to the slides of a lesson file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use slide_orchestrator::{
    targets_from_state, BatchContext, BatchEvent, BatchId, BatchOrchestrator, BatchProgress,
    EditorConfig, EditorSession, HttpEditClient, SlideEditState,
};
use slide_store::{Action, Lesson};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

/// Slide Edit - batch AI edits for lesson slides
///
/// Sends one instruction to the edit service for every selected slide,
/// applies the successful edits, and writes the edited lesson back out.
#[derive(Parser, Debug)]
#[command(name = "slide-edit")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the lesson JSON file
    #[arg(short, long, value_name = "FILE")]
    lesson: PathBuf,

    /// Edit instruction, e.g. "double all title font sizes"
    #[arg(short, long, value_name = "TEXT")]
    instruction: String,

    /// Comma-separated slide ids to edit (default: every slide)
    #[arg(short, long, value_name = "ID,...", value_delimiter = ',')]
    slides: Vec<String>,

    /// Path to configuration file (default: slide-editor.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Edit endpoint URL (overrides config)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Maximum edit requests in flight (overrides config)
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Where to write the edited lesson (default: <lesson>.edited.json)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(lesson = %args.lesson.display(), "Lesson file");
    tracing::debug!(config = ?args.config, "Config file");

    match run_batch_edit(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads the lesson, runs one batch, and writes the result.
///
/// Partial failure is reported but is not an error.
async fn run_batch_edit(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        config.edit_endpoint = endpoint;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    config.validate()?;
    print_config(&config);

    let lesson = load_lesson(&args.lesson)?;
    let context = BatchContext::from_lesson(&lesson);
    let session = EditorSession::from_config(&config);
    let state = session.load_lesson(lesson);
    if state.current_lesson.is_none() {
        anyhow::bail!(
            "Lesson '{}' could not be loaded: slide ids must be unique\n\nSuggestion: Give every slide a distinct id",
            args.lesson.display()
        );
    }

    let state = if args.slides.is_empty() {
        state
    } else {
        let selection = args.slides.iter().cloned().collect();
        session.store().dispatch(Action::SetSelection(selection))
    };
    for id in args.slides.iter().filter(|id| state.slide(id).is_none()) {
        tracing::warn!(slide_id = %id, "Unknown slide id, skipping");
    }
    // An unknown id leaves the selection empty; fall back to the known ones.
    let ids: Vec<String> = if state.selected_slide_ids.is_empty() {
        args.slides.clone()
    } else {
        state.selected_slide_ids.iter().cloned().collect()
    };
    let targets = targets_from_state(&state, &ids);

    let client = HttpEditClient::from_config(&config)?;
    let orchestrator = BatchOrchestrator::from_config(&config, session.clone(), Arc::new(client));
    let events = orchestrator.subscribe();

    let batch_id = orchestrator.start_batch(&args.instruction, targets, context)?;
    println!();
    println!("Batch {batch_id} started");

    let printer = tokio::spawn(print_events(events, batch_id));
    let progress = orchestrator
        .wait(batch_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("Batch {batch_id} disappeared before finishing"))?;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Progress printer stopped unexpectedly");
    }

    print_summary(&progress);

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.lesson));
    if let Some(lesson) = session.state().current_lesson.as_ref() {
        let json = serde_json::to_string_pretty(lesson)?;
        std::fs::write(&output, json).map_err(|e| {
            anyhow::anyhow!(
                "Failed to write edited lesson to '{}': {e}\n\nSuggestion: Check write permissions and available disk space",
                output.display()
            )
        })?;
        println!("Edited lesson written to {}", output.display());
    }

    Ok(())
}

/// Loads the configuration from `--config` or the current directory.
fn load_config(config_path: Option<&Path>) -> anyhow::Result<EditorConfig> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            EditorConfig::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => EditorConfig::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Reads a lesson from a JSON file.
fn load_lesson(path: &Path) -> anyhow::Result<Lesson> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read lesson '{}': {e}\n\nSuggestion: Check the --lesson path",
            path.display()
        )
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        anyhow::anyhow!(
            "Invalid lesson JSON in '{}': {e}\n\nSuggestion: Validate the lesson file with a JSON linter",
            path.display()
        )
    })
}

fn default_output_path(lesson: &Path) -> PathBuf {
    let stem = lesson
        .file_stem()
        .map_or_else(|| "lesson".to_string(), |s| s.to_string_lossy().to_string());
    lesson.with_file_name(format!("{stem}.edited.json"))
}

fn print_config(config: &EditorConfig) {
    println!("Configuration loaded:");
    println!("  Edit endpoint: {}", config.edit_endpoint);
    println!("  Max concurrency: {}", config.max_concurrency);
    println!("  Request timeout: {}s", config.request_timeout_secs);
}

/// Prints events for one batch until it completes.
async fn print_events(mut events: broadcast::Receiver<BatchEvent>, batch_id: BatchId) {
    loop {
        match events.recv().await {
            Ok(event) if event.batch_id() != batch_id => {}
            Ok(BatchEvent::SlideProgress(payload)) => {
                let slide = &payload.slide;
                let done = payload.progress.total - payload.progress.pending;
                match (slide.state, slide.error.as_deref()) {
                    (SlideEditState::Failed, Some(error)) => println!(
                        "  [{done}/{}] {}: failed ({error})",
                        payload.progress.total, slide.slide_id
                    ),
                    (state, _) => println!(
                        "  [{done}/{}] {}: {state}",
                        payload.progress.total, slide.slide_id
                    ),
                }
            }
            Ok(BatchEvent::BatchComplete(_)) | Err(RecvError::Closed) => break,
            Ok(BatchEvent::BatchStarted(_)) => {}
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Progress output fell behind");
            }
        }
    }
}

fn print_summary(progress: &BatchProgress) {
    println!();
    println!("=== Batch Edit Summary ===");
    println!("Status: {}", progress.status);
    println!("Succeeded: {}", progress.succeeded);
    println!("Failed: {}", progress.failed);
    if progress.cancelled > 0 {
        println!("Cancelled: {}", progress.cancelled);
    }
    let failed = progress.failed_slide_ids();
    if !failed.is_empty() {
        println!("Retry with: --slides {}", failed.join(","));
    }
}
