//! Batch edit fan-out.
//!
//! [`BatchOrchestrator::start_batch`] validates its input, registers a
//! [`BatchJob`], and spawns one task per batch. That task drives a bounded
//! pool over the targets in order: at most `max_concurrency` requests are in
//! flight and each vacated slot goes to the next queued slide.
//!
//! Completions are handled one at a time inside the batch task. Applying a
//! success takes the session writer lock first and the job table lock second;
//! [`BatchOrchestrator::cancel`] takes them in the same order, so a response
//! either lands before the cancel or is discarded after it. The job table is
//! never locked while the store notifies, so store listeners may read
//! [`BatchOrchestrator::progress`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::batch::{first_duplicate, BatchId, BatchJob, BatchProgress};
use crate::client::{SlideEditClient, SlideEditRequest, SlideEditResponse};
use crate::config::EditorConfig;
use crate::error::{EditFailure, EditorError, Result};
use crate::events::{BatchEvent, ProgressBroadcaster};
use crate::session::EditorSession;
use crate::target::{BatchContext, SlideTarget};

type JobTable = Arc<Mutex<HashMap<BatchId, BatchJob>>>;

/// Completion of a spawned batch task; any number of waiters may await it.
type BatchTask = Shared<BoxFuture<'static, ()>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// BatchOrchestrator
// ============================================================================

/// Runs batch edits against an [`EditorSession`].
#[derive(Clone)]
pub struct BatchOrchestrator {
    session: EditorSession,
    client: Arc<dyn SlideEditClient>,
    max_concurrency: usize,
    jobs: JobTable,
    tasks: Arc<Mutex<HashMap<BatchId, BatchTask>>>,
    broadcaster: ProgressBroadcaster,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("max_concurrency", &self.max_concurrency)
            .field("jobs", &lock(&self.jobs).len())
            .finish_non_exhaustive()
    }
}

impl BatchOrchestrator {
    /// Creates an orchestrator allowing `max_concurrency` requests in flight
    /// per batch (minimum 1).
    #[must_use]
    pub fn new(
        session: EditorSession,
        client: Arc<dyn SlideEditClient>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            session,
            client,
            max_concurrency: max_concurrency.max(1),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            broadcaster: ProgressBroadcaster::default(),
        }
    }

    /// Creates an orchestrator using the concurrency and buffer settings of
    /// `config`.
    #[must_use]
    pub fn from_config(
        config: &EditorConfig,
        session: EditorSession,
        client: Arc<dyn SlideEditClient>,
    ) -> Self {
        let mut orchestrator = Self::new(session, client, config.max_concurrency);
        orchestrator.broadcaster = ProgressBroadcaster::new(config.progress_buffer_size);
        orchestrator
    }

    /// Returns the session edits are applied to.
    #[must_use]
    pub const fn session(&self) -> &EditorSession {
        &self.session
    }

    /// Returns the per-batch concurrency limit.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Subscribes to progress events for every batch.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.broadcaster.subscribe()
    }

    /// Starts applying `instruction` to every target and returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `EmptyInstruction`, `NoTargetSlides`, or `DuplicateTarget`
    /// without starting any slide work.
    pub fn start_batch(
        &self,
        instruction: &str,
        targets: Vec<SlideTarget>,
        context: BatchContext,
    ) -> Result<BatchId> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(EditorError::EmptyInstruction);
        }
        if targets.is_empty() {
            return Err(EditorError::NoTargetSlides);
        }
        if let Some(slide_id) = first_duplicate(targets.iter().map(|t| t.slide_id.as_str())) {
            return Err(EditorError::duplicate_target(slide_id));
        }

        let id = BatchId::new();
        let slide_ids: Vec<String> = targets.iter().map(|t| t.slide_id.clone()).collect();
        lock(&self.jobs).insert(id, BatchJob::new(id, instruction, slide_ids.clone()));

        info!(
            batch_id = %id,
            slides = slide_ids.len(),
            max_concurrency = self.max_concurrency,
            "Starting batch edit"
        );
        self.broadcaster.send(BatchEvent::batch_started(
            id,
            instruction,
            slide_ids,
            self.max_concurrency,
        ));

        let run = Arc::new(BatchRun {
            id,
            instruction: instruction.to_string(),
            context,
            session: self.session.clone(),
            client: Arc::clone(&self.client),
            jobs: Arc::clone(&self.jobs),
            broadcaster: self.broadcaster.clone(),
        });
        let max_concurrency = self.max_concurrency;
        let task = tokio::spawn(async move { run.execute(targets, max_concurrency).await })
            .map(move |joined| {
                if let Err(e) = joined {
                    warn!(batch_id = %id, error = %e, "Batch task ended abnormally");
                }
            })
            .boxed()
            .shared();
        lock(&self.tasks).insert(id, task);

        Ok(id)
    }

    /// Returns a snapshot of a batch, until it is discarded.
    #[must_use]
    pub fn progress(&self, batch_id: BatchId) -> Option<BatchProgress> {
        lock(&self.jobs).get(&batch_id).map(BatchJob::progress)
    }

    /// Cancels every pending slide of a batch.
    ///
    /// Edits already applied stay applied. Responses arriving afterwards are
    /// discarded. Returns `false` if the batch is unknown or already finished.
    ///
    /// Waits for any edit being applied, so it must not be called
    /// synchronously from a store listener.
    pub fn cancel(&self, batch_id: BatchId) -> bool {
        let writer = self.session.lock_writer();
        let events = {
            let mut jobs = lock(&self.jobs);
            let Some(job) = jobs.get_mut(&batch_id) else {
                return false;
            };
            if job.progress().is_finished() {
                return false;
            }

            let cancelled = job.cancel();
            info!(batch_id = %batch_id, cancelled = cancelled.len(), "Batch edit cancelled");

            let progress = job.progress();
            let mut events: Vec<BatchEvent> = cancelled
                .iter()
                .filter_map(|slide_id| job.record(slide_id).cloned())
                .map(|record| BatchEvent::slide_progress(record, progress.clone()))
                .collect();
            events.push(BatchEvent::batch_complete(progress));
            events
        };
        drop(writer);

        for event in events {
            self.broadcaster.send(event);
        }
        true
    }

    /// Waits for the batch task to end and returns the final snapshot.
    ///
    /// Several callers may wait on the same batch; each sees the finished
    /// snapshot. Returns `None` if the batch is unknown or was discarded.
    pub async fn wait(&self, batch_id: BatchId) -> Option<BatchProgress> {
        let task = lock(&self.tasks).get(&batch_id).cloned();
        if let Some(task) = task {
            task.await;
        }
        self.progress(batch_id)
    }

    /// Drops a finished batch. Returns `false` if the batch is unknown or
    /// still has pending slides.
    pub fn discard(&self, batch_id: BatchId) -> bool {
        let mut jobs = lock(&self.jobs);
        let finished = jobs
            .get(&batch_id)
            .is_some_and(|job| job.progress().is_finished());
        if finished {
            jobs.remove(&batch_id);
            lock(&self.tasks).remove(&batch_id);
            debug!(batch_id = %batch_id, "Discarded batch");
        }
        finished
    }
}

// ============================================================================
// BatchRun
// ============================================================================

/// Everything one spawned batch task needs.
struct BatchRun {
    id: BatchId,
    instruction: String,
    context: BatchContext,
    session: EditorSession,
    client: Arc<dyn SlideEditClient>,
    jobs: JobTable,
    broadcaster: ProgressBroadcaster,
}

/// Result of one slide's request.
enum SlideOutcome {
    /// The slide was no longer live when its turn came.
    Skipped,
    /// The endpoint was called.
    Finished {
        slide_id: String,
        result: std::result::Result<String, EditFailure>,
        elapsed_ms: u64,
        endpoint_elapsed_ms: Option<u64>,
    },
}

impl BatchRun {
    async fn execute(self: Arc<Self>, targets: Vec<SlideTarget>, max_concurrency: usize) {
        stream::iter(targets.into_iter().enumerate())
            .map(|(index, target)| {
                let run = Arc::clone(&self);
                async move { run.edit_one(index, target).await }
            })
            .buffer_unordered(max_concurrency)
            .for_each(|outcome| {
                self.complete(outcome);
                futures::future::ready(())
            })
            .await;
        self.finish();
    }

    fn is_live(&self, slide_id: &str) -> bool {
        lock(&self.jobs)
            .get(&self.id)
            .is_some_and(|job| job.is_live(slide_id))
    }

    async fn edit_one(&self, index: usize, target: SlideTarget) -> SlideOutcome {
        if !self.is_live(&target.slide_id) {
            debug!(
                batch_id = %self.id,
                slide_id = %target.slide_id,
                "Skipping slide, batch cancelled"
            );
            return SlideOutcome::Skipped;
        }

        let request = SlideEditRequest {
            slide_id: target.slide_id.clone(),
            current_markup: target.markup,
            instruction: self.instruction.clone(),
            topic: self.context.topic.clone(),
            age_group: self.context.age_group.clone(),
            batch_id: self.id,
            index_in_batch: index,
        };
        debug!(batch_id = %self.id, slide_id = %target.slide_id, index, "Submitting slide edit");

        let started = Instant::now();
        let response = self.client.edit_slide(request).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let endpoint_elapsed_ms = response.as_ref().ok().map(|r| r.elapsed_ms);

        SlideOutcome::Finished {
            slide_id: target.slide_id,
            result: response.and_then(SlideEditResponse::into_markup),
            elapsed_ms,
            endpoint_elapsed_ms,
        }
    }

    fn complete(&self, outcome: SlideOutcome) {
        let SlideOutcome::Finished {
            slide_id,
            result,
            elapsed_ms,
            endpoint_elapsed_ms,
        } = outcome
        else {
            return;
        };

        let writer = self.session.lock_writer();
        if !self.is_live(&slide_id) {
            debug!(batch_id = %self.id, slide_id = %slide_id, "Discarding late response");
            return;
        }

        let applied = result.and_then(|markup| {
            self.session.apply_batch_edit_locked(&writer, self.id, &slide_id, &markup)
        });

        let event = {
            let mut jobs = lock(&self.jobs);
            let Some(job) = jobs.get_mut(&self.id) else {
                return;
            };
            let Some(record) = job.record_mut(&slide_id) else {
                return;
            };
            let recorded = match &applied {
                Ok(()) => record.succeed(elapsed_ms),
                Err(failure) => record.fail(failure, Some(elapsed_ms)),
            };
            if recorded {
                record.endpoint_elapsed_ms = endpoint_elapsed_ms;
            }
            let record = record.clone();
            job.mark_finished_if_done();
            BatchEvent::slide_progress(record, job.progress())
        };
        drop(writer);

        match &applied {
            Ok(()) => debug!(
                batch_id = %self.id,
                slide_id = %slide_id,
                elapsed_ms,
                "Slide edit applied"
            ),
            Err(failure) => warn!(
                batch_id = %self.id,
                slide_id = %slide_id,
                kind = %failure.kind,
                error = %failure.message,
                "Slide edit failed"
            ),
        }
        self.broadcaster.send(event);
    }

    fn finish(&self) {
        let progress = {
            let mut jobs = lock(&self.jobs);
            let Some(job) = jobs.get_mut(&self.id) else {
                return;
            };
            // A cancelled batch was announced complete by `cancel`.
            if job.cancel_requested {
                return;
            }
            job.mark_finished_if_done();
            job.progress()
        };

        info!(
            batch_id = %self.id,
            status = %progress.status,
            succeeded = progress.succeeded,
            failed = progress.failed,
            "Batch edit finished"
        );
        self.broadcaster.send(BatchEvent::batch_complete(progress));
    }
}
