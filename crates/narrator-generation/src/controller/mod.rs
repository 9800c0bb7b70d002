//! Sequential generation controller.
//!
//! The controller owns the generation work for one fixed paragraph list. It
//! runs at most one request at a time, walking upward through a moving
//! `[lower, upper]` range and reporting results through a
//! [`GenerationListener`].
//!
//! # Concurrency Model
//!
//! - At most one runner task per epoch; `running` guards against a second
//! - `std::sync::Mutex` around all state, never held across an `.await`
//! - Epochs prevent stale commits after `stop`/`reset`
//! - Listener callbacks are invoked outside the lock

mod state;
mod worker;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use narrator_core::{
    BufferPolicy, BufferStatus, GenerationBackend, GenerationError, GenerationListener,
    GenerationParams, GenerationRetryPolicy, LocatorCache, NoopLocatorCache, ParagraphIndex,
    Paragraphs, ResourceLocator,
};

use crate::error::ControllerError;

use state::{ControllerState, Epoch};
use worker::{GenerationJob, JobOutcome, WorkerDeps};

struct Inner {
    deps: WorkerDeps,
    state: Mutex<ControllerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rate-limited, strictly ordered paragraph generation.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct GenerationController {
    inner: Arc<Inner>,
}

impl GenerationController {
    /// Controller with no cache and the default retry policy.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self::with_deps(
            backend,
            Arc::new(NoopLocatorCache),
            GenerationRetryPolicy::default(),
        )
    }

    /// Controller with an explicit cache and retry policy.
    pub fn with_deps(
        backend: Arc<dyn GenerationBackend>,
        cache: Arc<dyn LocatorCache>,
        retry: GenerationRetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps: WorkerDeps {
                    backend,
                    cache,
                    retry,
                },
                state: Mutex::new(ControllerState::new()),
            }),
        }
    }

    /// Load a paragraph list, discarding everything from the previous session.
    pub fn initialize(&self, paragraphs: Paragraphs, params: GenerationParams) {
        let mut state = self.inner.lock();
        state.halt();
        state.clear_results();
        tracing::debug!(
            target: "narrator.generation",
            paragraphs = paragraphs.len(),
            voice = %params.voice,
            "Controller initialized"
        );
        state.paragraphs = paragraphs;
        state.params = params;
    }

    /// Begin generating `[start, end]`, or widen the active loop.
    ///
    /// `end` is clamped to the last paragraph. If a loop is already running
    /// and not paused only the upper bound moves; a second loop is never
    /// started.
    pub fn generate_range(
        &self,
        start: ParagraphIndex,
        end: ParagraphIndex,
        listener: Arc<dyn GenerationListener>,
    ) -> Result<(), ControllerError> {
        let mut state = self.inner.lock();
        let total = state.paragraphs.len();
        let Some(end) = state.clamp(end) else {
            return Err(ControllerError::NoParagraphs);
        };
        if start >= total {
            return Err(ControllerError::OutOfRange {
                index: start,
                total,
            });
        }
        if start > end {
            return Err(ControllerError::InvalidRange { start, end });
        }

        state.listener = Some(listener);

        if state.running && !state.paused {
            let upper = state.upper.map_or(end, |u| u.max(end));
            tracing::debug!(
                target: "narrator.generation",
                start,
                upper,
                "Loop active, raising upper bound"
            );
            state.upper = Some(upper);
            return Ok(());
        }

        let upper = if state.running {
            state.upper.map_or(end, |u| u.max(end))
        } else {
            end
        };
        state.paused = false;
        state.lower = start;
        state.upper = Some(upper);

        tracing::debug!(
            target: "narrator.generation",
            start,
            end = upper,
            "Generating range"
        );

        if !state.running {
            self.spawn_runner(&mut state);
        }
        Ok(())
    }

    /// Raise the upper bound of the active range.
    ///
    /// A bound at or below the current one is ignored. A drained loop is
    /// restarted when the wider range holds new work.
    pub fn extend_range(&self, new_end: ParagraphIndex) {
        let mut state = self.inner.lock();
        let Some(new_end) = state.clamp(new_end) else {
            return;
        };
        let Some(upper) = state.upper else {
            tracing::debug!(
                target: "narrator.generation",
                new_end,
                "No active range to extend"
            );
            return;
        };
        if new_end <= upper {
            return;
        }

        state.upper = Some(new_end);
        tracing::debug!(
            target: "narrator.generation",
            old = upper,
            new = new_end,
            "Range extended"
        );

        if !state.running && !state.paused && state.next_pending().is_some() {
            self.spawn_runner(&mut state);
        }
    }

    /// Let the in-flight request finish but start no new one.
    pub fn pause(&self) {
        let mut state = self.inner.lock();
        if !state.paused {
            state.paused = true;
            tracing::debug!(target: "narrator.generation", "Generation paused");
        }
    }

    /// Continue from the first ungenerated index at or after the playback
    /// position.
    pub fn resume(&self) {
        let mut state = self.inner.lock();
        if !state.paused {
            return;
        }
        state.paused = false;
        state.lower = state.playback_position;
        tracing::debug!(
            target: "narrator.generation",
            from = state.lower,
            "Generation resumed"
        );

        if !state.running && state.listener.is_some() && state.next_pending().is_some() {
            self.spawn_runner(&mut state);
        }
    }

    /// Cancel the in-flight request and halt the loop. Generated results
    /// are kept.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        state.halt();
        tracing::debug!(target: "narrator.generation", "Generation stopped");
    }

    /// Stop and forget every generated result, skip and retry counter.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.halt();
        state.clear_results();
        tracing::debug!(target: "narrator.generation", "Generation reset");
    }

    /// Record where the listener is. Does not reorder generation.
    pub fn update_playback_position(&self, index: ParagraphIndex) {
        self.inner.lock().playback_position = index;
    }

    /// Whether a paragraph has a playable locator.
    pub fn is_ready(&self, index: ParagraphIndex) -> bool {
        self.inner.lock().is_ready(index)
    }

    /// Locator for a generated paragraph.
    pub fn url(&self, index: ParagraphIndex) -> Option<ResourceLocator> {
        self.inner.lock().generated.get(&index).cloned()
    }

    /// Every generated locator, by index.
    pub fn all_urls(&self) -> BTreeMap<ParagraphIndex, ResourceLocator> {
        self.inner.lock().generated.clone()
    }

    /// Contiguous generated paragraphs after `current`.
    pub fn buffer_ahead(&self, current: ParagraphIndex) -> usize {
        self.inner.lock().buffer_ahead(current)
    }

    /// Whether a request is in flight.
    pub fn is_generating(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// Index of the in-flight request.
    pub fn generating_index(&self) -> Option<ParagraphIndex> {
        self.inner.lock().in_flight
    }

    /// Paragraphs permanently skipped this session.
    pub fn skipped(&self) -> BTreeSet<ParagraphIndex> {
        self.inner.lock().skipped.clone()
    }

    /// Failed attempts recorded for a paragraph that has not yet succeeded.
    pub fn retry_count(&self, index: ParagraphIndex) -> u32 {
        self.inner
            .lock()
            .retry_counts
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    /// Number of paragraphs in the session.
    pub fn len(&self) -> usize {
        self.inner.lock().paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether playback may proceed at `current` under `policy`.
    pub fn is_sufficient(&self, policy: &BufferPolicy, current: ParagraphIndex) -> bool {
        let state = self.inner.lock();
        policy.is_sufficient(current, state.paragraphs.len(), |i| state.is_ready(i))
    }

    /// Snapshot of generation progress relative to `current`.
    pub fn buffer_status(&self, current: ParagraphIndex, target_buffer: usize) -> BufferStatus {
        let state = self.inner.lock();
        BufferStatus {
            generated: state.generated.keys().copied().collect(),
            buffer_size: state.buffer_ahead(current),
            target_buffer,
            is_generating: state.in_flight.is_some(),
            generating_index: state.in_flight,
        }
    }

    /// Probe the backend.
    pub async fn check_connection(&self) -> Result<(), GenerationError> {
        self.inner.deps.backend.check_connection().await
    }

    fn spawn_runner(&self, state: &mut ControllerState) {
        state.running = true;
        let epoch = state.epoch;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(run(inner, epoch));
    }
}

/// The generation loop for one epoch.
async fn run(inner: Arc<Inner>, epoch: Epoch) {
    tracing::debug!(
        target: "narrator.generation",
        epoch = epoch.0,
        "Generation runner started"
    );

    loop {
        let job = {
            let mut state = inner.lock();
            if state.epoch != epoch {
                return;
            }
            if state.paused {
                state.running = false;
                tracing::debug!(target: "narrator.generation", "Runner parked while paused");
                return;
            }
            let Some(index) = state.next_pending() else {
                state.running = false;
                let listener = state.listener.clone();
                drop(state);
                tracing::debug!(target: "narrator.generation", "Range complete");
                if let Some(listener) = listener {
                    listener.on_complete();
                }
                return;
            };
            let Some(text) = state.paragraphs.get(index).map(str::to_owned) else {
                state.running = false;
                return;
            };
            state.in_flight = Some(index);
            GenerationJob {
                index,
                text,
                params: state.params.clone(),
                cancel: state.cancel.clone(),
            }
        };

        tracing::debug!(
            target: "narrator.generation",
            index = job.index,
            "Generating paragraph"
        );

        let outcome = worker::run_job(&job, &inner.deps, |failed| {
            let mut state = inner.lock();
            if state.epoch == epoch {
                state.retry_counts.insert(job.index, failed);
            }
        })
        .await;

        let listener = {
            let mut state = inner.lock();
            if state.epoch != epoch {
                tracing::debug!(
                    target: "narrator.generation",
                    index = job.index,
                    "Ignoring stale result (epoch mismatch)"
                );
                return;
            }
            state.in_flight = None;
            match &outcome {
                JobOutcome::Generated { locator, .. } => {
                    state.generated.insert(job.index, locator.clone());
                    state.retry_counts.remove(&job.index);
                }
                JobOutcome::Exhausted(_) => {
                    state.skipped.insert(job.index);
                    if state.lower == job.index {
                        state.lower += 1;
                    }
                }
                JobOutcome::Cancelled => {
                    state.running = false;
                    return;
                }
            }
            state.listener.clone()
        };

        let Some(listener) = listener else {
            continue;
        };
        match outcome {
            JobOutcome::Generated { locator, cached } => {
                tracing::debug!(
                    target: "narrator.generation",
                    index = job.index,
                    cached,
                    "Paragraph generated"
                );
                listener.on_progress(job.index, &locator);
            }
            JobOutcome::Exhausted(error) => listener.on_error(job.index, &error),
            JobOutcome::Cancelled => {}
        }
    }
}
