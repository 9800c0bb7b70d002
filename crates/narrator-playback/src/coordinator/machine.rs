//! The buffered playback state machine.
//!
//! `Machine` is synchronous: every transition runs to completion on the
//! coordinator task. Asynchronous work (generation, audio loading) happens
//! elsewhere and comes back as events carrying the paragraph index, which
//! is always checked against the controller's authoritative state before
//! being acted on.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use narrator_core::{
    AudioSettings, BufferPolicy, BufferStatus, BufferedPlaybackConfig, BufferedPlaybackState,
    GenerationEvent, GenerationListener, GenerationParams, ParagraphIndex, Paragraphs,
    PlaybackEvent, PlaybackStatus,
};
use narrator_generation::GenerationController;

use crate::bookmark::BookmarkThrottle;
use crate::element::ElementEvent;
use crate::engine::{AudioEvent, AudioPlaybackEngine};
use crate::error::{CoordinatorError, PlaybackError};
use crate::platform::PlatformAdapter;

pub(crate) struct Machine {
    controller: GenerationController,
    engine: AudioPlaybackEngine,
    platform: Arc<dyn PlatformAdapter>,
    config: BufferedPlaybackConfig,

    paragraphs: Paragraphs,
    params: Option<GenerationParams>,

    state: BufferedPlaybackState,
    /// Paragraph the engine accepted a `play` for. Prevents a second `play`
    /// for the same paragraph; cleared on failure so a retry can go through.
    play_started: Option<ParagraphIndex>,
    /// Status to return to from `Paused`.
    paused_from: Option<PlaybackStatus>,
    /// Current paragraph finished while paused; `resume` advances past it.
    ended_while_paused: Option<ParagraphIndex>,
    hidden: bool,

    listener: Arc<dyn GenerationListener>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    state_tx: watch::Sender<BufferedPlaybackState>,

    bookmark: BookmarkThrottle,
    bookmark_due: Option<ParagraphIndex>,
}

impl Machine {
    pub(crate) fn new(
        controller: GenerationController,
        engine: AudioPlaybackEngine,
        platform: Arc<dyn PlatformAdapter>,
        config: BufferedPlaybackConfig,
        generation_tx: mpsc::UnboundedSender<GenerationEvent>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
        state_tx: watch::Sender<BufferedPlaybackState>,
    ) -> Self {
        Self {
            controller,
            engine,
            platform,
            state: BufferedPlaybackState::idle(config.target_buffer_size),
            config,
            paragraphs: Paragraphs::default(),
            params: None,
            play_started: None,
            paused_from: None,
            ended_while_paused: None,
            hidden: false,
            listener: Arc::new(generation_tx),
            events,
            state_tx,
            bookmark: BookmarkThrottle::default(),
            bookmark_due: None,
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    pub(crate) const fn config(&self) -> BufferedPlaybackConfig {
        self.config
    }

    fn policy(&self) -> BufferPolicy {
        BufferPolicy::from_config(&self.config)
    }

    fn total(&self) -> usize {
        self.paragraphs.len()
    }

    fn range_end(&self, from: ParagraphIndex) -> ParagraphIndex {
        self.policy().range_end(from, self.total())
    }

    // ── Session lifecycle ──────────────────────────────────────────

    /// Load paragraphs and generation parameters.
    ///
    /// Unchanged paragraphs and parameters keep the current session; any
    /// change stops playback and discards all generated audio.
    pub(crate) fn load_session(
        &mut self,
        paragraphs: Paragraphs,
        params: GenerationParams,
    ) -> Result<(), CoordinatorError> {
        if paragraphs.is_empty() {
            return Err(CoordinatorError::NoParagraphs);
        }
        let unchanged = self.paragraphs == paragraphs
            && self
                .params
                .as_ref()
                .is_some_and(|p| p.fingerprint() == params.fingerprint());
        if unchanged {
            tracing::debug!(target: "narrator.coordinator", "Session unchanged, keeping state");
            return Ok(());
        }

        self.stop();
        self.bookmark.reset();
        tracing::info!(
            target: "narrator.coordinator",
            paragraphs = paragraphs.len(),
            voice = %params.voice,
            "Session loaded"
        );
        self.controller.initialize(paragraphs.clone(), params.clone());
        self.paragraphs = paragraphs;
        self.params = Some(params);
        Ok(())
    }

    /// Start a session at `from`.
    ///
    /// An active session is stopped first.
    pub(crate) fn start(&mut self, from: ParagraphIndex) -> Result<(), CoordinatorError> {
        self.check_index(from)?;
        self.platform.prime()?;

        if self.state.status != PlaybackStatus::Idle {
            self.stop();
        }

        self.controller.reset();
        self.play_started = None;
        self.paused_from = None;
        self.ended_while_paused = None;
        self.state = BufferedPlaybackState {
            status: PlaybackStatus::InitialBuffering,
            current_paragraph: from,
            buffer_status: BufferStatus::empty(self.config.target_buffer_size),
            error: None,
        };
        tracing::info!(target: "narrator.coordinator", from, "Starting playback");

        self.controller.update_playback_position(from);
        self.controller
            .generate_range(from, self.range_end(from), Arc::clone(&self.listener))
            .map_err(|_| CoordinatorError::InvalidIndex {
                index: from,
                total: self.total(),
            })?;
        if self.hidden {
            self.controller.pause();
        }
        self.record_bookmark(from);
        self.emit_status();
        Ok(())
    }

    /// Reset to idle unconditionally.
    pub(crate) fn stop(&mut self) {
        let was = self.state.status;
        self.engine.stop();
        self.controller.stop();
        if was.is_active() {
            self.flush_bookmark();
        }
        self.play_started = None;
        self.paused_from = None;
        self.ended_while_paused = None;
        self.state = BufferedPlaybackState::idle(self.config.target_buffer_size);
        if was != PlaybackStatus::Idle {
            tracing::info!(target: "narrator.coordinator", "Playback stopped");
            self.emit_status();
        }
    }

    pub(crate) fn pause(&mut self) {
        let status = self.state.status;
        if !status.is_active() || status == PlaybackStatus::Paused {
            return;
        }
        self.engine.pause();
        self.controller.pause();
        self.paused_from = Some(status);
        self.state.status = PlaybackStatus::Paused;
        self.flush_bookmark();
        self.emit_status();
    }

    pub(crate) fn resume(&mut self) {
        if self.state.status != PlaybackStatus::Paused {
            return;
        }
        let current = self.state.current_paragraph;
        self.controller.update_playback_position(current);
        if !self.hidden {
            self.controller.resume();
        }

        match self.paused_from.take().unwrap_or(PlaybackStatus::Playing) {
            PlaybackStatus::Playing => {
                self.state.status = PlaybackStatus::Playing;
                if self.ended_while_paused.take() == Some(current) {
                    self.on_ended(current);
                    return;
                }
                self.emit_status();
                if self.play_started == Some(current) {
                    if let Err(e) = self.engine.resume() {
                        self.playback_failed(current, &e);
                    }
                } else {
                    self.play_current();
                }
            }
            other => {
                self.state.status = other;
                self.emit_status();
                self.try_begin_playing(None);
            }
        }
    }

    /// Jump to `index`.
    ///
    /// A generated paragraph plays immediately; otherwise the session
    /// restarts there.
    pub(crate) fn skip_to(&mut self, index: ParagraphIndex) -> Result<(), CoordinatorError> {
        self.check_index(index)?;

        if !self.state.status.is_active() || !self.controller.is_ready(index) {
            tracing::debug!(target: "narrator.coordinator", index, "Skip target not generated, restarting");
            return self.start(index);
        }

        tracing::debug!(target: "narrator.coordinator", index, "Skipping to generated paragraph");
        self.paused_from = None;
        self.ended_while_paused = None;
        self.state.error = None;
        self.play_started = None;
        self.enter_playing(index);
        Ok(())
    }

    /// Re-attempt playing the current paragraph after a playback failure.
    pub(crate) fn retry_playback(&mut self) {
        match self.state.status {
            PlaybackStatus::Playing => {
                self.state.error = None;
                self.play_current();
                self.publish();
            }
            PlaybackStatus::InitialBuffering | PlaybackStatus::Buffering => {
                self.try_begin_playing(None);
            }
            _ => {}
        }
    }

    /// Pause generation while the host is hidden.
    pub(crate) fn set_visibility(&mut self, hidden: bool) {
        if self.hidden == hidden {
            return;
        }
        self.hidden = hidden;
        if hidden {
            tracing::debug!(target: "narrator.coordinator", "Hidden, pausing generation");
            self.controller.pause();
        } else if matches!(
            self.state.status,
            PlaybackStatus::Playing | PlaybackStatus::InitialBuffering | PlaybackStatus::Buffering
        ) {
            tracing::debug!(target: "narrator.coordinator", "Visible, resuming generation");
            self.controller
                .update_playback_position(self.state.current_paragraph);
            self.controller.resume();
        }
    }

    pub(crate) fn update_config(
        &mut self,
        config: BufferedPlaybackConfig,
    ) -> Result<(), CoordinatorError> {
        if self.state.status.is_active() {
            return Err(CoordinatorError::SessionActive);
        }
        config.validate()?;
        self.config = config;
        self.state.buffer_status.target_buffer = config.target_buffer_size;
        self.publish();
        Ok(())
    }

    pub(crate) fn update_audio_settings(&mut self, settings: AudioSettings) {
        self.engine.update_settings(settings);
    }

    // ── Events ─────────────────────────────────────────────────────

    pub(crate) fn on_generation_event(&mut self, event: GenerationEvent) {
        if !self.state.status.is_active() {
            return;
        }
        match event {
            GenerationEvent::Progress { index, .. } => {
                if !self.controller.is_ready(index) {
                    tracing::trace!(target: "narrator.coordinator", index, "Ignoring stale progress");
                    return;
                }
                self.emit(PlaybackEvent::ParagraphGenerated { index });
                self.refresh_buffer();

                match self.state.status {
                    PlaybackStatus::InitialBuffering | PlaybackStatus::Buffering => {
                        self.try_begin_playing(Some(index));
                    }
                    PlaybackStatus::Playing if index == self.state.current_paragraph + 1 => {
                        self.preload_next();
                    }
                    _ => {}
                }
                self.publish();
            }
            GenerationEvent::Failed { index, error } => {
                tracing::warn!(
                    target: "narrator.coordinator",
                    index,
                    error = %error,
                    "Paragraph skipped after repeated failures"
                );
                if error.is_systemic() {
                    self.state.error = Some(error.to_string());
                }
                self.emit(PlaybackEvent::ParagraphFailed {
                    index,
                    message: error.to_string(),
                });
                self.refresh_buffer();
                self.publish();
            }
            GenerationEvent::RangeComplete => {
                self.refresh_buffer();
                self.publish();
            }
        }
    }

    pub(crate) fn on_element_event(&mut self, event: ElementEvent) {
        if let Some(event) = self.engine.handle_event(event) {
            self.on_audio_event(event);
        }
    }

    fn on_audio_event(&mut self, event: AudioEvent) {
        if !self.state.status.is_active() {
            return;
        }
        match event {
            AudioEvent::Ready { index } => {
                tracing::trace!(target: "narrator.coordinator", index, "Current paragraph buffered");
            }
            AudioEvent::Ended { index } => self.on_ended(index),
            AudioEvent::Error { index, error } => {
                if index == self.state.current_paragraph {
                    self.playback_failed(index, &error);
                }
            }
        }
    }

    fn on_ended(&mut self, index: ParagraphIndex) {
        if self.state.status == PlaybackStatus::Paused
            && self.paused_from == Some(PlaybackStatus::Playing)
            && index == self.state.current_paragraph
        {
            tracing::debug!(target: "narrator.coordinator", index, "Paragraph ended while paused");
            self.ended_while_paused = Some(index);
            return;
        }
        if self.state.status != PlaybackStatus::Playing || index != self.state.current_paragraph {
            tracing::trace!(target: "narrator.coordinator", index, "Ignoring stale ended");
            return;
        }
        self.play_started = None;

        let next = index + 1;
        if next >= self.total() {
            tracing::info!(target: "narrator.coordinator", "Playback completed");
            self.engine.stop();
            self.controller.stop();
            self.state.status = PlaybackStatus::Completed;
            self.refresh_buffer();
            self.flush_bookmark();
            self.emit_status();
            self.emit(PlaybackEvent::Completed);
            return;
        }

        if self.controller.is_sufficient(&self.policy(), next) {
            self.enter_playing(next);
        } else {
            tracing::debug!(
                target: "narrator.coordinator",
                index = next,
                buffer = self.controller.buffer_ahead(next),
                "Buffer underrun"
            );
            self.state.current_paragraph = next;
            self.state.status = PlaybackStatus::Buffering;
            self.controller.update_playback_position(next);
            self.controller.extend_range(self.range_end(next));
            self.refresh_buffer();
            self.record_bookmark(next);
            self.emit_status();
        }
    }

    // ── Transitions ────────────────────────────────────────────────

    /// Move to `Playing` at `index` if the buffer allows it.
    ///
    /// `generated` is the paragraph whose completion triggered the check;
    /// reaching the last paragraph also unblocks playback.
    fn try_begin_playing(&mut self, generated: Option<ParagraphIndex>) {
        if !self.state.status.is_buffering() {
            return;
        }
        let current = self.state.current_paragraph;
        if !self.controller.is_ready(current) {
            return;
        }
        let last = self.total().saturating_sub(1);
        let ahead = self.controller.buffer_ahead(current);
        if ahead >= self.config.min_buffer_size
            || generated == Some(last)
            || self.controller.is_sufficient(&self.policy(), current)
        {
            self.enter_playing(current);
        }
    }

    fn enter_playing(&mut self, index: ParagraphIndex) {
        self.state.status = PlaybackStatus::Playing;
        self.state.current_paragraph = index;

        self.controller.update_playback_position(index);
        self.controller.extend_range(self.range_end(index));
        if !self.hidden {
            self.controller.resume();
        }
        self.refresh_buffer();
        self.record_bookmark(index);
        self.emit_status();
        self.play_current();
    }

    fn play_current(&mut self) {
        let index = self.state.current_paragraph;
        if self.play_started == Some(index) {
            tracing::trace!(target: "narrator.coordinator", index, "Play already in flight");
            return;
        }
        let Some(locator) = self.controller.url(index) else {
            return;
        };

        match self.engine.play(index, &locator) {
            Ok(()) => {
                self.play_started = Some(index);
                self.emit(PlaybackEvent::ParagraphStarted { index });
                self.preload_next();
            }
            Err(e) => self.playback_failed(index, &e),
        }
    }

    fn preload_next(&mut self) {
        let next = self.state.current_paragraph + 1;
        if next >= self.total() {
            return;
        }
        if let Some(locator) = self.controller.url(next) {
            self.engine.preload(next, &locator);
        }
    }

    fn playback_failed(&mut self, index: ParagraphIndex, error: &PlaybackError) {
        tracing::warn!(
            target: "narrator.coordinator",
            index,
            error = %error,
            recoverable = error.is_recoverable(),
            "Playback failed"
        );
        self.play_started = None;
        self.state.error = Some(error.to_string());
        self.emit(PlaybackEvent::PlaybackError {
            index,
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });

        if error.is_fatal() {
            self.engine.stop();
            self.controller.stop();
            self.state.status = PlaybackStatus::Error;
            self.flush_bookmark();
            self.emit_status();
        } else {
            self.publish();
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn check_index(&self, index: ParagraphIndex) -> Result<(), CoordinatorError> {
        if self.paragraphs.is_empty() {
            return Err(CoordinatorError::NoParagraphs);
        }
        if index >= self.total() {
            return Err(CoordinatorError::InvalidIndex {
                index,
                total: self.total(),
            });
        }
        Ok(())
    }

    fn refresh_buffer(&mut self) {
        self.state.buffer_status = self
            .controller
            .buffer_status(self.state.current_paragraph, self.config.target_buffer_size);
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }

    fn emit_status(&self) {
        tracing::debug!(
            target: "narrator.coordinator",
            status = ?self.state.status,
            current = self.state.current_paragraph,
            "State changed"
        );
        self.emit(PlaybackEvent::StateChanged {
            status: self.state.status,
        });
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    // ── Bookmarks ──────────────────────────────────────────────────

    fn record_bookmark(&mut self, paragraph: ParagraphIndex) {
        if let Some(due) = self.bookmark.record(paragraph) {
            self.bookmark_due = Some(due);
        }
    }

    fn flush_bookmark(&mut self) {
        if let Some(due) = self.bookmark.flush() {
            self.bookmark_due = Some(due);
        }
    }

    /// Release a throttled bookmark whose interval has passed.
    pub(crate) fn poll_bookmark(&mut self) {
        if let Some(due) = self.bookmark.poll(tokio::time::Instant::now()) {
            self.bookmark_due = Some(due);
        }
    }

    pub(crate) fn bookmark_deadline(&self) -> Option<tokio::time::Instant> {
        self.bookmark.deadline()
    }

    /// Position that should be written to the session store now.
    pub(crate) fn take_bookmark(&mut self) -> Option<ParagraphIndex> {
        self.bookmark_due.take()
    }
}
