//! Audio playback engine.
//!
//! Holds at most one current element and one preloaded element (for the
//! paragraph after the current one). Elements report through a shared
//! channel; [`AudioPlaybackEngine::handle_event`] filters that stream down
//! to events about the current paragraph.

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use narrator_core::{AudioSettings, ParagraphIndex, ResourceLocator, resolve_locator};

use crate::element::{
    AudioElement, AudioElementFactory, ElementEvent, ElementEventKind, ElementEventSender,
    ElementToken,
};
use crate::error::PlaybackError;
use crate::platform::PlatformAdapter;

/// Engine-level event for the current paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// The current paragraph is buffered enough to play through.
    Ready { index: ParagraphIndex },
    /// The current paragraph finished.
    Ended { index: ParagraphIndex },
    /// The current paragraph failed to load or play.
    Error {
        index: ParagraphIndex,
        error: PlaybackError,
    },
}

struct Slot {
    index: ParagraphIndex,
    token: ElementToken,
    element: Box<dyn AudioElement>,
    ready: bool,
}

impl Slot {
    fn is_buffered(&self) -> bool {
        self.ready || self.element.is_buffered()
    }
}

/// Plays one paragraph at a time and preloads the next.
pub struct AudioPlaybackEngine {
    factory: Arc<dyn AudioElementFactory>,
    platform: Arc<dyn PlatformAdapter>,
    base_url: Url,
    settings: AudioSettings,
    events_tx: ElementEventSender,
    current: Option<Slot>,
    preload: Option<Slot>,
    next_token: u64,
}

impl AudioPlaybackEngine {
    /// Create an engine and the receiver its elements report into.
    pub fn new(
        factory: Arc<dyn AudioElementFactory>,
        platform: Arc<dyn PlatformAdapter>,
        base_url: Url,
        settings: AudioSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ElementEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = Self {
            factory,
            platform,
            base_url,
            settings: settings.clamped(),
            events_tx,
            current: None,
            preload: None,
            next_token: 0,
        };
        (engine, events_rx)
    }

    /// Play paragraph `index`, replacing whatever is current.
    ///
    /// A matching preload that is buffered enough is promoted; otherwise a
    /// fresh element is created (or, on single-element platforms, the
    /// current element is pointed at the new source).
    pub fn play(
        &mut self,
        index: ParagraphIndex,
        locator: &ResourceLocator,
    ) -> Result<(), PlaybackError> {
        let url = self.resolve(locator)?;

        if let Some(slot) = self.take_usable_preload(index) {
            tracing::debug!(
                target: "narrator.playback",
                index,
                "Promoting preloaded element"
            );
            self.replace_current(slot);
        } else if self.platform.needs_reuse_of_element() && self.current.is_some() {
            let token = self.mint_token();
            if let Some(slot) = self.current.as_mut() {
                slot.element.stop();
                slot.element.load(&url, token)?;
                slot.element.apply_settings(&self.settings);
                slot.index = index;
                slot.token = token;
                slot.ready = false;
            }
        } else {
            let slot = self.create_slot(index, &url)?;
            self.replace_current(slot);
        }

        let Some(slot) = self.current.as_mut() else {
            return Err(PlaybackError::NothingLoaded);
        };
        slot.element.play()?;
        tracing::debug!(target: "narrator.playback", index, %url, "Playback started");
        Ok(())
    }

    /// Start buffering paragraph `index` without playing it.
    ///
    /// Ignored on single-element platforms and when `index` is already
    /// current or preloaded. Any other unused preload is discarded.
    pub fn preload(&mut self, index: ParagraphIndex, locator: &ResourceLocator) {
        if self.platform.needs_reuse_of_element() {
            return;
        }
        if self.current.as_ref().is_some_and(|s| s.index == index)
            || self.preload.as_ref().is_some_and(|s| s.index == index)
        {
            return;
        }

        let url = match self.resolve(locator) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(target: "narrator.playback", index, error = %e, "Cannot preload");
                return;
            }
        };

        self.discard_preload();
        match self.create_slot(index, &url) {
            Ok(slot) => {
                tracing::debug!(target: "narrator.playback", index, "Preloading");
                self.preload = Some(slot);
            }
            Err(e) => {
                tracing::warn!(target: "narrator.playback", index, error = %e, "Preload failed");
            }
        }
    }

    /// Pause the current element.
    pub fn pause(&mut self) {
        if let Some(slot) = self.current.as_mut() {
            slot.element.pause();
        }
    }

    /// Resume the current element.
    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        let slot = self
            .current
            .as_mut()
            .ok_or(PlaybackError::NothingLoaded)?;
        slot.element.play()
    }

    /// Stop and drop every element.
    pub fn stop(&mut self) {
        if let Some(mut slot) = self.current.take() {
            slot.element.stop();
        }
        self.discard_preload();
    }

    /// Apply new settings to the current and preloaded elements and to every
    /// element created from now on.
    pub fn update_settings(&mut self, settings: AudioSettings) {
        self.settings = settings.clamped();
        for slot in [self.current.as_mut(), self.preload.as_mut()]
            .into_iter()
            .flatten()
        {
            slot.element.apply_settings(&self.settings);
        }
    }

    /// Current settings (after clamping).
    pub const fn settings(&self) -> AudioSettings {
        self.settings
    }

    /// Paragraph of the current element.
    pub fn current_index(&self) -> Option<ParagraphIndex> {
        self.current.as_ref().map(|s| s.index)
    }

    /// Paragraph of the preloaded element.
    pub fn preloaded_index(&self) -> Option<ParagraphIndex> {
        self.preload.as_ref().map(|s| s.index)
    }

    /// Translate an element event into an engine event.
    ///
    /// Events from replaced elements, and preload progress, yield `None`.
    pub fn handle_event(&mut self, event: ElementEvent) -> Option<AudioEvent> {
        if let Some(slot) = self.current.as_mut().filter(|s| s.token == event.token) {
            let index = slot.index;
            return match event.kind {
                ElementEventKind::CanPlayThrough => {
                    slot.ready = true;
                    Some(AudioEvent::Ready { index })
                }
                ElementEventKind::Ended => Some(AudioEvent::Ended { index }),
                ElementEventKind::Error(error) => Some(AudioEvent::Error { index, error }),
            };
        }

        if let Some(slot) = self.preload.as_mut().filter(|s| s.token == event.token) {
            match event.kind {
                ElementEventKind::CanPlayThrough => {
                    tracing::debug!(target: "narrator.playback", index = slot.index, "Preload buffered");
                    slot.ready = true;
                }
                ElementEventKind::Error(error) => {
                    tracing::warn!(
                        target: "narrator.playback",
                        index = slot.index,
                        error = %error,
                        "Preload failed, will load on demand"
                    );
                    self.discard_preload();
                }
                ElementEventKind::Ended => {}
            }
            return None;
        }

        tracing::trace!(target: "narrator.playback", token = event.token.0, "Ignoring stale element event");
        None
    }

    fn resolve(&self, locator: &ResourceLocator) -> Result<Url, PlaybackError> {
        resolve_locator(&self.base_url, locator).map_err(|e| PlaybackError::InvalidAddress {
            locator: locator.to_string(),
            message: e.to_string(),
        })
    }

    const fn mint_token(&mut self) -> ElementToken {
        self.next_token += 1;
        ElementToken(self.next_token)
    }

    fn create_slot(&mut self, index: ParagraphIndex, url: &Url) -> Result<Slot, PlaybackError> {
        let token = self.mint_token();
        let mut element = self.factory.create(url, token, self.events_tx.clone())?;
        element.apply_settings(&self.settings);
        Ok(Slot {
            index,
            token,
            element,
            ready: false,
        })
    }

    fn take_usable_preload(&mut self, index: ParagraphIndex) -> Option<Slot> {
        if !self.preload.as_ref().is_some_and(|s| s.index == index) {
            return None;
        }
        let mut slot = self.preload.take()?;
        if slot.is_buffered() {
            return Some(slot);
        }
        tracing::debug!(
            target: "narrator.playback",
            index,
            "Preload not buffered yet, loading fresh"
        );
        slot.element.stop();
        None
    }

    fn replace_current(&mut self, slot: Slot) {
        if let Some(mut old) = self.current.replace(slot) {
            old.element.stop();
        }
    }

    fn discard_preload(&mut self) {
        if let Some(mut slot) = self.preload.take() {
            slot.element.stop();
        }
    }
}

impl Drop for AudioPlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
