//! Audio element capability.
//!
//! An element wraps one playable audio resource. It is the narrow interface
//! between the engine and whatever actually produces sound: the rodio
//! backend in [`crate::native`], or a scripted fake in tests.
//!
//! Elements report asynchronous progress through an [`ElementEvent`] channel.
//! Every event carries the token the element was created with, so the engine
//! can drop events from elements it has already replaced.

use tokio::sync::mpsc;
use url::Url;

use narrator_core::AudioSettings;

use crate::error::PlaybackError;

/// Identity of one element lifetime (or one source, for reused elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementToken(pub u64);

/// What happened to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEventKind {
    /// Enough data is buffered to play to the end without stalling.
    CanPlayThrough,
    /// Playback reached the end of the resource.
    Ended,
    /// Loading or playback failed.
    Error(PlaybackError),
}

/// An event reported by an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEvent {
    pub token: ElementToken,
    pub kind: ElementEventKind,
}

impl ElementEvent {
    pub const fn new(token: ElementToken, kind: ElementEventKind) -> Self {
        Self { token, kind }
    }
}

/// Sender half handed to elements.
pub type ElementEventSender = mpsc::UnboundedSender<ElementEvent>;

/// One playable audio resource.
///
/// Creating an element starts loading; it does not start playback.
pub trait AudioElement: Send {
    /// Start or continue playback.
    ///
    /// Returns an error when the platform rejects playback synchronously
    /// (autoplay restrictions). Failures discovered later arrive as
    /// [`ElementEventKind::Error`].
    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Pause, keeping the position.
    fn pause(&mut self);

    /// Stop and release the resource. Emits no further events.
    fn stop(&mut self);

    /// Replace the source, for platforms that only allow one element.
    ///
    /// Events for the new source carry `token`.
    fn load(&mut self, url: &Url, token: ElementToken) -> Result<(), PlaybackError>;

    /// Apply client-side playback settings.
    fn apply_settings(&mut self, settings: &AudioSettings);

    /// Whether enough data is buffered to play through.
    fn is_buffered(&self) -> bool;
}

/// Constructs elements for resolved audio addresses.
pub trait AudioElementFactory: Send + Sync {
    /// Create an element for `url` and begin loading it.
    fn create(
        &self,
        url: &Url,
        token: ElementToken,
        events: ElementEventSender,
    ) -> Result<Box<dyn AudioElement>, PlaybackError>;
}
