//! Playback and coordinator error types.

use thiserror::Error;

use narrator_core::{ConfigError, ParagraphIndex, StoreError};

/// Errors raised by audio elements and the playback engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// The platform refused to start audio without a user gesture.
    #[error("Playback blocked until the next user gesture")]
    AutoplayBlocked,

    /// The audio could not be decoded.
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// The audio could not be fetched.
    #[error("Failed to fetch audio: {0}")]
    Network(String),

    /// No usable output device.
    #[error("Failed to open audio output: {0}")]
    Output(String),

    /// The locator could not be turned into a fetchable address.
    #[error("Invalid audio address '{locator}': {message}")]
    InvalidAddress { locator: String, message: String },

    /// The dedicated audio thread is gone.
    #[error("Audio thread stopped unexpectedly")]
    AudioThreadDied,

    /// `resume` was called with nothing to resume.
    #[error("No audio loaded")]
    NothingLoaded,
}

impl PlaybackError {
    /// Whether retrying the same paragraph on the next user gesture is
    /// expected to succeed.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::AutoplayBlocked)
    }

    /// Whether audio output as a whole is unusable, so retrying any
    /// paragraph is pointless.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Output(_) | Self::AudioThreadDied)
    }
}

/// A coordinator request that was rejected before reaching the state machine.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No paragraphs loaded, or the loaded list was empty.
    #[error("No paragraphs to play")]
    NoParagraphs,

    /// Paragraph index outside the loaded list.
    #[error("Paragraph {index} does not exist (session has {total})")]
    InvalidIndex {
        index: ParagraphIndex,
        total: usize,
    },

    /// The generation backend did not answer the connectivity probe.
    #[error("Generation backend unreachable: {0}")]
    BackendUnreachable(String),

    /// Configuration cannot change while a session is in progress.
    #[error("Cannot change buffering configuration while playback is active")]
    SessionActive,

    /// The new configuration failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The platform adapter could not prepare audio output.
    #[error("Audio platform error: {0}")]
    Platform(#[from] PlaybackError),

    /// Persisting preferences or bookmarks failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The coordinator task has shut down.
    #[error("Coordinator is not running")]
    Closed,
}
