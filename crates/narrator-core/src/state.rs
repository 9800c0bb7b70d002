//! Coordinator state types.

use serde::{Deserialize, Serialize};

use crate::buffer::BufferStatus;
use crate::paragraph::ParagraphIndex;

/// Status of the buffered playback coordinator.
///
/// ```text
///   Idle → InitialBuffering → Playing ⇄ Buffering
///                               │  ▲
///                               ▼  │
///                              Paused
///   Playing → Completed        (any non-terminal) → Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackStatus {
    /// No session running.
    #[default]
    Idle,

    /// Session started; waiting for the first paragraphs to generate.
    InitialBuffering,

    /// Playback stalled at the cursor until generation catches up.
    Buffering,

    /// Audio for the current paragraph is playing (or about to).
    Playing,

    /// Paused by the user.
    Paused,

    /// The last paragraph finished.
    Completed,

    /// Unrecoverable failure; requires an explicit restart.
    Error,
}

impl PlaybackStatus {
    /// Whether a session is in progress.
    ///
    /// `Idle`, `Completed` and `Error` are resting states.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Completed | Self::Error)
    }

    /// Whether the coordinator is waiting on generation.
    pub const fn is_buffering(self) -> bool {
        matches!(self, Self::InitialBuffering | Self::Buffering)
    }
}

/// Full coordinator state, published to consumers as immutable snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedPlaybackState {
    /// State machine status.
    pub status: PlaybackStatus,

    /// Playback cursor.
    pub current_paragraph: ParagraphIndex,

    /// Generation progress relative to the cursor.
    pub buffer_status: BufferStatus,

    /// User-visible message for systemic or playback errors.
    pub error: Option<String>,
}

impl BufferedPlaybackState {
    /// Initial idle state for a given target buffer.
    pub const fn idle(target_buffer: usize) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_paragraph: 0,
            buffer_status: BufferStatus::empty(target_buffer),
            error: None,
        }
    }
}
