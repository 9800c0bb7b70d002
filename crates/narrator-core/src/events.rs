//! Events exchanged between the controller, the coordinator and consumers.
//!
//! Every asynchronous completion carries the paragraph index it refers to.
//! Receivers match it against the controller's authoritative state instead
//! of trusting anything captured when the request was issued.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GenerationError;
use crate::paragraph::{ParagraphIndex, ResourceLocator};
use crate::state::PlaybackStatus;

/// Progress reported by the generation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// A paragraph now has a playable locator.
    Progress {
        index: ParagraphIndex,
        locator: ResourceLocator,
    },

    /// A paragraph exhausted its retries and was skipped.
    Failed {
        index: ParagraphIndex,
        error: GenerationError,
    },

    /// Nothing left to generate in the current range.
    RangeComplete,
}

/// Receiver of generation progress.
///
/// Implementations must not block; the controller calls these from its
/// runner task.
pub trait GenerationListener: Send + Sync {
    /// A paragraph was generated (or found in the cache).
    fn on_progress(&self, index: ParagraphIndex, locator: &ResourceLocator);

    /// A paragraph was permanently skipped after exhausting retries.
    fn on_error(&self, index: ParagraphIndex, error: &GenerationError);

    /// The range drained.
    fn on_complete(&self);
}

/// Forward controller callbacks into a channel.
impl GenerationListener for mpsc::UnboundedSender<GenerationEvent> {
    fn on_progress(&self, index: ParagraphIndex, locator: &ResourceLocator) {
        let _ = self.send(GenerationEvent::Progress {
            index,
            locator: locator.clone(),
        });
    }

    fn on_error(&self, index: ParagraphIndex, error: &GenerationError) {
        let _ = self.send(GenerationEvent::Failed {
            index,
            error: error.clone(),
        });
    }

    fn on_complete(&self) {
        let _ = self.send(GenerationEvent::RangeComplete);
    }
}

/// Events emitted by the coordinator to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// Coordinator status changed.
    StateChanged { status: PlaybackStatus },

    /// The engine accepted playback of a paragraph.
    ParagraphStarted { index: ParagraphIndex },

    /// A paragraph became playable.
    ParagraphGenerated { index: ParagraphIndex },

    /// A paragraph was skipped by the controller after repeated failures.
    ParagraphFailed { index: ParagraphIndex, message: String },

    /// Playback of the current paragraph failed.
    ///
    /// `recoverable` errors (autoplay blocked) are retried by the next user
    /// gesture; others need a manual retry or skip.
    PlaybackError {
        index: ParagraphIndex,
        message: String,
        recoverable: bool,
    },

    /// The last paragraph finished playing.
    Completed,
}
