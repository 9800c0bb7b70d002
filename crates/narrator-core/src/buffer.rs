//! Buffer policy: pure look-ahead arithmetic.
//!
//! Everything here is a function of the generated set, the playback cursor
//! and the configured thresholds. Callers pass the generated set as a
//! predicate over the controller's current state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::BufferedPlaybackConfig;
use crate::paragraph::ParagraphIndex;

/// Thresholds that gate coordinator transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    /// Paragraphs the controller tries to keep generated ahead of the cursor.
    pub target: usize,
    /// Paragraphs that must be ready ahead of the cursor before playback
    /// may (re)start.
    pub min: usize,
}

impl BufferPolicy {
    /// Build a policy from a validated config.
    pub const fn from_config(config: &BufferedPlaybackConfig) -> Self {
        Self {
            target: config.target_buffer_size,
            min: config.min_buffer_size,
        }
    }

    /// Count contiguous generated paragraphs immediately after `current`.
    ///
    /// The count stops at the first missing index, regardless of how many
    /// higher indices are generated.
    pub fn buffer_ahead(
        current: ParagraphIndex,
        total: usize,
        is_ready: impl Fn(ParagraphIndex) -> bool,
    ) -> usize {
        (current + 1..total).take_while(|&i| is_ready(i)).count()
    }

    /// Whether playback may proceed at `current`.
    ///
    /// The current paragraph must be generated, and the look-ahead must reach
    /// `min`, or the end of content when fewer than `min` paragraphs remain
    /// after the cursor.
    pub fn is_sufficient(
        &self,
        current: ParagraphIndex,
        total: usize,
        is_ready: impl Fn(ParagraphIndex) -> bool,
    ) -> bool {
        if current >= total || !is_ready(current) {
            return false;
        }
        let remaining = total - 1 - current;
        let ahead = Self::buffer_ahead(current, total, is_ready);
        ahead >= self.min.min(remaining)
    }

    /// Upper bound of the generation range for a cursor at `current`,
    /// clamped to the last paragraph.
    pub fn range_end(&self, current: ParagraphIndex, total: usize) -> ParagraphIndex {
        (current + self.target).min(total.saturating_sub(1))
    }
}

/// Snapshot of generation progress relative to the playback cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStatus {
    /// Indices with a playable locator.
    pub generated: BTreeSet<ParagraphIndex>,

    /// Contiguous generated paragraphs after the cursor.
    pub buffer_size: usize,

    /// Configured target look-ahead.
    pub target_buffer: usize,

    /// Whether a generation request is in flight.
    pub is_generating: bool,

    /// Index currently being generated, if any.
    pub generating_index: Option<ParagraphIndex>,
}

impl BufferStatus {
    /// Empty status for a given target.
    pub const fn empty(target_buffer: usize) -> Self {
        Self {
            generated: BTreeSet::new(),
            buffer_size: 0,
            target_buffer,
            is_generating: false,
            generating_index: None,
        }
    }
}
