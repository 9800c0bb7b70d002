//! Mutable controller state.
//!
//! Everything here is guarded by one `std::sync::Mutex` in the controller and
//! is never held across an `.await`. The helpers are synchronous so the
//! scheduling rules can be tested without a runtime.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use narrator_core::{
    BufferPolicy, GenerationListener, GenerationParams, ParagraphIndex, Paragraphs,
    ResourceLocator,
};

/// Identifies one runner lifetime.
///
/// `stop`/`reset` bump the epoch; a runner whose epoch no longer matches
/// must not commit results or notify listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Epoch(pub(crate) u64);

pub(crate) struct ControllerState {
    pub(crate) paragraphs: Paragraphs,
    pub(crate) params: GenerationParams,

    /// Authoritative set of playable paragraphs.
    pub(crate) generated: BTreeMap<ParagraphIndex, ResourceLocator>,
    /// Paragraphs that exhausted their retries this session.
    pub(crate) skipped: BTreeSet<ParagraphIndex>,
    /// Failed attempts per paragraph; cleared on success.
    pub(crate) retry_counts: HashMap<ParagraphIndex, u32>,

    /// First index the runner scans from.
    pub(crate) lower: ParagraphIndex,
    /// Inclusive upper bound of the active range. `None` when no range is
    /// active.
    pub(crate) upper: Option<ParagraphIndex>,
    pub(crate) playback_position: ParagraphIndex,

    pub(crate) paused: bool,
    pub(crate) running: bool,
    pub(crate) in_flight: Option<ParagraphIndex>,

    pub(crate) epoch: Epoch,
    pub(crate) cancel: CancellationToken,
    pub(crate) listener: Option<Arc<dyn GenerationListener>>,
}

impl ControllerState {
    pub(crate) fn new() -> Self {
        Self {
            paragraphs: Paragraphs::default(),
            params: GenerationParams::default(),
            generated: BTreeMap::new(),
            skipped: BTreeSet::new(),
            retry_counts: HashMap::new(),
            lower: 0,
            upper: None,
            playback_position: 0,
            paused: false,
            running: false,
            in_flight: None,
            epoch: Epoch::default(),
            cancel: CancellationToken::new(),
            listener: None,
        }
    }

    /// Next index the runner should work on, if any.
    ///
    /// Lowest index in `[lower, upper]` that is neither generated nor skipped.
    pub(crate) fn next_pending(&self) -> Option<ParagraphIndex> {
        let upper = self.upper?;
        (self.lower..=upper)
            .find(|i| !self.generated.contains_key(i) && !self.skipped.contains(i))
    }

    /// Abandon the current runner: cancel in-flight work and invalidate its
    /// epoch. Generated results are kept.
    pub(crate) fn halt(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.epoch = Epoch(self.epoch.0.wrapping_add(1));
        self.running = false;
        self.paused = false;
        self.in_flight = None;
        self.upper = None;
        self.listener = None;
    }

    /// Forget every result and counter from the previous session.
    pub(crate) fn clear_results(&mut self) {
        self.generated.clear();
        self.skipped.clear();
        self.retry_counts.clear();
        self.lower = 0;
        self.playback_position = 0;
    }

    pub(crate) fn is_ready(&self, index: ParagraphIndex) -> bool {
        self.generated.contains_key(&index)
    }

    pub(crate) fn buffer_ahead(&self, current: ParagraphIndex) -> usize {
        BufferPolicy::buffer_ahead(current, self.paragraphs.len(), |i| self.is_ready(i))
    }

    /// Clamp an index to the last paragraph.
    pub(crate) fn clamp(&self, index: ParagraphIndex) -> Option<ParagraphIndex> {
        self.paragraphs.last_index().map(|last| index.min(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(count: usize) -> ControllerState {
        let mut state = ControllerState::new();
        state.paragraphs = Paragraphs::new((0..count).map(|i| format!("p{i}")));
        state
    }

    #[test]
    fn no_range_means_no_work() {
        let state = state_with(5);
        assert_eq!(state.next_pending(), None);
    }

    #[test]
    fn next_pending_skips_generated_and_skipped() {
        let mut state = state_with(6);
        state.upper = Some(4);
        state.generated.insert(0, ResourceLocator::new("/0"));
        state.skipped.insert(1);
        state.generated.insert(2, ResourceLocator::new("/2"));

        assert_eq!(state.next_pending(), Some(3));
    }

    #[test]
    fn next_pending_respects_lower_bound() {
        let mut state = state_with(6);
        state.lower = 4;
        state.upper = Some(5);
        assert_eq!(state.next_pending(), Some(4));

        state.generated.insert(4, ResourceLocator::new("/4"));
        state.generated.insert(5, ResourceLocator::new("/5"));
        assert_eq!(state.next_pending(), None);
    }

    #[test]
    fn halt_keeps_results_but_clears_range() {
        let mut state = state_with(3);
        state.upper = Some(2);
        state.running = true;
        state.generated.insert(0, ResourceLocator::new("/0"));
        let old_token = state.cancel.clone();
        let old_epoch = state.epoch;

        state.halt();

        assert!(old_token.is_cancelled());
        assert!(!state.cancel.is_cancelled());
        assert_ne!(state.epoch, old_epoch);
        assert!(!state.running);
        assert_eq!(state.upper, None);
        assert!(state.is_ready(0));
    }

    #[test]
    fn clear_results_forgets_everything() {
        let mut state = state_with(3);
        state.generated.insert(0, ResourceLocator::new("/0"));
        state.skipped.insert(1);
        state.retry_counts.insert(1, 3);
        state.playback_position = 2;

        state.clear_results();

        assert!(state.generated.is_empty());
        assert!(state.skipped.is_empty());
        assert!(state.retry_counts.is_empty());
        assert_eq!(state.playback_position, 0);
    }

    #[test]
    fn buffer_ahead_stops_at_gap() {
        let mut state = state_with(6);
        for i in [0, 1, 2, 4, 5] {
            state.generated.insert(i, ResourceLocator::new(format!("/{i}")));
        }
        assert_eq!(state.buffer_ahead(0), 2);
        assert_eq!(state.buffer_ahead(3), 2);
    }

    #[test]
    fn clamp_to_last_paragraph() {
        let state = state_with(4);
        assert_eq!(state.clamp(10), Some(3));
        assert_eq!(state.clamp(1), Some(1));
        assert_eq!(state_with(0).clamp(0), None);
    }
}
