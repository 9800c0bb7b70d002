//! Platform adapter.
//!
//! Isolates platform quirks from the engine and coordinator: some outputs
//! must be "unlocked" by a user gesture before audio may start, and some
//! allow only a single element that has to be reused for every paragraph.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::PlaybackError;

/// Platform-specific playback behaviour.
pub trait PlatformAdapter: Send + Sync {
    /// Prepare audio output. Called once per session start, before any
    /// playback.
    fn prime(&self) -> Result<(), PlaybackError>;

    /// Whether every paragraph must play through the same element.
    ///
    /// When true the engine swaps sources instead of creating elements, and
    /// preloading is disabled.
    fn needs_reuse_of_element(&self) -> bool;
}

/// Desktop output: no priming, unlimited elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopPlatform;

impl PlatformAdapter for DesktopPlatform {
    fn prime(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn needs_reuse_of_element(&self) -> bool {
        false
    }
}

/// Output that allows one element and counts primes.
#[derive(Debug, Default)]
pub struct SingleElementPlatform {
    primes: AtomicUsize,
}

impl SingleElementPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `prime` has been called.
    pub fn prime_count(&self) -> usize {
        self.primes.load(Ordering::SeqCst)
    }
}

impl PlatformAdapter for SingleElementPlatform {
    fn prime(&self) -> Result<(), PlaybackError> {
        self.primes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(target: "narrator.playback", "Audio output primed");
        Ok(())
    }

    fn needs_reuse_of_element(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_allows_many_elements() {
        let platform = DesktopPlatform;
        assert!(platform.prime().is_ok());
        assert!(!platform.needs_reuse_of_element());
    }

    #[test]
    fn single_element_platform_counts_primes() {
        let platform = SingleElementPlatform::new();
        platform.prime().unwrap();
        platform.prime().unwrap();
        assert_eq!(platform.prime_count(), 2);
        assert!(platform.needs_reuse_of_element());
    }
}
