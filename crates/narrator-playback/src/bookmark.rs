//! Bookmark write throttling.
//!
//! The coordinator records the current paragraph on every advance, but the
//! session store sees at most one write per interval. The latest position is
//! kept as pending and written once the interval elapses or on an explicit
//! flush.

use std::time::Duration;

use tokio::time::Instant;

use narrator_core::ParagraphIndex;

/// Default minimum time between bookmark writes.
pub const BOOKMARK_INTERVAL: Duration = Duration::from_secs(1);

/// Rate-limiter for bookmark writes.
#[derive(Debug)]
pub(crate) struct BookmarkThrottle {
    min_interval: Duration,
    last_write: Option<Instant>,
    pending: Option<ParagraphIndex>,
}

impl BookmarkThrottle {
    pub(crate) const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_write: None,
            pending: None,
        }
    }

    /// Record a position. Returns the position to write now, if the
    /// interval allows it.
    pub(crate) fn record(&mut self, paragraph: ParagraphIndex) -> Option<ParagraphIndex> {
        self.pending = Some(paragraph);
        self.poll(Instant::now())
    }

    /// Release the pending position if the interval has elapsed.
    pub(crate) fn poll(&mut self, now: Instant) -> Option<ParagraphIndex> {
        let pending = self.pending?;
        match self.last_write {
            Some(last) if now.duration_since(last) < self.min_interval => None,
            _ => {
                self.pending = None;
                self.last_write = Some(now);
                Some(pending)
            }
        }
    }

    /// Release the pending position regardless of the interval.
    pub(crate) fn flush(&mut self) -> Option<ParagraphIndex> {
        let pending = self.pending.take()?;
        self.last_write = Some(Instant::now());
        Some(pending)
    }

    /// When the pending position becomes writable.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.pending?;
        Some(
            self.last_write
                .map_or_else(Instant::now, |last| last + self.min_interval),
        )
    }

    /// Drop any pending write and allow the next one immediately.
    pub(crate) const fn reset(&mut self) {
        self.pending = None;
        self.last_write = None;
    }
}

impl Default for BookmarkThrottle {
    fn default() -> Self {
        Self::new(BOOKMARK_INTERVAL)
    }
}
