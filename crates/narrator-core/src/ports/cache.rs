//! Locator cache port.

use async_trait::async_trait;

use crate::paragraph::{GenerationParams, ParagraphIndex, ResourceLocator};

/// Lookup of previously generated audio.
///
/// Entries are keyed by paragraph index *and* generation parameters, so a
/// voice or language change never returns stale audio. The controller
/// consults the cache before calling the backend and stores every locator
/// it generates.
#[async_trait]
pub trait LocatorCache: Send + Sync {
    /// Return a cached locator for this paragraph, if one exists.
    async fn get(
        &self,
        index: ParagraphIndex,
        params: &GenerationParams,
    ) -> Option<ResourceLocator>;

    /// Remember a freshly generated locator.
    async fn put(
        &self,
        index: ParagraphIndex,
        params: &GenerationParams,
        locator: &ResourceLocator,
    );
}

/// A cache that never hits and forgets everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLocatorCache;

#[async_trait]
impl LocatorCache for NoopLocatorCache {
    async fn get(
        &self,
        _index: ParagraphIndex,
        _params: &GenerationParams,
    ) -> Option<ResourceLocator> {
        None
    }

    async fn put(
        &self,
        _index: ParagraphIndex,
        _params: &GenerationParams,
        _locator: &ResourceLocator,
    ) {
        // Intentionally do nothing
    }
}
