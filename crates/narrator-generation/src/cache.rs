//! In-memory locator cache.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use narrator_core::{GenerationParams, LocatorCache, ParagraphIndex, ResourceLocator};

/// Process-lifetime cache keyed by paragraph index and parameter fingerprint.
///
/// Survives `reset`, so replaying a document with unchanged parameters skips
/// the backend entirely. Call [`InMemoryLocatorCache::clear`] when loading a
/// different document.
#[derive(Debug, Default)]
pub struct InMemoryLocatorCache {
    entries: RwLock<HashMap<(ParagraphIndex, String), ResourceLocator>>,
}

impl InMemoryLocatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of cached locators.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl LocatorCache for InMemoryLocatorCache {
    async fn get(
        &self,
        index: ParagraphIndex,
        params: &GenerationParams,
    ) -> Option<ResourceLocator> {
        self.entries
            .read()
            .await
            .get(&(index, params.fingerprint()))
            .cloned()
    }

    async fn put(
        &self,
        index: ParagraphIndex,
        params: &GenerationParams,
        locator: &ResourceLocator,
    ) {
        self.entries
            .write()
            .await
            .insert((index, params.fingerprint()), locator.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_requires_matching_params() {
        let cache = InMemoryLocatorCache::new();
        let params = GenerationParams::default();
        cache.put(0, &params, &ResourceLocator::new("/a.wav")).await;

        assert_eq!(
            cache.get(0, &params).await,
            Some(ResourceLocator::new("/a.wav"))
        );
        assert_eq!(cache.get(1, &params).await, None);

        let other_voice = GenerationParams {
            voice: "other".to_string(),
            ..params
        };
        assert_eq!(cache.get(0, &other_voice).await, None);
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let cache = InMemoryLocatorCache::new();
        cache
            .put(0, &GenerationParams::default(), &ResourceLocator::new("/a.wav"))
            .await;
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
