//! Preferences persistence port.

use async_trait::async_trait;

use super::StoreError;
use crate::config::BufferedPlaybackConfig;

/// Storage for the user's buffering preferences.
///
/// # Design Rules
///
/// - Works with the domain `BufferedPlaybackConfig` directly
/// - `load` returns defaults when nothing is stored
/// - Validation happens before `save`, not inside implementations
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    /// Load the stored config, or defaults if none is stored.
    async fn load(&self) -> Result<BufferedPlaybackConfig, StoreError>;

    /// Persist a validated config.
    async fn save(&self, config: &BufferedPlaybackConfig) -> Result<(), StoreError>;
}

/// A preferences store that always yields defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPreferencesStore;

#[async_trait]
impl PreferencesStore for NoopPreferencesStore {
    async fn load(&self) -> Result<BufferedPlaybackConfig, StoreError> {
        Ok(BufferedPlaybackConfig::default())
    }

    async fn save(&self, _config: &BufferedPlaybackConfig) -> Result<(), StoreError> {
        Ok(())
    }
}
