//! Generation backend port.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::paragraph::{GenerationParams, ResourceLocator};

/// Remote text-to-speech generation service.
///
/// One call per paragraph; no batching. The controller never issues a
/// second call before the first resolves, so implementations need not be
/// reentrant-safe beyond `Send + Sync`.
///
/// Cancellation is handled by the caller dropping the returned future.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate audio for `text` and return the locator of the artifact.
    async fn generate(
        &self,
        text: &str,
        params: &GenerationParams,
    ) -> Result<ResourceLocator, GenerationError>;

    /// Check that the backend is reachable.
    ///
    /// The default implementation assumes it is.
    async fn check_connection(&self) -> Result<(), GenerationError> {
        Ok(())
    }
}
