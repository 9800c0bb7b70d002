//! Session persistence port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::paragraph::ParagraphIndex;

/// Saved listening position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Paragraph the listener was on.
    pub paragraph: ParagraphIndex,

    /// When the position was recorded.
    pub saved_at: DateTime<Utc>,
}

impl Bookmark {
    /// Bookmark the given paragraph as of now.
    pub fn now(paragraph: ParagraphIndex) -> Self {
        Self {
            paragraph,
            saved_at: Utc::now(),
        }
    }
}

/// Storage for the listening position of the current session.
///
/// The coordinator writes at most once per second while playing and flushes
/// the latest position on pause, stop and completion.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the last saved position, if any.
    async fn load_bookmark(&self) -> Result<Option<Bookmark>, StoreError>;

    /// Persist the current position.
    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<(), StoreError>;
}

/// A session store that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSessionStore;

#[async_trait]
impl SessionStore for NoopSessionStore {
    async fn load_bookmark(&self) -> Result<Option<Bookmark>, StoreError> {
        Ok(None)
    }

    async fn save_bookmark(&self, _bookmark: &Bookmark) -> Result<(), StoreError> {
        Ok(())
    }
}
