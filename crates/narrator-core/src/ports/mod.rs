//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the coordinator and controller expect
//! from infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No `reqwest`/`rodio` types in any signature
//! - Stores are minimal load/save pairs
//! - Every port has a no-op implementation for tests and headless contexts

pub mod cache;
pub mod generation;
pub mod preferences;
pub mod session;

use thiserror::Error;

pub use cache::{LocatorCache, NoopLocatorCache};
pub use generation::GenerationBackend;
pub use preferences::{NoopPreferencesStore, PreferencesStore};
pub use session::{Bookmark, NoopSessionStore, SessionStore};

/// Error returned by storage ports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The underlying storage failed (I/O, database, browser storage).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
