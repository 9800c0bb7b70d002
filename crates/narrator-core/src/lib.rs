#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod address;
pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod paragraph;
pub mod ports;
pub mod settings;
pub mod state;

// Re-export commonly used types for convenience
pub use address::resolve_locator;
pub use buffer::{BufferPolicy, BufferStatus};
pub use config::{
    AudioSettings, BufferedPlaybackConfig, DEFAULT_MIN_BUFFER_SIZE, DEFAULT_TARGET_BUFFER_SIZE,
    GenerationRetryPolicy, MAX_CONCURRENT_GENERATIONS,
};
pub use error::{ConfigError, GenerationError};
pub use events::{GenerationEvent, GenerationListener, PlaybackEvent};
pub use paragraph::{GenerationParams, ParagraphIndex, Paragraphs, ResourceLocator};
pub use ports::{
    Bookmark, GenerationBackend, LocatorCache, NoopLocatorCache, NoopPreferencesStore,
    NoopSessionStore, PreferencesStore, SessionStore, StoreError,
};
pub use settings::{DEFAULT_SERVER_URL, NarratorSettings, SettingsUpdate};
pub use state::{BufferedPlaybackState, PlaybackStatus};
