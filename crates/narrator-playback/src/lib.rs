#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// Used only by integration tests
#[cfg(test)]
use {async_trait as _, mockall as _, tokio_test as _};

mod bookmark;
mod coordinator;
mod element;
mod engine;
mod error;
mod platform;

#[cfg(feature = "rodio")]
pub mod native;

pub use bookmark::BOOKMARK_INTERVAL;
pub use coordinator::{Coordinator, CoordinatorDeps};
pub use element::{
    AudioElement, AudioElementFactory, ElementEvent, ElementEventKind, ElementEventSender,
    ElementToken,
};
pub use engine::{AudioEvent, AudioPlaybackEngine};
pub use error::{CoordinatorError, PlaybackError};
pub use platform::{DesktopPlatform, PlatformAdapter, SingleElementPlatform};
