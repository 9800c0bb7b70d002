#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// Used only by integration tests
#[cfg(test)]
use tokio_test as _;

mod cache;
mod controller;
mod error;
mod http;

pub use cache::InMemoryLocatorCache;
pub use controller::GenerationController;
pub use error::ControllerError;
pub use http::HttpGenerationBackend;
