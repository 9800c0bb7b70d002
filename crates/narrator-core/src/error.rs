//! Core error types.
//!
//! Generation errors are designed to be serializable and clonable so they
//! can travel inside events to any UI without depending on transport error
//! types like `reqwest::Error`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by a generation backend for a single paragraph.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GenerationError {
    /// The backend could not be reached (connection refused, DNS, timeout).
    #[error("Generation backend unreachable: {message}")]
    Unreachable {
        /// Detailed error message.
        message: String,
    },

    /// The backend answered with a non-success status.
    #[error("Generation server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The backend answered but the response carried no usable locator.
    #[error("Invalid generation response: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
    },

    /// The request was aborted by `stop`/`reset`. Never reported to listeners.
    #[error("Generation cancelled")]
    Cancelled,

    /// Anything else.
    #[error("Generation failed: {message}")]
    Other {
        /// Detailed error message.
        message: String,
    },
}

impl GenerationError {
    /// Create an `Other` error from any message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Create an `Unreachable` error from any message.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    /// Whether this error points at the whole backend rather than one paragraph.
    pub const fn is_systemic(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Invalid buffering configuration.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Minimum buffer size must be at least 1, got {0}")]
    MinBufferTooSmall(usize),

    #[error("Target buffer size ({target}) must be >= minimum buffer size ({min})")]
    TargetBelowMin { target: usize, min: usize },

    #[error("Target buffer size must be at most 50, got {0}")]
    TargetTooLarge(usize),

    #[error("Only one concurrent generation is supported, got {0}")]
    UnsupportedConcurrency(usize),
}
