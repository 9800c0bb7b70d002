//! Controller-level errors.
//!
//! Per-paragraph failures travel as [`narrator_core::GenerationError`] inside
//! listener callbacks. The errors here are returned synchronously from public
//! methods when a request cannot be accepted at all.

use thiserror::Error;

use narrator_core::ParagraphIndex;

/// A rejected controller request.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ControllerError {
    /// No paragraphs were loaded with `initialize`.
    #[error("No paragraphs loaded")]
    NoParagraphs,

    /// The requested start index does not exist.
    #[error("Paragraph {index} is out of range (session has {total} paragraphs)")]
    OutOfRange {
        index: ParagraphIndex,
        total: usize,
    },

    /// `start` lies after `end`.
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: ParagraphIndex,
        end: ParagraphIndex,
    },
}
