//! Paragraph-level domain types.
//!
//! A session is a fixed, ordered list of paragraphs. Each paragraph maps 1:1
//! to one generated audio resource, identified by an opaque
//! [`ResourceLocator`] returned by the generation backend.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Position of a paragraph within the session, in `[0, len)`.
pub type ParagraphIndex = usize;

/// Opaque reference to a generated audio artifact.
///
/// Usually a server-relative path such as `/audio/3f2a.wav`. The coordinator
/// never interprets it beyond resolving it against the server base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLocator(String);

impl ResourceLocator {
    /// Wrap a locator string as returned by the backend.
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// The raw locator string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceLocator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceLocator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Parameters sent with every generation request.
///
/// Changing any of these invalidates previously generated audio, so the
/// coordinator compares [`fingerprint`](Self::fingerprint)s to decide whether
/// a session reload needs a full reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    /// Voice identifier understood by the backend.
    pub voice: String,

    /// Language code (e.g. `"en"`).
    pub language: String,

    /// Server-side speaking rate multiplier.
    pub speed: f32,

    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            voice: "default".to_string(),
            language: "en".to_string(),
            speed: 1.0,
            temperature: 0.8,
        }
    }
}

impl GenerationParams {
    /// Stable hex digest of the parameters.
    ///
    /// Floats are hashed through their bit pattern so that the digest does
    /// not depend on formatting.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.voice.as_bytes());
        hasher.update([0]);
        hasher.update(self.language.as_bytes());
        hasher.update([0]);
        hasher.update(self.speed.to_bits().to_le_bytes());
        hasher.update(self.temperature.to_bits().to_le_bytes());

        hasher
            .finalize()
            .iter()
            .fold(String::with_capacity(64), |mut out, b| {
                use std::fmt::Write;
                let _ = write!(out, "{b:02x}");
                out
            })
    }
}

/// Immutable, cheaply clonable paragraph list for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraphs(Arc<[String]>);

impl Paragraphs {
    /// Build a paragraph list, dropping paragraphs that are only whitespace.
    pub fn new<I, S>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            paragraphs
                .into_iter()
                .map(Into::into)
                .filter(|p| !p.trim().is_empty())
                .collect(),
        )
    }

    /// Split plain text into paragraphs on blank lines.
    ///
    /// Lines within a paragraph are joined with a single space.
    pub fn from_text(text: &str) -> Self {
        let mut paragraphs = Vec::new();
        let mut current = String::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                }
                continue;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line);
        }
        if !current.is_empty() {
            paragraphs.push(current);
        }

        Self::new(paragraphs)
    }

    /// Number of paragraphs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text of the paragraph at `index`.
    pub fn get(&self, index: ParagraphIndex) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Index of the last paragraph, if any.
    pub fn last_index(&self) -> Option<ParagraphIndex> {
        self.0.len().checked_sub(1)
    }

    /// Iterate over paragraph texts.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
