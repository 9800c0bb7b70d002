//! Settings domain types.
//!
//! These are pure domain types with no infrastructure dependencies. The CLI
//! persists them as JSON; other front ends may store them however they like.

use serde::{Deserialize, Serialize};

use crate::config::{AudioSettings, BufferedPlaybackConfig};
use crate::error::ConfigError;
use crate::paragraph::GenerationParams;

/// Default generation server address.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Application settings.
///
/// Missing fields fall back to defaults so older settings files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarratorSettings {
    /// Base URL of the generation server; locators resolve against it.
    pub server_url: String,

    /// Parameters sent with each generation request.
    pub generation: GenerationParams,

    /// Client-side playback settings.
    pub audio: AudioSettings,

    /// Buffering thresholds.
    pub buffer: BufferedPlaybackConfig,
}

impl Default for NarratorSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            generation: GenerationParams::default(),
            audio: AudioSettings::default(),
            buffer: BufferedPlaybackConfig::default(),
        }
    }
}

impl NarratorSettings {
    /// Merge a partial update, only touching fields that are `Some`.
    pub fn merge(&mut self, update: &SettingsUpdate) {
        if let Some(ref url) = update.server_url {
            self.server_url.clone_from(url);
        }
        if let Some(ref voice) = update.voice {
            self.generation.voice.clone_from(voice);
        }
        if let Some(ref language) = update.language {
            self.generation.language.clone_from(language);
        }
        if let Some(speed) = update.generation_speed {
            self.generation.speed = speed;
        }
        if let Some(temperature) = update.temperature {
            self.generation.temperature = temperature;
        }
        if let Some(speed) = update.playback_speed {
            self.audio.speed = speed;
        }
        if let Some(preserves_pitch) = update.preserves_pitch {
            self.audio.preserves_pitch = preserves_pitch;
        }
        if let Some(target) = update.target_buffer_size {
            self.buffer.target_buffer_size = target;
        }
        if let Some(min) = update.min_buffer_size {
            self.buffer.min_buffer_size = min;
        }
    }

    /// Validate the buffering section.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        self.buffer.validate()
    }
}

/// Partial settings update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub server_url: Option<String>,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub generation_speed: Option<f32>,
    pub temperature: Option<f32>,
    pub playback_speed: Option<f32>,
    pub preserves_pitch: Option<bool>,
    pub target_buffer_size: Option<usize>,
    pub min_buffer_size: Option<usize>,
}

impl SettingsUpdate {
    /// Whether the update changes anything that invalidates generated audio.
    pub const fn touches_generation(&self) -> bool {
        self.voice.is_some()
            || self.language.is_some()
            || self.generation_speed.is_some()
            || self.temperature.is_some()
    }
}
