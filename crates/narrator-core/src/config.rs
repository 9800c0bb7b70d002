//! Playback configuration types and validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of paragraphs to keep generated ahead of the listener.
pub const DEFAULT_TARGET_BUFFER_SIZE: usize = 3;

/// Default minimum look-ahead before playback may start.
pub const DEFAULT_MIN_BUFFER_SIZE: usize = 1;

/// The generation service accepts one request at a time.
pub const MAX_CONCURRENT_GENERATIONS: usize = 1;

/// Upper bound accepted for `target_buffer_size`.
pub const MAX_TARGET_BUFFER_SIZE: usize = 50;

/// Buffering thresholds, persisted as a user preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferedPlaybackConfig {
    /// Paragraphs the controller keeps generated ahead of the cursor.
    pub target_buffer_size: usize,

    /// Paragraphs required ahead of the cursor before playback (re)starts.
    pub min_buffer_size: usize,

    /// Concurrent generation requests. Always 1; the remote service cannot
    /// handle more without protocol changes.
    pub max_concurrent: usize,
}

impl Default for BufferedPlaybackConfig {
    fn default() -> Self {
        Self {
            target_buffer_size: DEFAULT_TARGET_BUFFER_SIZE,
            min_buffer_size: DEFAULT_MIN_BUFFER_SIZE,
            max_concurrent: MAX_CONCURRENT_GENERATIONS,
        }
    }
}

impl BufferedPlaybackConfig {
    /// Build a config with the given thresholds.
    pub const fn new(target_buffer_size: usize, min_buffer_size: usize) -> Self {
        Self {
            target_buffer_size,
            min_buffer_size,
            max_concurrent: MAX_CONCURRENT_GENERATIONS,
        }
    }

    /// Check the invariants `1 <= min <= target <= 50` and `max_concurrent == 1`.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.min_buffer_size < 1 {
            return Err(ConfigError::MinBufferTooSmall(self.min_buffer_size));
        }
        if self.target_buffer_size < self.min_buffer_size {
            return Err(ConfigError::TargetBelowMin {
                target: self.target_buffer_size,
                min: self.min_buffer_size,
            });
        }
        if self.target_buffer_size > MAX_TARGET_BUFFER_SIZE {
            return Err(ConfigError::TargetTooLarge(self.target_buffer_size));
        }
        if self.max_concurrent != MAX_CONCURRENT_GENERATIONS {
            return Err(ConfigError::UnsupportedConcurrency(self.max_concurrent));
        }
        Ok(())
    }
}

/// Client-side playback settings applied by the audio engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    /// Playback rate multiplier (0.5–3.0).
    pub speed: f32,

    /// Keep pitch constant when `speed != 1.0`, where the element supports it.
    pub preserves_pitch: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            preserves_pitch: true,
        }
    }
}

impl AudioSettings {
    /// Minimum accepted playback rate.
    pub const MIN_SPEED: f32 = 0.5;
    /// Maximum accepted playback rate.
    pub const MAX_SPEED: f32 = 3.0;

    /// Copy with `speed` clamped into the supported range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            speed: self.speed.clamp(Self::MIN_SPEED, Self::MAX_SPEED),
            preserves_pitch: self.preserves_pitch,
        }
    }
}

/// Retry schedule for failed generation requests.
///
/// The first request is followed by up to `max_retries` retries. Retry `n`
/// (zero-based) waits `base_delay * 2^n` first, so the defaults wait
/// 1s, 2s and 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRetryPolicy {
    /// Retries after the first failed request.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
}

impl Default for GenerationRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl GenerationRetryPolicy {
    /// Backoff delay before the given zero-based retry.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BufferedPlaybackConfig::default();
        assert_eq!(config.target_buffer_size, 3);
        assert_eq!(config.min_buffer_size, 1);
        assert_eq!(config.max_concurrent, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn min_must_be_positive() {
        let config = BufferedPlaybackConfig::new(3, 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinBufferTooSmall(0))
        ));
    }

    #[test]
    fn target_must_cover_min() {
        let config = BufferedPlaybackConfig::new(2, 3);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TargetBelowMin { target: 2, min: 3 })
        ));
        assert!(BufferedPlaybackConfig::new(3, 3).validate().is_ok());
    }

    #[test]
    fn concurrency_is_fixed_at_one() {
        let config = BufferedPlaybackConfig {
            max_concurrent: 2,
            ..BufferedPlaybackConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedConcurrency(2))
        ));
    }

    #[test]
    fn target_has_upper_bound() {
        assert!(BufferedPlaybackConfig::new(51, 1).validate().is_err());
        assert!(BufferedPlaybackConfig::new(50, 1).validate().is_ok());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: BufferedPlaybackConfig =
            serde_json::from_str(r#"{"targetBufferSize": 5}"#).unwrap();
        assert_eq!(config.target_buffer_size, 5);
        assert_eq!(config.min_buffer_size, DEFAULT_MIN_BUFFER_SIZE);
        assert_eq!(config.max_concurrent, 1);
    }

    #[test]
    fn retry_delays_double() {
        let policy = GenerationRetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn audio_speed_is_clamped() {
        let settings = AudioSettings {
            speed: 5.0,
            preserves_pitch: false,
        }
        .clamped();
        assert!((settings.speed - AudioSettings::MAX_SPEED).abs() < f32::EPSILON);
        assert!(!settings.preserves_pitch);
    }
}
