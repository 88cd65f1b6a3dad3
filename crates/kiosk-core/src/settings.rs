//! Voice settings domain types and validation.
//!
//! This module contains the tunables of the voice controller as a pure,
//! serialisable type. All fields are optional so that a partial settings
//! file is valid; `effective_*` accessors supply the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default session language (BCP-47).
pub const DEFAULT_LANGUAGE: &str = "en-IN";

/// Inactivity interval after which buffered interim text is committed.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_200;

/// Shortest utterance (in characters) that is committed.
pub const DEFAULT_MIN_UTTERANCE_CHARS: usize = 2;

/// Confidence below which a final result is discarded.
pub const DEFAULT_DISCARD_CONFIDENCE: f32 = 0.35;

/// Upper bound of the "accepted but logged" confidence band.
pub const DEFAULT_AMBIGUOUS_CONFIDENCE: f32 = 0.6;

/// Base playback safety timeout.
pub const DEFAULT_PLAYBACK_FLOOR_MS: u64 = 4_000;

/// Per-character allowance added to the playback safety timeout.
pub const DEFAULT_PLAYBACK_MS_PER_CHAR: u64 = 90;

pub const DEFAULT_BARGE_IN_FINAL_MIN_CHARS: usize = 3;
pub const DEFAULT_BARGE_IN_FINAL_MIN_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_BARGE_IN_INTERIM_MIN_CHARS: usize = 12;

/// Silence window before a re-prompt is spoken.
pub const DEFAULT_REPROMPT_SILENCE_MS: u64 = 15_000;

/// Re-prompts spoken before the scheduler gives up.
pub const DEFAULT_REPROMPT_MAX: u32 = 3;

/// Liveness tick of the health monitor.
pub const DEFAULT_HEALTH_TICK_MS: u64 = 1_500;

/// Turns kept in session history.
pub const DEFAULT_HISTORY_CAP: usize = 10;

pub const DEFAULT_REMOTE_ATTEMPTS_PER_TIER: u32 = 3;
pub const DEFAULT_REMOTE_ATTEMPT_TIMEOUT_MS: u64 = 8_000;

/// Voice controller settings.
///
/// All fields are optional to support partial files and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceSettings {
    /// Session language as a BCP-47 tag (e.g. `"hi-IN"`).
    pub language: Option<String>,

    /// Send page context with every remote request for narration.
    pub accessibility_mode: Option<bool>,

    /// Inactivity (ms) after the last interim result before it is committed.
    pub debounce_ms: Option<u64>,

    /// Minimum committed utterance length in characters.
    pub min_utterance_chars: Option<usize>,

    /// Final results below this confidence are discarded.
    pub discard_confidence: Option<f32>,

    /// Final results below this confidence (and above the discard threshold)
    /// are accepted but logged as ambiguous.
    pub ambiguous_confidence: Option<f32>,

    /// Minimum playback safety timeout (ms).
    pub playback_timeout_floor_ms: Option<u64>,

    /// Playback safety timeout allowance per character (ms).
    pub playback_ms_per_char: Option<u64>,

    /// Shortest final transcript that interrupts playback.
    pub barge_in_final_min_chars: Option<usize>,

    /// Lowest final-transcript confidence that interrupts playback.
    pub barge_in_final_min_confidence: Option<f32>,

    /// Shortest interim transcript that interrupts playback.
    pub barge_in_interim_min_chars: Option<usize>,

    /// Silence (ms) after a completed turn before a re-prompt.
    pub reprompt_silence_ms: Option<u64>,

    /// Maximum consecutive re-prompts (1-10).
    pub reprompt_max: Option<u32>,

    /// Health monitor tick (ms, >= 100).
    pub health_tick_ms: Option<u64>,

    /// Session history cap (1-100).
    pub history_cap: Option<usize>,

    /// Remote attempts per model tier (1-10).
    pub remote_attempts_per_tier: Option<u32>,

    /// Timeout of a single remote attempt (ms).
    pub remote_attempt_timeout_ms: Option<u64>,
}

impl VoiceSettings {
    /// Create settings with every field set to its default.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            language: Some(DEFAULT_LANGUAGE.to_string()),
            accessibility_mode: Some(false),
            debounce_ms: Some(DEFAULT_DEBOUNCE_MS),
            min_utterance_chars: Some(DEFAULT_MIN_UTTERANCE_CHARS),
            discard_confidence: Some(DEFAULT_DISCARD_CONFIDENCE),
            ambiguous_confidence: Some(DEFAULT_AMBIGUOUS_CONFIDENCE),
            playback_timeout_floor_ms: Some(DEFAULT_PLAYBACK_FLOOR_MS),
            playback_ms_per_char: Some(DEFAULT_PLAYBACK_MS_PER_CHAR),
            barge_in_final_min_chars: Some(DEFAULT_BARGE_IN_FINAL_MIN_CHARS),
            barge_in_final_min_confidence: Some(DEFAULT_BARGE_IN_FINAL_MIN_CONFIDENCE),
            barge_in_interim_min_chars: Some(DEFAULT_BARGE_IN_INTERIM_MIN_CHARS),
            reprompt_silence_ms: Some(DEFAULT_REPROMPT_SILENCE_MS),
            reprompt_max: Some(DEFAULT_REPROMPT_MAX),
            health_tick_ms: Some(DEFAULT_HEALTH_TICK_MS),
            history_cap: Some(DEFAULT_HISTORY_CAP),
            remote_attempts_per_tier: Some(DEFAULT_REMOTE_ATTEMPTS_PER_TIER),
            remote_attempt_timeout_ms: Some(DEFAULT_REMOTE_ATTEMPT_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn effective_language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    #[must_use]
    pub fn effective_debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }

    #[must_use]
    pub fn effective_min_utterance_chars(&self) -> usize {
        self.min_utterance_chars
            .unwrap_or(DEFAULT_MIN_UTTERANCE_CHARS)
    }

    #[must_use]
    pub fn effective_discard_confidence(&self) -> f32 {
        self.discard_confidence.unwrap_or(DEFAULT_DISCARD_CONFIDENCE)
    }

    #[must_use]
    pub fn effective_ambiguous_confidence(&self) -> f32 {
        self.ambiguous_confidence
            .unwrap_or(DEFAULT_AMBIGUOUS_CONFIDENCE)
    }

    #[must_use]
    pub fn effective_playback_floor(&self) -> Duration {
        Duration::from_millis(
            self.playback_timeout_floor_ms
                .unwrap_or(DEFAULT_PLAYBACK_FLOOR_MS),
        )
    }

    #[must_use]
    pub fn effective_playback_per_char(&self) -> Duration {
        Duration::from_millis(
            self.playback_ms_per_char
                .unwrap_or(DEFAULT_PLAYBACK_MS_PER_CHAR),
        )
    }

    #[must_use]
    pub fn effective_reprompt_silence(&self) -> Duration {
        Duration::from_millis(
            self.reprompt_silence_ms
                .unwrap_or(DEFAULT_REPROMPT_SILENCE_MS),
        )
    }

    #[must_use]
    pub fn effective_health_tick(&self) -> Duration {
        Duration::from_millis(self.health_tick_ms.unwrap_or(DEFAULT_HEALTH_TICK_MS))
    }

    #[must_use]
    pub fn effective_remote_attempt_timeout(&self) -> Duration {
        Duration::from_millis(
            self.remote_attempt_timeout_ms
                .unwrap_or(DEFAULT_REMOTE_ATTEMPT_TIMEOUT_MS),
        )
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Language tag cannot be empty")]
    EmptyLanguage,

    #[error("Debounce must be between 200 and 5,000 ms, got {0}")]
    InvalidDebounce(u64),

    #[error("Confidence threshold '{name}' must be within 0.0..=1.0, got {value}")]
    ConfidenceOutOfRange { name: &'static str, value: f32 },

    #[error("Discard confidence ({discard}) must not exceed ambiguous confidence ({ambiguous})")]
    ConfidenceBandsInverted { discard: f32, ambiguous: f32 },

    #[error("Barge-in interim length ({interim}) must be at least the final length ({final_chars})")]
    BargeInThresholdsInverted { interim: usize, final_chars: usize },

    #[error("Re-prompt count must be between 1 and 10, got {0}")]
    InvalidRepromptCount(u32),

    #[error("Health tick must be at least 100 ms, got {0}")]
    InvalidHealthTick(u64),

    #[error("History cap must be between 1 and 100, got {0}")]
    InvalidHistoryCap(usize),

    #[error("Remote attempts per tier must be between 1 and 10, got {0}")]
    InvalidRemoteAttempts(u32),
}

/// Validate settings values.
pub fn validate_settings(settings: &VoiceSettings) -> Result<(), SettingsError> {
    if let Some(ref language) = settings.language {
        if language.trim().is_empty() {
            return Err(SettingsError::EmptyLanguage);
        }
    }

    if let Some(ms) = settings.debounce_ms {
        if !(200..=5_000).contains(&ms) {
            return Err(SettingsError::InvalidDebounce(ms));
        }
    }

    for (name, value) in [
        ("discard_confidence", settings.discard_confidence),
        ("ambiguous_confidence", settings.ambiguous_confidence),
        ("barge_in_final_min_confidence", settings.barge_in_final_min_confidence),
    ] {
        if let Some(value) = value {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::ConfidenceOutOfRange { name, value });
            }
        }
    }

    let discard = settings.effective_discard_confidence();
    let ambiguous = settings.effective_ambiguous_confidence();
    if discard > ambiguous {
        return Err(SettingsError::ConfidenceBandsInverted { discard, ambiguous });
    }

    let final_chars = settings
        .barge_in_final_min_chars
        .unwrap_or(DEFAULT_BARGE_IN_FINAL_MIN_CHARS);
    let interim = settings
        .barge_in_interim_min_chars
        .unwrap_or(DEFAULT_BARGE_IN_INTERIM_MIN_CHARS);
    if interim < final_chars {
        return Err(SettingsError::BargeInThresholdsInverted {
            interim,
            final_chars,
        });
    }

    if let Some(count) = settings.reprompt_max {
        if !(1..=10).contains(&count) {
            return Err(SettingsError::InvalidRepromptCount(count));
        }
    }

    if let Some(ms) = settings.health_tick_ms {
        if ms < 100 {
            return Err(SettingsError::InvalidHealthTick(ms));
        }
    }

    if let Some(cap) = settings.history_cap {
        if !(1..=100).contains(&cap) {
            return Err(SettingsError::InvalidHistoryCap(cap));
        }
    }

    if let Some(attempts) = settings.remote_attempts_per_tier {
        if !(1..=10).contains(&attempts) {
            return Err(SettingsError::InvalidRemoteAttempts(attempts));
        }
    }

    Ok(())
}
