//! Runtime configuration for the voice controller.
//!
//! Each component takes its own config struct. [`VoiceControllerConfig`]
//! bundles them and is built from validated [`VoiceSettings`].

use std::time::Duration;

use kiosk_core::settings::{
    DEFAULT_BARGE_IN_FINAL_MIN_CHARS, DEFAULT_BARGE_IN_FINAL_MIN_CONFIDENCE,
    DEFAULT_BARGE_IN_INTERIM_MIN_CHARS, DEFAULT_HISTORY_CAP, DEFAULT_REMOTE_ATTEMPTS_PER_TIER,
    DEFAULT_REPROMPT_MAX,
};
use kiosk_core::{SettingsError, VoiceSettings, validate_settings};
use serde::{Deserialize, Serialize};

/// Words that never make an utterance on their own.
pub const DEFAULT_FILLERS: &[&str] = &["um", "uh", "hmm", "mm", "ah", "er", "uhh", "umm", "hm"];

/// Lowest interim-transcript confidence that interrupts playback.
pub const DEFAULT_BARGE_IN_INTERIM_MIN_CONFIDENCE: f32 = 0.3;

/// Recognition supervision and transcript commit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Inactivity after the last interim result before it is committed.
    pub debounce: Duration,
    pub min_utterance_chars: usize,
    pub discard_confidence: f32,
    pub ambiguous_confidence: f32,
    pub fillers: Vec<String>,
    /// Restart delay after the stream ends on its own.
    pub natural_end_restart: Duration,
    /// Restart delay after `no-speech` or `aborted`.
    pub benign_error_restart: Duration,
    /// Restart delay after the first real failure; grows with each
    /// consecutive failure.
    pub error_restart: Duration,
    pub max_error_restart: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        let settings = VoiceSettings::default();
        Self {
            debounce: settings.effective_debounce(),
            min_utterance_chars: settings.effective_min_utterance_chars(),
            discard_confidence: settings.effective_discard_confidence(),
            ambiguous_confidence: settings.effective_ambiguous_confidence(),
            fillers: DEFAULT_FILLERS.iter().map(ToString::to_string).collect(),
            natural_end_restart: Duration::from_millis(250),
            benign_error_restart: Duration::from_millis(150),
            error_restart: Duration::from_millis(800),
            max_error_restart: Duration::from_secs(5),
        }
    }
}

impl RecognitionConfig {
    /// Restart delay after `failures` consecutive real failures.
    #[must_use]
    pub fn failure_backoff(&self, failures: u32) -> Duration {
        self.error_restart
            .saturating_mul(failures.max(1))
            .min(self.max_error_restart)
    }
}

/// Playback safety-timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub timeout_floor: Duration,
    pub per_char: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let settings = VoiceSettings::default();
        Self {
            timeout_floor: settings.effective_playback_floor(),
            per_char: settings.effective_playback_per_char(),
        }
    }
}

impl PlaybackConfig {
    /// Upper bound on how long `text` may take to speak.
    #[must_use]
    pub fn safety_timeout(&self, text: &str) -> Duration {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        self.timeout_floor
            .saturating_add(self.per_char.saturating_mul(chars))
    }
}

/// Barge-in thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BargeInConfig {
    pub final_min_chars: usize,
    pub final_min_confidence: f32,
    pub interim_min_chars: usize,
    pub interim_min_confidence: f32,
}

impl Default for BargeInConfig {
    fn default() -> Self {
        Self {
            final_min_chars: DEFAULT_BARGE_IN_FINAL_MIN_CHARS,
            final_min_confidence: DEFAULT_BARGE_IN_FINAL_MIN_CONFIDENCE,
            interim_min_chars: DEFAULT_BARGE_IN_INTERIM_MIN_CHARS,
            interim_min_confidence: DEFAULT_BARGE_IN_INTERIM_MIN_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RePromptConfig {
    pub silence: Duration,
    pub max_prompts: u32,
}

impl Default for RePromptConfig {
    fn default() -> Self {
        Self {
            silence: VoiceSettings::default().effective_reprompt_silence(),
            max_prompts: DEFAULT_REPROMPT_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    pub tick: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            tick: VoiceSettings::default().effective_health_tick(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub history_cap: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

/// Bounded retry policy for the remote dialogue service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub attempts_per_tier: u32,
    pub attempt_timeout: Duration,
    /// Pause after a rate-limited attempt before the next credential is tried.
    pub rate_limit_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_tier: DEFAULT_REMOTE_ATTEMPTS_PER_TIER,
            attempt_timeout: VoiceSettings::default().effective_remote_attempt_timeout(),
            rate_limit_pause: Duration::from_millis(250),
        }
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceControllerConfig {
    /// Default session language when activation does not name one.
    pub language: String,
    pub accessibility_mode: bool,
    pub recognition: RecognitionConfig,
    pub playback: PlaybackConfig,
    pub barge_in: BargeInConfig,
    pub reprompt: RePromptConfig,
    pub health: HealthConfig,
    pub orchestrator: OrchestratorConfig,
    pub retry: RetryPolicy,
}

impl Default for VoiceControllerConfig {
    fn default() -> Self {
        Self {
            language: VoiceSettings::default().effective_language().to_string(),
            accessibility_mode: false,
            recognition: RecognitionConfig::default(),
            playback: PlaybackConfig::default(),
            barge_in: BargeInConfig::default(),
            reprompt: RePromptConfig::default(),
            health: HealthConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl VoiceControllerConfig {
    /// Build a configuration from settings, validating them first.
    pub fn from_settings(settings: &VoiceSettings) -> Result<Self, SettingsError> {
        validate_settings(settings)?;

        let defaults = Self::default();
        Ok(Self {
            language: settings.effective_language().to_string(),
            accessibility_mode: settings.accessibility_mode.unwrap_or(false),
            recognition: RecognitionConfig {
                debounce: settings.effective_debounce(),
                min_utterance_chars: settings.effective_min_utterance_chars(),
                discard_confidence: settings.effective_discard_confidence(),
                ambiguous_confidence: settings.effective_ambiguous_confidence(),
                ..defaults.recognition
            },
            playback: PlaybackConfig {
                timeout_floor: settings.effective_playback_floor(),
                per_char: settings.effective_playback_per_char(),
            },
            barge_in: BargeInConfig {
                final_min_chars: settings
                    .barge_in_final_min_chars
                    .unwrap_or(defaults.barge_in.final_min_chars),
                final_min_confidence: settings
                    .barge_in_final_min_confidence
                    .unwrap_or(defaults.barge_in.final_min_confidence),
                interim_min_chars: settings
                    .barge_in_interim_min_chars
                    .unwrap_or(defaults.barge_in.interim_min_chars),
                interim_min_confidence: defaults.barge_in.interim_min_confidence,
            },
            reprompt: RePromptConfig {
                silence: settings.effective_reprompt_silence(),
                max_prompts: settings
                    .reprompt_max
                    .unwrap_or(defaults.reprompt.max_prompts),
            },
            health: HealthConfig {
                tick: settings.effective_health_tick(),
            },
            orchestrator: OrchestratorConfig {
                history_cap: settings
                    .history_cap
                    .unwrap_or(defaults.orchestrator.history_cap),
            },
            retry: RetryPolicy {
                attempts_per_tier: settings
                    .remote_attempts_per_tier
                    .unwrap_or(defaults.retry.attempts_per_tier),
                attempt_timeout: settings.effective_remote_attempt_timeout(),
                ..defaults.retry
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_settings_defaults() {
        let from_settings =
            VoiceControllerConfig::from_settings(&VoiceSettings::with_defaults()).unwrap();
        assert_eq!(from_settings, VoiceControllerConfig::default());
    }

    #[test]
    fn test_from_settings_rejects_invalid() {
        let settings = VoiceSettings {
            history_cap: Some(0),
            ..Default::default()
        };
        assert_eq!(
            VoiceControllerConfig::from_settings(&settings),
            Err(SettingsError::InvalidHistoryCap(0))
        );
    }

    #[test]
    fn test_from_settings_overrides() {
        let settings = VoiceSettings {
            language: Some("hi-IN".into()),
            reprompt_max: Some(1),
            debounce_ms: Some(800),
            ..Default::default()
        };
        let config = VoiceControllerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.language, "hi-IN");
        assert_eq!(config.reprompt.max_prompts, 1);
        assert_eq!(config.recognition.debounce, Duration::from_millis(800));
        assert_eq!(config.recognition.fillers.len(), DEFAULT_FILLERS.len());
    }

    #[test]
    fn test_safety_timeout_scales_with_length() {
        let config = PlaybackConfig::default();
        assert_eq!(config.safety_timeout(""), Duration::from_secs(4));
        assert_eq!(config.safety_timeout("abcdefghij"), Duration::from_millis(4_900));
    }

    #[test]
    fn test_failure_backoff_is_capped() {
        let config = RecognitionConfig::default();
        assert_eq!(config.failure_backoff(0), Duration::from_millis(800));
        assert_eq!(config.failure_backoff(2), Duration::from_millis(1_600));
        assert_eq!(config.failure_backoff(50), Duration::from_secs(5));
    }
}
