//! Barge-in arbitration.
//!
//! Recognition keeps running while the kiosk speaks, so the recognizer hears
//! both the citizen and the kiosk's own voice. Only transcripts long and
//! confident enough to be deliberate speech interrupt playback.

use kiosk_core::{SessionStatus, TranscriptEvent};

use crate::config::BargeInConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BargeInDecision {
    Interrupt,
    Ignore,
}

#[derive(Debug, Clone, Copy)]
pub struct BargeInArbiter {
    config: BargeInConfig,
}

impl BargeInArbiter {
    pub const fn new(config: BargeInConfig) -> Self {
        Self { config }
    }

    /// Decide whether `event` heard during `status` should cut playback.
    ///
    /// Unknown confidence passes the confidence check.
    pub fn evaluate(&self, status: SessionStatus, event: &TranscriptEvent) -> BargeInDecision {
        if status != SessionStatus::Speaking {
            return BargeInDecision::Ignore;
        }

        let (min_chars, min_confidence) = if event.is_final {
            (self.config.final_min_chars, self.config.final_min_confidence)
        } else {
            (self.config.interim_min_chars, self.config.interim_min_confidence)
        };

        if event.char_len() >= min_chars && event.confidence_at_least(min_confidence) {
            BargeInDecision::Interrupt
        } else {
            BargeInDecision::Ignore
        }
    }
}
