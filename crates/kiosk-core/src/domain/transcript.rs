//! Transcript events produced by speech capture.

use serde::{Deserialize, Serialize};

use super::session::Generation;

/// A single recognition result, interim or final.
///
/// Ephemeral: consumed by the controller as soon as it arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    /// Recognizer confidence in `0.0..=1.0`, `None` when the platform does not report one.
    pub confidence: Option<f32>,
    /// The recognition instance that produced this event.
    pub generation: Generation,
}

impl TranscriptEvent {
    #[must_use]
    pub fn interim(text: impl Into<String>, confidence: Option<f32>, generation: Generation) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            confidence,
            generation,
        }
    }

    #[must_use]
    pub fn final_result(
        text: impl Into<String>,
        confidence: Option<f32>,
        generation: Generation,
    ) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            confidence,
            generation,
        }
    }

    /// Number of characters in the trimmed text.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.trim().chars().count()
    }

    /// Whether the reported confidence (if any) is at least `threshold`.
    ///
    /// Unknown confidence passes.
    #[must_use]
    pub fn confidence_at_least(&self, threshold: f32) -> bool {
        self.confidence.is_none_or(|c| c >= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_len_ignores_surrounding_whitespace() {
        let event = TranscriptEvent::final_result("  stop ", Some(0.6), Generation::ZERO);
        assert_eq!(event.char_len(), 4);
    }

    #[test]
    fn unknown_confidence_passes_threshold() {
        let event = TranscriptEvent::interim("hello", None, Generation::ZERO);
        assert!(event.confidence_at_least(0.9));

        let low = TranscriptEvent::interim("hello", Some(0.2), Generation::ZERO);
        assert!(!low.confidence_at_least(0.3));
    }
}
