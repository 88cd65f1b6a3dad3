//! Transcript commit rules.
//!
//! Decides which recognised text becomes a turn, and buffers interim text
//! until either a final result arrives or the debounce window elapses.

use tokio_util::sync::CancellationToken;

use crate::config::RecognitionConfig;
use crate::text;

/// Outcome of checking one candidate utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    Accept,
    /// Accepted, but confidence fell in the ambiguous band.
    AcceptAmbiguous,
    TooShort,
    Filler,
    LowConfidence,
}

impl CommitDecision {
    #[cfg(test)]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accept | Self::AcceptAmbiguous)
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptFilter {
    min_chars: usize,
    discard_below: f32,
    ambiguous_below: f32,
    fillers: Vec<String>,
}

impl TranscriptFilter {
    pub fn new(config: &RecognitionConfig) -> Self {
        Self {
            min_chars: config.min_utterance_chars,
            discard_below: config.discard_confidence,
            ambiguous_below: config.ambiguous_confidence,
            fillers: config.fillers.iter().map(|f| text::normalize(f)).collect(),
        }
    }

    /// Check a candidate. Unknown confidence is treated as acceptable.
    pub fn evaluate(&self, candidate: &str, confidence: Option<f32>) -> CommitDecision {
        let trimmed = candidate.trim();
        if trimmed.chars().count() < self.min_chars {
            return CommitDecision::TooShort;
        }
        if text::is_filler(&text::normalize(trimmed), &self.fillers) {
            return CommitDecision::Filler;
        }
        match confidence {
            Some(c) if c < self.discard_below => CommitDecision::LowConfidence,
            Some(c) if c < self.ambiguous_below => CommitDecision::AcceptAmbiguous,
            _ => CommitDecision::Accept,
        }
    }
}

/// Interim text waiting on the debounce timer.
///
/// Each update issues a new ticket; only the timer armed for the latest
/// ticket may flush the buffer.
#[derive(Debug, Default)]
pub struct PendingTranscript {
    text: Option<String>,
    confidence: Option<f32>,
    ticket: u64,
    timer: Option<CancellationToken>,
}

impl PendingTranscript {
    /// Replace the buffered text and return the ticket for the new timer.
    pub fn update(&mut self, text: &str, confidence: Option<f32>) -> u64 {
        self.cancel_timer();
        self.ticket += 1;
        self.text = Some(text.to_string());
        self.confidence = confidence;
        self.ticket
    }

    pub fn set_timer(&mut self, timer: CancellationToken) {
        self.cancel_timer();
        self.timer = Some(timer);
    }

    /// Take the buffer if `ticket` is still the latest.
    pub fn take_if(&mut self, ticket: u64) -> Option<(String, Option<f32>)> {
        if ticket != self.ticket {
            return None;
        }
        self.timer = None;
        self.text.take().map(|text| (text, self.confidence.take()))
    }

    /// Take whatever is buffered, regardless of ticket.
    pub fn flush(&mut self) -> Option<(String, Option<f32>)> {
        self.cancel_timer();
        self.ticket += 1;
        self.text.take().map(|text| (text, self.confidence.take()))
    }

    pub fn clear(&mut self) {
        self.flush();
    }

    pub const fn is_empty(&self) -> bool {
        self.text.is_none()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
