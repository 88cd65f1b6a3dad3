//! Speech synthesis port - the platform's text-to-speech sink.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by the synthesis sink.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    #[error("No voice available for language '{0}'")]
    NoVoice(String),

    #[error("Speech synthesis failed: {0}")]
    Failed(String),

    #[error("Speech synthesis interrupted")]
    Interrupted,
}

/// Port trait for spoken output.
///
/// `speak` resolves when the utterance finishes. Some platforms never signal
/// completion, so callers must not rely on the future resolving.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` in the voice for `language` (a BCP-47 tag).
    async fn speak(&self, text: &str, language: &str) -> Result<(), SynthesisError>;

    /// Stop whatever is being spoken right now.
    fn cancel(&self);
}
