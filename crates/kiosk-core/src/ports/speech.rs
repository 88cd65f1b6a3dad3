//! Speech capture port - the platform's continuous speech-recognition stream.
//!
//! # Design Rules
//!
//! - A capture instance never talks to the controller directly; it reports
//!   through the [`RecognitionSink`] it was started with.
//! - Every sink is stamped with the generation it was created for, so the
//!   controller can discard callbacks from a superseded instance.
//! - `stop()` may be called on an instance that has already died; it must
//!   be a harmless no-op in that case.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::Generation;

/// Why a recognition instance stopped with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Nothing was heard before the platform gave up.
    NoSpeech,
    /// Capture was aborted (usually by our own `stop()`).
    Aborted,
    /// The microphone could not be read.
    AudioCapture,
    /// The recognition backend could not be reached.
    Network,
    /// Microphone permission was refused.
    NotAllowed,
    /// The recognition service is unavailable.
    ServiceUnavailable,
    /// Anything else the platform reports.
    Other(String),
}

impl RecognitionErrorKind {
    /// Benign stoppages are restarted quickly and never reported as failures.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::Aborted)
    }
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSpeech => f.write_str("no-speech"),
            Self::Aborted => f.write_str("aborted"),
            Self::AudioCapture => f.write_str("audio-capture"),
            Self::Network => f.write_str("network"),
            Self::NotAllowed => f.write_str("not-allowed"),
            Self::ServiceUnavailable => f.write_str("service-not-available"),
            Self::Other(other) => write!(f, "other: {other}"),
        }
    }
}

/// A callback from a running recognition instance.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Partial { text: String, confidence: Option<f32> },
    Final { text: String, confidence: Option<f32> },
    Error(RecognitionErrorKind),
    End,
}

type Deliver = Arc<dyn Fn(Generation, RecognitionEvent) + Send + Sync>;

/// Where a capture instance delivers its callbacks.
///
/// Cheap to clone; every clone reports under the same generation.
#[derive(Clone)]
pub struct RecognitionSink {
    generation: Generation,
    deliver: Deliver,
}

impl RecognitionSink {
    pub fn new(
        generation: Generation,
        deliver: impl Fn(Generation, RecognitionEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            generation,
            deliver: Arc::new(deliver),
        }
    }

    /// The generation this sink reports under.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    pub fn partial(&self, text: impl Into<String>, confidence: Option<f32>) {
        self.send(RecognitionEvent::Partial {
            text: text.into(),
            confidence,
        });
    }

    pub fn final_result(&self, text: impl Into<String>, confidence: Option<f32>) {
        self.send(RecognitionEvent::Final {
            text: text.into(),
            confidence,
        });
    }

    pub fn error(&self, kind: RecognitionErrorKind) {
        self.send(RecognitionEvent::Error(kind));
    }

    pub fn end(&self) {
        self.send(RecognitionEvent::End);
    }

    pub fn send(&self, event: RecognitionEvent) {
        (self.deliver)(self.generation, event);
    }
}

impl fmt::Debug for RecognitionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionSink")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Errors returned when a capture instance cannot be started.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Speech capture is already running")]
    AlreadyRunning,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Speech capture unavailable: {0}")]
    Unavailable(String),
}

/// Port trait for the continuous speech-recognition stream.
pub trait SpeechCapture: Send + Sync {
    /// Begin a new capture instance that reports through `sink`.
    fn start(&self, language: &str, sink: RecognitionSink) -> Result<(), CaptureError>;

    /// Abort the current instance, if any.
    fn stop(&self);

    /// Whether the platform believes an instance is still capturing.
    ///
    /// Distinct from "an instance object exists": a dead instance may never
    /// have reported its own end.
    fn is_capturing(&self) -> bool;
}
