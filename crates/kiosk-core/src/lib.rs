//! Core domain types and port definitions for the kiosk voice controller.
//!
//! `kiosk-core` has no runtime or I/O dependencies. It defines:
//!
//! - [`domain`] - session status, generation ids, transcripts, turns, and the
//!   closed [`KioskAction`] vocabulary
//! - [`ports`] - traits for every external collaborator (speech capture,
//!   speech synthesis, remote dialogue service, local knowledge base, action
//!   executor, page context)
//! - [`settings`] - serialisable tunables with validation

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    Answer, Generation, KioskAction, Language, PaymentMethod, Screen, SessionSnapshot,
    SessionStatus, TranscriptEvent, Turn,
};
pub use ports::{
    ActionExecutor, CaptureError, Credential, DialogueError, DialogueRequest, DialogueResponse,
    EmptyKnowledgeBase, HistoryEntry, KnowledgeBase, KnowledgeReply, ModelTier,
    NoopActionExecutor, PageContextProvider, RecognitionErrorKind, RecognitionEvent,
    RecognitionSink, RemoteDialogueService, SpeechCapture, SpeechSynthesizer, StaticPageContext,
    SynthesisError,
};
pub use settings::{SettingsError, VoiceSettings, validate_settings};

// Silence unused dev-dependency warnings; tokio is used by the integration tests
#[cfg(test)]
use tokio as _;
