//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces that the voice controller expects from the
//! platform and the host application. They contain no implementation
//! details and use only domain types.
//!
//! # Design Rules
//!
//! - No audio, HTTP, or UI types in any signature
//! - Traits are `Send + Sync` so adapters can be shared across tasks
//! - Each port owns its error enum

pub mod dialogue;
pub mod host;
pub mod knowledge;
pub mod speech;
pub mod synthesis;

pub use dialogue::{
    Credential, DialogueError, DialogueRequest, DialogueResponse, HistoryEntry, ModelTier,
    RemoteDialogueService,
};
pub use host::{ActionExecutor, NoopActionExecutor, PageContextProvider, StaticPageContext};
pub use knowledge::{EmptyKnowledgeBase, KnowledgeBase, KnowledgeReply};
pub use speech::{CaptureError, RecognitionErrorKind, RecognitionEvent, RecognitionSink, SpeechCapture};
pub use synthesis::{SpeechSynthesizer, SynthesisError};
