//! Continuous voice-dialogue controller for the civic-services kiosk.
//!
//! Keeps a speech-recognition stream alive for the whole session, resolves
//! committed transcripts into spoken replies and kiosk actions, lets the
//! citizen interrupt playback, re-prompts on silence and restarts
//! recognition when the platform stream dies without telling anyone.
//!
//! The entry point is [`VoiceController`]. Platform speech, the remote
//! dialogue service and the host UI are reached through the ports defined in
//! `kiosk-core`.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod knowledge;
pub mod offline;
pub mod phrases;
pub mod remote;
pub mod resolver;
pub mod text;

mod barge_in;
mod commit;
mod health;
mod mailbox;
mod orchestrator;
mod playback;
mod recognition;
mod reprompt;
mod session;

// Re-export key types for convenience
pub use config::{RetryPolicy, VoiceControllerConfig};
pub use controller::{ActivationOptions, VoiceController, VoiceDependencies};
pub use error::VoiceError;
pub use events::VoiceEvent;
pub use knowledge::{KeywordKnowledgeBase, KnowledgeEntry, LocalizedText};
pub use phrases::Phrasebook;
pub use remote::HttpDialogueService;
pub use resolver::{CredentialPool, RemoteChain, Resolution, ResolutionSource, ResponseResolver};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
