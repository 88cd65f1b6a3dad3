//! Events published to the host while a session runs.

use kiosk_core::{Generation, KioskAction, SessionStatus};
use serde::Serialize;

/// Notifications from the voice session, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    StateChanged { status: SessionStatus },
    InterimTranscript { text: String },
    TranscriptCommitted { text: String },
    ReplyStarted { text: String },
    /// The citizen spoke over a reply and playback was cut.
    BargeIn { text: String },
    RePrompt { index: u32 },
    RecognitionStarted { generation: Generation },
    ActionDispatched { action: KioskAction },
    Deactivated,
}
