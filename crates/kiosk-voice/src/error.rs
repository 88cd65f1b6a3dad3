//! Voice controller error types.

use kiosk_core::SettingsError;

/// Errors surfaced to the host by the voice controller.
///
/// Only activation can fail from the host's point of view; failures inside a
/// running session are recovered without surfacing.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// A voice session is already active.
    #[error("Voice session is already active")]
    AlreadyActive,

    /// Settings failed validation.
    #[error("Invalid voice settings: {0}")]
    InvalidConfig(#[from] SettingsError),
}
