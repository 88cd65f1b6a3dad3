//! Session-level domain types: status, generation ids, turns, snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::KioskAction;

/// Identifier of one recognition-stream instance.
///
/// Every (re)start of speech capture advances the session's generation.
/// Callbacks carry the generation they were bound to and are discarded once
/// it is no longer current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// The generation before any recognition instance has been started.
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The generation that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Live status of the dialogue session, rendered by the host as an indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Voice mode is off.
    #[default]
    Idle,
    /// Microphone open, waiting for the citizen to speak.
    Listening,
    /// A committed transcript is being resolved into a reply.
    Processing,
    /// A spoken reply or re-prompt is playing.
    Speaking,
}

impl SessionStatus {
    /// Lower-case label used in logs and wire payloads.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
        }
    }
}

/// One completed user-utterance / assistant-reply pair.
///
/// Appended to the session history when the turn finishes and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub user_text: String,
    pub reply_text: String,
    pub action: KioskAction,
    pub timestamp: DateTime<Utc>,
    /// The citizen spoke over the reply before it finished.
    #[serde(default)]
    pub interrupted: bool,
}

/// Read-only view of the session for the host UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub active: bool,
    pub status: SessionStatus,
    pub generation: Generation,
    pub language: String,
    pub last_transcript: Option<String>,
    pub last_reply: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_advances_monotonically() {
        let g = Generation::ZERO;
        assert!(g.next() > g);
        assert_eq!(g.next().next().value(), 2);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Speaking).unwrap();
        assert_eq!(json, "\"speaking\"");
        assert_eq!(SessionStatus::default(), SessionStatus::Idle);
    }

    #[test]
    fn snapshot_uses_camel_case() {
        let snapshot = SessionSnapshot {
            active: true,
            last_transcript: Some("water bill".into()),
            ..SessionSnapshot::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["lastTranscript"], "water bill");
        assert_eq!(value["status"], "idle");
    }
}
