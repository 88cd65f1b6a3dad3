//! Remote dialogue-understanding service port.
//!
//! # Design Rules
//!
//! - The service is an opaque request/response boundary: one transcript in,
//!   one reply plus free-form action out.
//! - Credentials and model tiers are chosen by the caller per attempt; the
//!   service implementation never retries on its own.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{KioskAction, Turn};

/// One prior exchange, as sent to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub user: String,
    pub assistant: String,
}

impl From<&Turn> for HistoryEntry {
    fn from(turn: &Turn) -> Self {
        Self {
            user: turn.user_text.clone(),
            assistant: turn.reply_text.clone(),
        }
    }
}

/// Everything the remote service needs to answer one transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueRequest {
    pub transcript: String,
    /// Name of the screen currently shown.
    pub screen_context: String,
    /// BCP-47 tag of the session language.
    pub language: String,
    /// Prior turns, oldest first.
    pub history: Vec<HistoryEntry>,
    pub accessibility_mode: bool,
    /// Serialised state of the current screen, sent in accessibility mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_context: Option<Value>,
}

/// Raw reply from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueResponse {
    pub text: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub params: Value,
}

impl DialogueResponse {
    /// The reply's action mapped onto the closed vocabulary.
    #[must_use]
    pub fn action(&self) -> KioskAction {
        self.action
            .as_deref()
            .map_or(KioskAction::None, |a| KioskAction::from_wire(a, &self.params))
    }
}

/// An API credential for the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Non-secret label used in logs.
    pub label: String,
    pub secret: String,
}

impl Credential {
    pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A model tier of the remote service, tried in configured order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelTier(pub String);

impl ModelTier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors returned by a single remote attempt.
#[derive(Debug, Clone, Error)]
pub enum DialogueError {
    #[error("Rate limited by dialogue service")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Dialogue service returned status {0}")]
    Status(u16),

    #[error("Malformed dialogue response: {0}")]
    Malformed(String),
}

/// Port trait for the remote dialogue-understanding service.
#[async_trait]
pub trait RemoteDialogueService: Send + Sync {
    /// Make exactly one attempt with the given credential and tier.
    async fn respond(
        &self,
        request: &DialogueRequest,
        credential: &Credential,
        tier: &ModelTier,
    ) -> Result<DialogueResponse, DialogueError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Screen;
    use serde_json::json;

    #[test]
    fn credential_debug_hides_secret() {
        let cred = Credential::new("primary", "sk-live-123");
        let debug = format!("{cred:?}");
        assert!(debug.contains("primary"));
        assert!(!debug.contains("sk-live-123"));
    }

    #[test]
    fn response_without_action_maps_to_none() {
        let response: DialogueResponse =
            serde_json::from_value(json!({ "text": "Hello" })).unwrap();
        assert!(response.action().is_none());
    }

    #[test]
    fn response_action_maps_to_vocabulary() {
        let response: DialogueResponse = serde_json::from_value(json!({
            "text": "Opening water bill",
            "action": "navigate",
            "params": { "screen": "water_bill" }
        }))
        .unwrap();
        assert_eq!(response.action(), KioskAction::Navigate { screen: Screen::WaterBill });
    }

    #[test]
    fn request_omits_missing_page_context() {
        let request = DialogueRequest {
            transcript: "hi".into(),
            screen_context: "home".into(),
            language: "en-IN".into(),
            history: vec![],
            accessibility_mode: false,
            page_context: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("pageContext").is_none());
        assert_eq!(value["screenContext"], "home");
    }
}
