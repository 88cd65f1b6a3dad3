//! JSON-over-HTTP dialogue service.
//!
//! One POST per attempt. The request body is the [`DialogueRequest`] plus the
//! model tier; the response body is a [`DialogueResponse`]. Retries and
//! credential rotation belong to the caller.

use std::time::Duration;

use async_trait::async_trait;
use kiosk_core::{
    Credential, DialogueError, DialogueRequest, DialogueResponse, ModelTier, RemoteDialogueService,
};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a DialogueRequest,
}

/// Talks to a dialogue endpoint such as `https://dialogue.example/v1/respond`.
#[derive(Debug, Clone)]
pub struct HttpDialogueService {
    client: Client,
    endpoint: String,
}

impl HttpDialogueService {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, DialogueError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DialogueError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Map a non-success status onto the port's error vocabulary.
fn classify(status: StatusCode) -> Option<DialogueError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(DialogueError::RateLimited)
    } else if status.is_success() {
        None
    } else {
        Some(DialogueError::Status(status.as_u16()))
    }
}

#[async_trait]
impl RemoteDialogueService for HttpDialogueService {
    async fn respond(
        &self,
        request: &DialogueRequest,
        credential: &Credential,
        tier: &ModelTier,
    ) -> Result<DialogueResponse, DialogueError> {
        let body = WireRequest {
            model: tier.name(),
            request,
        };

        let mut call = self.client.post(&self.endpoint).json(&body);
        if !credential.secret.is_empty() {
            call = call.bearer_auth(&credential.secret);
        }

        let response = call
            .send()
            .await
            .map_err(|e| DialogueError::Network(e.to_string()))?;

        let status = response.status();
        debug!(%tier, credential = %credential.label, status = status.as_u16(), "Dialogue service responded");
        if let Some(error) = classify(status) {
            return Err(error);
        }

        response
            .json::<DialogueResponse>()
            .await
            .map_err(|e| DialogueError::Malformed(e.to_string()))
    }
}
