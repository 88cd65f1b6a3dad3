//! Turn resolution: local knowledge first, then the remote dialogue service,
//! then offline keyword inference.
//!
//! Resolution never fails. Whatever goes wrong, the citizen hears something.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kiosk_core::{
    Credential, DialogueError, DialogueRequest, KioskAction, KnowledgeBase, Language, ModelTier,
    RemoteDialogueService,
};
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::offline::OfflineReplies;
use crate::phrases::Phrasebook;

/// Where a reply came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    Local,
    Remote { tier: ModelTier },
    Offline,
    /// Resolution itself failed.
    Apology,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote { tier } => write!(f, "remote:{tier}"),
            Self::Offline => f.write_str("offline"),
            Self::Apology => f.write_str("apology"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub reply_text: String,
    pub action: KioskAction,
    pub source: ResolutionSource,
}

impl Resolution {
    /// Spoken when resolution fails outright.
    #[must_use]
    pub fn apology(language: Language) -> Self {
        Self {
            reply_text: Phrasebook::new(language).apology().to_string(),
            action: KioskAction::None,
            source: ResolutionSource::Apology,
        }
    }
}

/// Rotates through credentials so consecutive attempts use different keys.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    /// An empty list yields a single anonymous credential.
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        let credentials = if credentials.is_empty() {
            vec![Credential::new("anonymous", "")]
        } else {
            credentials
        };
        Self {
            credentials,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn next_credential(&self) -> &Credential {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.credentials.len();
        &self.credentials[index]
    }
}

/// Every remote attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("All {attempts} remote dialogue attempts failed")]
pub struct RemoteExhausted {
    pub attempts: u32,
}

/// The remote service with its credentials, tier chain and retry policy.
pub struct RemoteChain {
    service: Arc<dyn RemoteDialogueService>,
    credentials: CredentialPool,
    tiers: Vec<ModelTier>,
    policy: RetryPolicy,
}

impl RemoteChain {
    /// `tiers` are tried in order; an empty list means a single `default` tier.
    pub fn new(
        service: Arc<dyn RemoteDialogueService>,
        credentials: CredentialPool,
        tiers: Vec<ModelTier>,
        policy: RetryPolicy,
    ) -> Self {
        let tiers = if tiers.is_empty() {
            vec![ModelTier::new("default")]
        } else {
            tiers
        };
        Self {
            service,
            credentials,
            tiers,
            policy,
        }
    }

    /// Try each tier up to `attempts_per_tier` times, rotating credentials.
    pub async fn attempt(&self, request: &DialogueRequest) -> Result<Resolution, RemoteExhausted> {
        let mut attempts = 0;

        for tier in &self.tiers {
            for attempt in 1..=self.policy.attempts_per_tier {
                let credential = self.credentials.next_credential();
                attempts += 1;

                let call = self.service.respond(request, credential, tier);
                match tokio::time::timeout(self.policy.attempt_timeout, call).await {
                    Ok(Ok(response)) if !response.text.trim().is_empty() => {
                        debug!(%tier, attempt, credential = %credential.label, "Remote reply received");
                        let action = response.action();
                        return Ok(Resolution {
                            reply_text: response.text,
                            action,
                            source: ResolutionSource::Remote { tier: tier.clone() },
                        });
                    }
                    Ok(Ok(_)) => {
                        warn!(%tier, attempt, credential = %credential.label, "Remote reply was empty");
                    }
                    Ok(Err(DialogueError::RateLimited)) => {
                        warn!(%tier, attempt, credential = %credential.label, "Rate limited; rotating credential");
                        tokio::time::sleep(self.policy.rate_limit_pause).await;
                    }
                    Ok(Err(e)) => {
                        warn!(%tier, attempt, credential = %credential.label, error = %e, "Remote attempt failed");
                    }
                    Err(_) => {
                        warn!(
                            %tier,
                            attempt,
                            credential = %credential.label,
                            timeout_ms = self.policy.attempt_timeout.as_millis(),
                            "Remote attempt timed out"
                        );
                    }
                }
            }
            info!(%tier, "Model tier exhausted");
        }

        Err(RemoteExhausted { attempts })
    }
}

/// Resolves a transcript to a reply and an action.
pub struct ResponseResolver {
    knowledge: Arc<dyn KnowledgeBase>,
    remote: Option<RemoteChain>,
    offline: OfflineReplies,
}

impl ResponseResolver {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            knowledge,
            remote: None,
            offline: OfflineReplies::new(),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: RemoteChain) -> Self {
        self.remote = Some(remote);
        self
    }

    pub const fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn resolve(&self, request: &DialogueRequest) -> Resolution {
        if let Some(reply) = self.knowledge.lookup(&request.transcript, &request.language) {
            debug!(action = reply.action.label(), "Resolved from local knowledge");
            return Resolution {
                reply_text: reply.text,
                action: reply.action,
                source: ResolutionSource::Local,
            };
        }

        if let Some(remote) = &self.remote {
            match remote.attempt(request).await {
                Ok(resolution) => return resolution,
                Err(e) => warn!(attempts = e.attempts, "{e}; replying offline"),
            }
        }

        let (reply_text, action) = self
            .offline
            .infer(&request.transcript, Language::from_tag(&request.language));
        Resolution {
            reply_text,
            action,
            source: ResolutionSource::Offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KeywordKnowledgeBase;
    use async_trait::async_trait;
    use kiosk_core::{DialogueResponse, Screen};
    use mockall::predicate::always;
    use std::time::Duration;

    mockall::mock! {
        pub Remote {}

        #[async_trait]
        impl RemoteDialogueService for Remote {
            async fn respond(
                &self,
                request: &DialogueRequest,
                credential: &Credential,
                tier: &ModelTier,
            ) -> Result<DialogueResponse, DialogueError>;
        }
    }

    fn request(transcript: &str) -> DialogueRequest {
        DialogueRequest {
            transcript: transcript.into(),
            screen_context: "home".into(),
            language: "en-IN".into(),
            history: vec![],
            accessibility_mode: false,
            page_context: None,
        }
    }

    fn chain(remote: MockRemote, keys: &[&str], tiers: &[&str]) -> RemoteChain {
        RemoteChain::new(
            Arc::new(remote),
            CredentialPool::new(keys.iter().map(|k| Credential::new(*k, "secret")).collect()),
            tiers.iter().map(|t| ModelTier::new(*t)).collect(),
            RetryPolicy {
                attempts_per_tier: 3,
                attempt_timeout: Duration::from_secs(8),
                rate_limit_pause: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test]
    async fn test_local_hit_skips_remote() {
        let mut remote = MockRemote::new();
        remote.expect_respond().never();

        let resolver = ResponseResolver::new(Arc::new(KeywordKnowledgeBase::civic_services()))
            .with_remote(chain(remote, &["a"], &["standard"]));
        let resolution = resolver.resolve(&request("electricity bill")).await;

        assert_eq!(resolution.source, ResolutionSource::Local);
        assert_eq!(
            resolution.action,
            KioskAction::Navigate { screen: Screen::ElectricityBill }
        );
    }

    #[tokio::test]
    async fn test_remote_reply_maps_action() {
        let mut remote = MockRemote::new();
        remote
            .expect_respond()
            .with(always(), always(), always())
            .times(1)
            .returning(|_, _, _| {
                Ok(DialogueResponse {
                    text: "Going back.".into(),
                    action: Some("go_back".into()),
                    params: serde_json::Value::Null,
                })
            });

        let resolver = ResponseResolver::new(Arc::new(KeywordKnowledgeBase::default()))
            .with_remote(chain(remote, &["a"], &["standard"]));
        let resolution = resolver.resolve(&request("take me to the last page")).await;

        assert_eq!(
            resolution.source,
            ResolutionSource::Remote { tier: ModelTier::new("standard") }
        );
        assert_eq!(resolution.action, KioskAction::GoBack);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_rotates_credentials() {
        let mut remote = MockRemote::new();
        let mut seq = mockall::Sequence::new();
        remote
            .expect_respond()
            .withf(|_, credential, _| credential.label == "first")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(DialogueError::RateLimited));
        remote
            .expect_respond()
            .withf(|_, credential, _| credential.label == "second")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(DialogueResponse {
                    text: "Here you go.".into(),
                    action: None,
                    params: serde_json::Value::Null,
                })
            });

        let resolver = ResponseResolver::new(Arc::new(KeywordKnowledgeBase::default()))
            .with_remote(chain(remote, &["first", "second"], &["standard"]));
        let resolution = resolver.resolve(&request("what documents do I need")).await;

        assert_eq!(resolution.reply_text, "Here you go.");
        assert!(resolution.action.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tier_fallback_then_offline() {
        let mut remote = MockRemote::new();
        remote
            .expect_respond()
            .times(6)
            .returning(|_, _, _| Err(DialogueError::Status(503)));

        let resolver = ResponseResolver::new(Arc::new(KeywordKnowledgeBase::default()))
            .with_remote(chain(remote, &["a", "b", "c"], &["standard", "lite"]));
        let resolution = resolver.resolve(&request("I want to pay my water charges")).await;

        assert_eq!(resolution.source, ResolutionSource::Offline);
        assert_eq!(resolution.action, KioskAction::Navigate { screen: Screen::WaterBill });
    }

    #[test]
    fn test_credential_pool_round_robin() {
        let pool = CredentialPool::new(vec![Credential::new("a", "1"), Credential::new("b", "2")]);
        let labels: Vec<_> = (0..4).map(|_| pool.next_credential().label.clone()).collect();
        assert_eq!(labels, ["a", "b", "a", "b"]);

        let anonymous = CredentialPool::new(vec![]);
        assert_eq!(anonymous.len(), 1);
        assert_eq!(anonymous.next_credential().label, "anonymous");
    }

    #[test]
    fn test_apology_in_session_language() {
        let apology = Resolution::apology(Language::Hi);
        assert_eq!(apology.source, ResolutionSource::Apology);
        assert!(apology.action.is_none());
        assert_eq!(apology.reply_text, Phrasebook::new(Language::Hi).apology());
    }
}
