//! Composition root: settings, knowledge, remote service and console adapters.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use kiosk_core::{Credential, ModelTier, Screen, VoiceSettings};
use kiosk_voice::{
    ActivationOptions, CredentialPool, HttpDialogueService, KeywordKnowledgeBase, RemoteChain,
    ResponseResolver, VoiceControllerConfig, VoiceDependencies,
};
use tracing::info;

use crate::cli::Cli;
use crate::console::{ConsoleCapture, ConsoleHost, ConsoleSynthesizer};

/// Everything `main` needs to run a session.
pub struct KioskApp {
    pub config: VoiceControllerConfig,
    pub activation: ActivationOptions,
    pub deps: VoiceDependencies,
    pub capture: Arc<ConsoleCapture>,
    pub host: Arc<ConsoleHost>,
}

pub fn bootstrap(cli: &Cli) -> anyhow::Result<KioskApp> {
    let settings = load_settings(cli)?;
    let config = VoiceControllerConfig::from_settings(&settings).context("Invalid voice settings")?;
    let activation = ActivationOptions::from_config(&config);

    let knowledge = match &cli.knowledge {
        Some(path) => load_knowledge(path)?,
        None => KeywordKnowledgeBase::civic_services(),
    };
    info!(entries = knowledge.len(), "Local knowledge loaded");

    let mut resolver = ResponseResolver::new(Arc::new(knowledge));
    if let Some(endpoint) = &cli.endpoint {
        let service = HttpDialogueService::new(endpoint.as_str())
            .map_err(|e| anyhow::anyhow!("Failed to create dialogue client: {e}"))?;
        let credentials = cli
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| Credential::new(format!("key-{}", i + 1), key.as_str()))
            .collect();
        let tiers = cli.tiers.iter().map(|t| ModelTier::new(t.as_str())).collect();

        info!(%endpoint, keys = cli.keys.len(), tiers = ?cli.tiers, "Remote dialogue service enabled");
        resolver = resolver.with_remote(RemoteChain::new(
            Arc::new(service),
            CredentialPool::new(credentials),
            tiers,
            config.retry,
        ));
    } else {
        info!("No dialogue endpoint configured; replying from local knowledge and offline rules");
    }

    let capture = Arc::new(ConsoleCapture::default());
    let host = Arc::new(ConsoleHost::new(Screen::from_name(&cli.screen)));
    let deps = VoiceDependencies {
        capture: capture.clone(),
        synthesizer: Arc::new(ConsoleSynthesizer::default()),
        resolver: Arc::new(resolver),
        executor: host.clone(),
        page_context: host.clone(),
    };

    Ok(KioskApp {
        config,
        activation,
        deps,
        capture,
        host,
    })
}

/// Settings file first, then command-line overrides.
fn load_settings(cli: &Cli) -> anyhow::Result<VoiceSettings> {
    let mut settings = match &cli.settings {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        }
        None => VoiceSettings::default(),
    };

    if let Some(language) = &cli.language {
        settings.language = Some(language.clone());
    }
    if cli.accessibility {
        settings.accessibility_mode = Some(true);
    }
    Ok(settings)
}

fn load_knowledge(path: &Path) -> anyhow::Result<KeywordKnowledgeBase> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge from {}", path.display()))?;
    KeywordKnowledgeBase::from_json(&raw)
        .with_context(|| format!("Failed to parse knowledge in {}", path.display()))
}
