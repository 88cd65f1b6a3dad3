//! Shared fakes and helpers for kiosk-voice integration tests.
//!
//! Every fake is driven from the test body: capture callbacks are fired by
//! hand, synthesis completes after a virtual delay, and executed actions are
//! recorded for inspection. Tests run on a paused clock.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kiosk_core::{
    ActionExecutor, CaptureError, Credential, DialogueError, DialogueRequest, DialogueResponse,
    KioskAction, ModelTier, RecognitionErrorKind, RecognitionSink, RemoteDialogueService, SpeechCapture,
    SpeechSynthesizer, StaticPageContext, SynthesisError,
};
use kiosk_voice::{
    ActivationOptions, CredentialPool, RemoteChain, ResponseResolver, RetryPolicy, VoiceController,
    VoiceControllerConfig, VoiceDependencies, VoiceEvent,
};
use tokio::sync::mpsc;

// ── Fake speech capture ────────────────────────────────────────────

/// A recognition stream fed by the test.
#[derive(Default)]
pub struct FakeCapture {
    sink: Mutex<Option<RecognitionSink>>,
    capturing: AtomicBool,
    starts: AtomicU32,
}

impl FakeCapture {
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    /// The sink of the most recently started instance.
    pub fn current_sink(&self) -> RecognitionSink {
        self.sink
            .lock()
            .unwrap()
            .clone()
            .expect("capture was never started")
    }

    pub fn partial(&self, text: &str, confidence: f32) {
        self.current_sink().partial(text, Some(confidence));
    }

    pub fn final_result(&self, text: &str, confidence: f32) {
        self.current_sink().final_result(text, Some(confidence));
    }

    /// The platform stream stops without reporting anything.
    pub fn die_silently(&self) {
        self.capturing.store(false, Ordering::SeqCst);
    }

    /// The platform stream stops and reports why.
    pub fn fail(&self, kind: RecognitionErrorKind) {
        self.capturing.store(false, Ordering::SeqCst);
        self.current_sink().error(kind);
    }
}

impl SpeechCapture for FakeCapture {
    fn start(&self, _language: &str, sink: RecognitionSink) -> Result<(), CaptureError> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        self.capturing.store(false, Ordering::SeqCst);
        // Platforms report the end of an aborted instance on its own sink
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink.end();
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

// ── Fake speech synthesis ──────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum SynthMode {
    CompleteAfter(Duration),
    /// Never reports completion.
    Never,
    Fail,
}

pub struct FakeSynth {
    mode: SynthMode,
    spoken: Mutex<Vec<String>>,
    cancels: AtomicU32,
}

impl FakeSynth {
    pub fn new(mode: SynthMode) -> Self {
        Self {
            mode,
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicU32::new(0),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn speak(&self, text: &str, _language: &str) -> Result<(), SynthesisError> {
        self.spoken.lock().unwrap().push(text.to_string());
        match self.mode {
            SynthMode::CompleteAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            SynthMode::Never => std::future::pending().await,
            SynthMode::Fail => Err(SynthesisError::Failed("device lost".into())),
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Host and remote fakes ──────────────────────────────────────────

#[derive(Default)]
pub struct RecordingExecutor {
    actions: Mutex<Vec<KioskAction>>,
}

impl RecordingExecutor {
    pub fn actions(&self) -> Vec<KioskAction> {
        self.actions.lock().unwrap().clone()
    }
}

impl ActionExecutor for RecordingExecutor {
    fn execute(&self, action: &KioskAction) {
        self.actions.lock().unwrap().push(action.clone());
    }
}

/// A dialogue service that accepts every request and never answers.
#[derive(Default)]
pub struct UnresponsiveRemote {
    calls: AtomicU32,
}

impl UnresponsiveRemote {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteDialogueService for UnresponsiveRemote {
    async fn respond(
        &self,
        _request: &DialogueRequest,
        _credential: &Credential,
        _tier: &ModelTier,
    ) -> Result<DialogueResponse, DialogueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub fn remote_chain(
    remote: Arc<UnresponsiveRemote>,
    keys: &[&str],
    tiers: &[&str],
    policy: RetryPolicy,
) -> RemoteChain {
    RemoteChain::new(
        remote,
        CredentialPool::new(keys.iter().map(|k| Credential::new(*k, format!("secret-{k}"))).collect()),
        tiers.iter().map(|t| ModelTier::new(*t)).collect(),
        policy,
    )
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub controller: VoiceController,
    pub events: mpsc::UnboundedReceiver<VoiceEvent>,
    pub capture: Arc<FakeCapture>,
    pub synth: Arc<FakeSynth>,
    pub executor: Arc<RecordingExecutor>,
}

impl Harness {
    pub fn new(mode: SynthMode, resolver: ResponseResolver) -> Self {
        Self::with_config(VoiceControllerConfig::default(), mode, resolver)
    }

    pub fn with_config(config: VoiceControllerConfig, mode: SynthMode, resolver: ResponseResolver) -> Self {
        let capture = Arc::new(FakeCapture::default());
        let synth = Arc::new(FakeSynth::new(mode));
        let executor = Arc::new(RecordingExecutor::default());

        let deps = VoiceDependencies {
            capture: capture.clone(),
            synthesizer: synth.clone(),
            resolver: Arc::new(resolver),
            executor: executor.clone(),
            page_context: Arc::new(StaticPageContext::new("home")),
        };
        let (controller, events) = VoiceController::new(config, deps);

        Self {
            controller,
            events,
            capture,
            synth,
            executor,
        }
    }

    pub async fn activate(&mut self) {
        let options = ActivationOptions::from_config(self.controller.config());
        self.controller.activate(options).await.expect("activation failed");
    }

    /// Receive events until one matches, returning everything seen.
    pub async fn wait_for(&mut self, matches: impl Fn(&VoiceEvent) -> bool) -> Vec<VoiceEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(300), self.events.recv())
                .await
                .expect("timed out waiting for voice event")
                .expect("event channel closed");
            let done = matches(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    /// Collect every event emitted during the next `window` of virtual time.
    pub async fn drain_for(&mut self, window: Duration) -> Vec<VoiceEvent> {
        let deadline = tokio::time::Instant::now() + window;
        let mut seen = Vec::new();
        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => return seen,
                event = self.events.recv() => match event {
                    Some(event) => seen.push(event),
                    None => return seen,
                },
            }
        }
    }
}
