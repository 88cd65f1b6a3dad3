//! The voice controller: public handle plus the session loop behind it.
//!
//! # Architecture
//!
//! ```text
//! host ──activate/deactivate──▶ VoiceController
//!                                    │ spawns
//!                                    ▼
//!   capture callbacks ─┐        SessionLoop (one task, owns all state)
//!   timers ────────────┼─ LoopMessage ─▶ supervisor · arbiter · orchestrator
//!   playback tasks ────┤                   · playback · re-prompt · health
//!   resolver tasks ────┘                         │
//!                                                ▼
//!                     VoiceEvent channel + SessionSnapshot watch ──▶ host
//! ```
//!
//! All session state is mutated on the loop task only. Everything that
//! happens elsewhere arrives as a message stamped with the generation or
//! ticket it belongs to.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kiosk_core::{
    ActionExecutor, Generation, KioskAction, PageContextProvider, RecognitionEvent, SessionSnapshot,
    SessionStatus, SettingsError, SpeechCapture, SpeechSynthesizer, TranscriptEvent,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::barge_in::{BargeInArbiter, BargeInDecision};
use crate::config::VoiceControllerConfig;
use crate::error::VoiceError;
use crate::events::VoiceEvent;
use crate::health::{HealthMonitor, HealthVerdict};
use crate::mailbox::{LoopMessage, Mailbox};
use crate::orchestrator::{DialogueOrchestrator, HandleOutcome, TurnCompletion, TurnId};
use crate::phrases::Phrasebook;
use crate::playback::{PlaybackController, PlaybackOutcome, PlaybackPurpose, UtteranceId};
use crate::recognition::RecognitionSupervisor;
use crate::reprompt::RePromptScheduler;
use crate::resolver::{Resolution, ResponseResolver};
use crate::session::Session;

/// Platform and host collaborators.
#[derive(Clone)]
pub struct VoiceDependencies {
    pub capture: Arc<dyn SpeechCapture>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub resolver: Arc<ResponseResolver>,
    pub executor: Arc<dyn ActionExecutor>,
    pub page_context: Arc<dyn PageContextProvider>,
}

/// Per-session choices made at activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOptions {
    /// BCP-47 tag passed to recognition and synthesis.
    pub language: String,
    pub accessibility_mode: bool,
}

impl ActivationOptions {
    #[must_use]
    pub fn from_config(config: &VoiceControllerConfig) -> Self {
        Self {
            language: config.language.clone(),
            accessibility_mode: config.accessibility_mode,
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

struct RunningSession {
    mailbox: Mailbox,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Continuous voice dialogue for one kiosk.
///
/// Created with [`VoiceController::new`], which also returns the event
/// receiver. Dropping the controller ends any active session.
pub struct VoiceController {
    config: VoiceControllerConfig,
    deps: VoiceDependencies,
    event_tx: mpsc::UnboundedSender<VoiceEvent>,
    status_tx: Arc<watch::Sender<SessionSnapshot>>,
    active: Arc<AtomicBool>,
    running: Option<RunningSession>,
}

impl VoiceController {
    pub fn new(
        config: VoiceControllerConfig,
        deps: VoiceDependencies,
    ) -> (Self, mpsc::UnboundedReceiver<VoiceEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(SessionSnapshot::default());

        let controller = Self {
            config,
            deps,
            event_tx,
            status_tx: Arc::new(status_tx),
            active: Arc::new(AtomicBool::new(false)),
            running: None,
        };
        (controller, event_rx)
    }

    pub const fn config(&self) -> &VoiceControllerConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Latest published session snapshot.
    pub fn status(&self) -> SessionSnapshot {
        self.status_tx.borrow().clone()
    }

    /// Watch session snapshots as they change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.status_tx.subscribe()
    }

    /// Start a session: recognition is running when this returns.
    pub async fn activate(&mut self, options: ActivationOptions) -> Result<(), VoiceError> {
        if self.is_active() {
            return Err(VoiceError::AlreadyActive);
        }
        if options.language.trim().is_empty() {
            return Err(SettingsError::EmptyLanguage.into());
        }

        // A session that ended itself (stop command) leaves its task behind
        if let Some(previous) = self.running.take() {
            previous.shutdown.cancel();
            if let Err(e) = previous.task.await {
                warn!(error = %e, "Previous session task ended abnormally");
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let mailbox = Mailbox::new(tx, shutdown.clone());

        let mut session_loop = SessionLoop::new(
            &self.config,
            &self.deps,
            Session::new(
                options.language.clone(),
                options.accessibility_mode,
                self.config.orchestrator.history_cap,
            ),
            mailbox.clone(),
            shutdown.clone(),
            self.event_tx.clone(),
            Arc::clone(&self.status_tx),
            Arc::clone(&self.active),
        );

        self.active.store(true, Ordering::SeqCst);
        session_loop.begin();
        info!(
            language = %options.language,
            accessibility = options.accessibility_mode,
            "Voice session activated"
        );

        let task = tokio::spawn(session_loop.run(rx));
        self.running = Some(RunningSession {
            mailbox,
            shutdown,
            task,
        });
        Ok(())
    }

    /// End the session and wait until teardown has finished. Idempotent.
    pub async fn deactivate(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        running.mailbox.post(LoopMessage::Deactivate { ack: ack_tx });
        if ack_rx.await.is_err() {
            trace!("Session loop already finished");
        }

        running.shutdown.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "Session task ended abnormally");
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for VoiceController {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
        }
    }
}

/// Owns every component of one session and serialises all their work.
struct SessionLoop {
    orchestrator: DialogueOrchestrator,
    supervisor: RecognitionSupervisor,
    playback: PlaybackController,
    arbiter: BargeInArbiter,
    reprompt: RePromptScheduler,
    health: HealthMonitor,
    mailbox: Mailbox,
    shutdown: CancellationToken,
    event_tx: mpsc::UnboundedSender<VoiceEvent>,
    status_tx: Arc<watch::Sender<SessionSnapshot>>,
    active: Arc<AtomicBool>,
}

impl SessionLoop {
    #[allow(clippy::too_many_arguments)]
    fn new(
        config: &VoiceControllerConfig,
        deps: &VoiceDependencies,
        session: Session,
        mailbox: Mailbox,
        shutdown: CancellationToken,
        event_tx: mpsc::UnboundedSender<VoiceEvent>,
        status_tx: Arc<watch::Sender<SessionSnapshot>>,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            orchestrator: DialogueOrchestrator::new(
                session,
                Arc::clone(&deps.resolver),
                Arc::clone(&deps.executor),
                Arc::clone(&deps.page_context),
                mailbox.clone(),
            ),
            supervisor: RecognitionSupervisor::new(
                Arc::clone(&deps.capture),
                mailbox.clone(),
                config.recognition.clone(),
            ),
            playback: PlaybackController::new(
                Arc::clone(&deps.synthesizer),
                mailbox.clone(),
                config.playback,
            ),
            arbiter: BargeInArbiter::new(config.barge_in),
            reprompt: RePromptScheduler::new(config.reprompt, mailbox.clone()),
            health: HealthMonitor::new(config.health),
            mailbox,
            shutdown,
            event_tx,
            status_tx,
            active,
        }
    }

    /// Start recognition and the health monitor.
    fn begin(&mut self) {
        if let Some(generation) = self.supervisor.start(self.orchestrator.session_mut()) {
            self.emit(VoiceEvent::RecognitionStarted { generation });
        }
        self.orchestrator.session_mut().set_status(SessionStatus::Listening);
        self.health.start(&self.mailbox);
        self.publish();
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<LoopMessage>) {
        loop {
            let message = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    self.teardown("cancelled");
                    break;
                }
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => {
                        self.teardown("mailbox closed");
                        break;
                    }
                },
            };

            let flow = self.handle(message);
            self.publish();
            if flow.is_break() {
                break;
            }
        }
        debug!("Session loop finished");
    }

    fn handle(&mut self, message: LoopMessage) -> ControlFlow<()> {
        match message {
            LoopMessage::Recognition { generation, event } => self.on_recognition(generation, event),
            LoopMessage::DebounceElapsed { generation, ticket } => {
                let committed = self.supervisor.handle_debounce(
                    self.orchestrator.session(),
                    generation,
                    ticket,
                );
                if let Some(committed) = committed {
                    self.on_committed(committed);
                }
            }
            LoopMessage::RestartDue { ticket } => {
                if let Some(generation) = self
                    .supervisor
                    .handle_restart_due(self.orchestrator.session_mut(), ticket)
                {
                    self.emit(VoiceEvent::RecognitionStarted { generation });
                }
            }
            LoopMessage::PlaybackFinished { utterance, outcome } => {
                self.on_playback_finished(utterance, outcome);
            }
            LoopMessage::Resolved { turn, resolution } => self.on_resolved(turn, resolution),
            LoopMessage::RePromptDue { ticket } => self.on_reprompt_due(ticket),
            LoopMessage::HealthTick => self.on_health_tick(),
            LoopMessage::Deactivate { ack } => {
                self.teardown("deactivate requested");
                if ack.send(()).is_err() {
                    trace!("Deactivation waiter went away");
                }
                return ControlFlow::Break(());
            }
        }

        if self.orchestrator.session().is_active() {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    }

    fn on_recognition(&mut self, generation: Generation, event: RecognitionEvent) {
        let report = self
            .supervisor
            .handle_event(self.orchestrator.session(), generation, event);

        if let Some(observed) = report.observed {
            if !observed.is_final {
                self.emit(VoiceEvent::InterimTranscript {
                    text: observed.text.clone(),
                });
            }
            let status = self.orchestrator.session().status();
            if self.arbiter.evaluate(status, &observed) == BargeInDecision::Interrupt {
                self.barge_in(&observed);
            }
        }

        if let Some(committed) = report.committed {
            self.on_committed(committed);
        }
    }

    fn barge_in(&mut self, heard: &TranscriptEvent) {
        let Some((utterance, purpose)) = self.playback.cancel(self.orchestrator.session_mut()) else {
            return;
        };
        info!(
            %utterance,
            text = %heard.text,
            is_final = heard.is_final,
            confidence = ?heard.confidence,
            "Barge-in: citizen interrupted playback"
        );
        self.emit(VoiceEvent::BargeIn {
            text: heard.text.clone(),
        });

        match purpose {
            PlaybackPurpose::Reply(turn) => {
                if let Some(completion) = self.orchestrator.finish(turn, PlaybackOutcome::Cancelled) {
                    self.after_turn(completion);
                }
            }
            PlaybackPurpose::RePrompt { .. } => {
                // The interruption may never commit; a commit resets this anyway
                if !self.orchestrator.is_busy() {
                    self.reprompt.arm();
                }
                self.ensure_listening();
            }
        }
    }

    fn on_committed(&mut self, committed: TranscriptEvent) {
        if self.orchestrator.session().status() == SessionStatus::Speaking {
            // Not loud or long enough to barge in: most likely our own voice
            debug!(text = %committed.text, "Ignoring transcript heard during playback");
            return;
        }

        self.emit(VoiceEvent::TranscriptCommitted {
            text: committed.text.clone(),
        });
        self.reprompt.reset();

        match self.orchestrator.handle(&committed.text) {
            HandleOutcome::Started(turn) => debug!(%turn, "Resolving transcript"),
            HandleOutcome::Queued | HandleOutcome::Ignored => {}
        }
    }

    fn on_resolved(&mut self, turn: TurnId, resolution: Resolution) {
        let Some(reply) = self.orchestrator.on_resolved(turn, resolution) else {
            return;
        };

        let utterance = self.playback.speak(
            self.orchestrator.session_mut(),
            &reply,
            PlaybackPurpose::Reply(turn),
        );
        match utterance {
            Some(utterance) => {
                self.orchestrator.mark_speaking(turn, utterance);
                self.emit(VoiceEvent::ReplyStarted { text: reply });
            }
            None => {
                // Nothing audible to say; the turn is complete as is
                if let Some(completion) = self.orchestrator.finish(turn, PlaybackOutcome::Completed) {
                    self.after_turn(completion);
                }
            }
        }
    }

    fn on_playback_finished(&mut self, utterance: UtteranceId, outcome: PlaybackOutcome) {
        let Some(purpose) = self
            .playback
            .finish(self.orchestrator.session_mut(), utterance, outcome)
        else {
            return;
        };

        match purpose {
            PlaybackPurpose::Reply(turn) => {
                if let Some(completion) = self.orchestrator.finish(turn, outcome) {
                    self.after_turn(completion);
                }
            }
            PlaybackPurpose::RePrompt { .. } => {
                if !self.orchestrator.is_busy() {
                    self.reprompt.arm();
                }
                self.ensure_listening();
            }
        }
    }

    fn after_turn(&mut self, completion: TurnCompletion) {
        debug!(turn = %completion.turn, interrupted = completion.interrupted, "Turn complete");
        if let Some(action) = completion.dispatched {
            let stop = action == KioskAction::StopSession;
            self.emit(VoiceEvent::ActionDispatched { action });
            if stop {
                self.teardown("stop requested by citizen");
                return;
            }
        }

        if self.orchestrator.start_pending().is_none() {
            self.reprompt.arm();
        }
        self.ensure_listening();
    }

    fn on_reprompt_due(&mut self, ticket: u64) {
        if self.orchestrator.is_busy() || self.playback.is_speaking() {
            trace!(fired = self.reprompt.fired(), "Busy; skipping re-prompt");
            return;
        }
        let phrases = Phrasebook::for_tag(self.orchestrator.session().language());
        let Some((index, phrase)) = self.reprompt.fire(ticket, phrases) else {
            return;
        };

        info!(index, "Re-prompting after silence");
        let spoken = self.playback.speak(
            self.orchestrator.session_mut(),
            phrase,
            PlaybackPurpose::RePrompt { index },
        );
        if spoken.is_some() {
            self.emit(VoiceEvent::RePrompt { index });
        }
    }

    fn on_health_tick(&mut self) {
        let verdict = self.health.assess(
            self.supervisor.probe(),
            self.orchestrator.is_busy(),
            Instant::now(),
        );
        match verdict {
            HealthVerdict::Healthy => {}
            HealthVerdict::TurnInFlight | HealthVerdict::RestartPending => {
                trace!(?verdict, turn = ?self.orchestrator.current_turn(), "Recognition idle; deferring");
            }
            HealthVerdict::Restart => {
                warn!(state = ?self.supervisor.state(), "Recognition is not running; forcing restart");
                if let Some(generation) = self
                    .supervisor
                    .force_restart(self.orchestrator.session_mut())
                {
                    self.emit(VoiceEvent::RecognitionStarted { generation });
                }
            }
        }
    }

    fn ensure_listening(&mut self) {
        if let Some(generation) = self
            .supervisor
            .ensure_listening(self.orchestrator.session_mut())
        {
            self.emit(VoiceEvent::RecognitionStarted { generation });
        }
    }

    /// Stop everything. Idempotent.
    fn teardown(&mut self, reason: &'static str) {
        if !self.orchestrator.session().is_active() {
            return;
        }
        info!(reason, "Deactivating voice session");

        self.supervisor.stop();
        self.playback.abort();
        self.reprompt.cancel();
        self.health.stop();
        self.orchestrator.abandon();
        self.orchestrator.session_mut().deactivate();
        self.active.store(false, Ordering::SeqCst);
        self.shutdown.cancel();

        self.publish();
        self.emit(VoiceEvent::Deactivated);
    }

    /// Push status transitions and the latest snapshot to the host.
    fn publish(&mut self) {
        for status in self.orchestrator.session_mut().take_transitions() {
            self.emit(VoiceEvent::StateChanged { status });
        }
        let snapshot = self.orchestrator.session().snapshot();
        self.status_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn emit(&self, event: VoiceEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("Voice event receiver dropped");
        }
    }
}
