//! Continuous speech recognition supervision.
//!
//! The platform recognizer ends its stream on its own (silence, network
//! hiccups, permission glitches). The supervisor restarts it after a delay
//! that depends on why it stopped, and stamps every instance with a fresh
//! session generation so callbacks from a superseded instance are ignored.

use std::sync::Arc;

use kiosk_core::{Generation, RecognitionEvent, RecognitionSink, SpeechCapture, TranscriptEvent};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::commit::{CommitDecision, PendingTranscript, TranscriptFilter};
use crate::config::RecognitionConfig;
use crate::mailbox::{LoopMessage, Mailbox};
use crate::session::Session;

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionState {
    Idle,
    Starting,
    Listening,
    Restarting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    NaturalEnd,
    Benign,
    Failure,
}

#[derive(Debug)]
struct PendingRestart {
    ticket: u64,
    due_at: Instant,
    timer: CancellationToken,
}

/// What one recognition callback produced.
#[derive(Debug, Default)]
pub struct RecognitionReport {
    /// The raw transcript, for barge-in arbitration.
    pub observed: Option<TranscriptEvent>,
    /// Text accepted as a complete utterance.
    pub committed: Option<TranscriptEvent>,
}

/// Liveness view used by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizerProbe {
    pub running: bool,
    /// When the scheduled restart should fire.
    pub restart_due_at: Option<Instant>,
}

pub struct RecognitionSupervisor {
    capture: Arc<dyn SpeechCapture>,
    mailbox: Mailbox,
    config: RecognitionConfig,
    filter: TranscriptFilter,
    state: RecognitionState,
    /// An instance was started and has not reported its end.
    running: bool,
    pending: PendingTranscript,
    restart: Option<PendingRestart>,
    restart_ticket: u64,
    consecutive_failures: u32,
}

impl RecognitionSupervisor {
    pub fn new(capture: Arc<dyn SpeechCapture>, mailbox: Mailbox, config: RecognitionConfig) -> Self {
        let filter = TranscriptFilter::new(&config);
        Self {
            capture,
            mailbox,
            config,
            filter,
            state: RecognitionState::Idle,
            running: false,
            pending: PendingTranscript::default(),
            restart: None,
            restart_ticket: 0,
            consecutive_failures: 0,
        }
    }

    pub const fn state(&self) -> RecognitionState {
        self.state
    }

    /// Whether an instance is believed to be running and the platform agrees.
    pub fn is_running(&self) -> bool {
        self.running && self.capture.is_capturing()
    }

    pub fn probe(&self) -> RecognizerProbe {
        RecognizerProbe {
            running: self.is_running(),
            restart_due_at: self.restart.as_ref().map(|r| r.due_at),
        }
    }

    /// Start a new recognition instance under a new generation.
    ///
    /// Any previous instance is stopped first. Returns the new generation,
    /// or `None` if the session is inactive or the platform refused to start
    /// (a restart is then scheduled).
    pub fn start(&mut self, session: &mut Session) -> Option<Generation> {
        if !session.is_active() {
            return None;
        }

        self.cancel_restart();
        self.pending.clear();
        if self.running {
            self.capture.stop();
            self.running = false;
        }

        self.state = RecognitionState::Starting;
        let generation = session.advance_generation();
        let mailbox = self.mailbox.clone();
        let sink = RecognitionSink::new(generation, move |generation, event| {
            mailbox.post(LoopMessage::Recognition { generation, event });
        });

        match self.capture.start(session.language(), sink) {
            Ok(()) => {
                self.running = true;
                self.state = RecognitionState::Listening;
                info!(%generation, language = session.language(), "Recognition started");
                Some(generation)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    %generation,
                    error = %e,
                    failures = self.consecutive_failures,
                    "Recognition failed to start"
                );
                self.schedule_restart(StopReason::Failure);
                None
            }
        }
    }

    /// Stop recognition and every pending timer.
    pub fn stop(&mut self) {
        self.cancel_restart();
        self.pending.clear();
        if self.running || self.capture.is_capturing() {
            self.capture.stop();
        }
        self.running = false;
        self.state = RecognitionState::Idle;
        debug!("Recognition stopped");
    }

    /// Handle a callback from a recognition instance.
    pub fn handle_event(
        &mut self,
        session: &Session,
        generation: Generation,
        event: RecognitionEvent,
    ) -> RecognitionReport {
        if !session.is_current(generation) {
            trace!(%generation, current = %session.generation(), "Discarding stale recognition callback");
            return RecognitionReport::default();
        }

        match event {
            RecognitionEvent::Partial { text, confidence } => {
                let text = text.trim();
                if text.is_empty() {
                    return RecognitionReport::default();
                }
                self.consecutive_failures = 0;
                let ticket = self.pending.update(text, confidence);
                let timer = self.mailbox.post_after(
                    self.config.debounce,
                    LoopMessage::DebounceElapsed { generation, ticket },
                );
                self.pending.set_timer(timer);
                RecognitionReport {
                    observed: Some(TranscriptEvent::interim(text, confidence, generation)),
                    committed: None,
                }
            }
            RecognitionEvent::Final { text, confidence } => {
                self.pending.clear();
                self.consecutive_failures = 0;
                let event = TranscriptEvent::final_result(text.trim(), confidence, generation);
                let committed = self.commit(event.clone());
                RecognitionReport {
                    observed: Some(event),
                    committed,
                }
            }
            RecognitionEvent::Error(kind) => {
                let committed = self.instance_ended(generation);
                if kind.is_benign() {
                    debug!(%generation, error = %kind, "Recognition ended with benign error");
                    self.schedule_restart(StopReason::Benign);
                } else {
                    self.consecutive_failures += 1;
                    warn!(
                        %generation,
                        error = %kind,
                        failures = self.consecutive_failures,
                        "Recognition error"
                    );
                    self.schedule_restart(StopReason::Failure);
                }
                RecognitionReport {
                    observed: None,
                    committed,
                }
            }
            RecognitionEvent::End => {
                let committed = self.instance_ended(generation);
                debug!(%generation, "Recognition stream ended");
                self.schedule_restart(StopReason::NaturalEnd);
                RecognitionReport {
                    observed: None,
                    committed,
                }
            }
        }
    }

    /// The debounce window for `ticket` elapsed without a final result.
    pub fn handle_debounce(
        &mut self,
        session: &Session,
        generation: Generation,
        ticket: u64,
    ) -> Option<TranscriptEvent> {
        if !session.is_current(generation) {
            return None;
        }
        let (text, confidence) = self.pending.take_if(ticket)?;
        debug!(%generation, "Debounce elapsed; committing interim text");
        self.commit(TranscriptEvent::final_result(text, confidence, generation))
    }

    /// The restart timer for `ticket` fired.
    pub fn handle_restart_due(&mut self, session: &mut Session, ticket: u64) -> Option<Generation> {
        if self.restart.as_ref().is_none_or(|r| r.ticket != ticket) {
            trace!(ticket, "Ignoring superseded restart timer");
            return None;
        }
        self.restart = None;
        self.start(session)
    }

    /// Tear down whatever instance exists and start a fresh one now.
    pub fn force_restart(&mut self, session: &mut Session) -> Option<Generation> {
        self.cancel_restart();
        if self.running || self.capture.is_capturing() {
            self.capture.stop();
        }
        self.running = false;
        self.start(session)
    }

    /// Make sure recognition is running or about to be.
    pub fn ensure_listening(&mut self, session: &mut Session) -> Option<Generation> {
        if self.is_running() || self.restart.is_some() || !session.is_active() {
            return None;
        }
        info!("Recognition not running after turn; restarting");
        self.force_restart(session)
    }

    fn commit(&self, event: TranscriptEvent) -> Option<TranscriptEvent> {
        match self.filter.evaluate(&event.text, event.confidence) {
            CommitDecision::Accept => Some(event),
            CommitDecision::AcceptAmbiguous => {
                info!(
                    text = %event.text,
                    confidence = ?event.confidence,
                    "Accepting low-confidence transcript"
                );
                Some(event)
            }
            decision => {
                debug!(text = %event.text, ?decision, "Transcript not committed");
                None
            }
        }
    }

    /// The current instance reported its end; flush any buffered interim
    /// text before it is lost with the generation.
    fn instance_ended(&mut self, generation: Generation) -> Option<TranscriptEvent> {
        self.running = false;
        let (text, confidence) = self.pending.flush()?;
        self.commit(TranscriptEvent::final_result(text, confidence, generation))
    }

    fn schedule_restart(&mut self, reason: StopReason) {
        if self.restart.is_some() {
            trace!(?reason, "Restart already scheduled");
            return;
        }

        let delay = match reason {
            StopReason::NaturalEnd => self.config.natural_end_restart,
            StopReason::Benign => self.config.benign_error_restart,
            StopReason::Failure => self.config.failure_backoff(self.consecutive_failures),
        };

        self.restart_ticket += 1;
        let ticket = self.restart_ticket;
        let timer = self.mailbox.post_after(delay, LoopMessage::RestartDue { ticket });
        self.restart = Some(PendingRestart {
            ticket,
            due_at: Instant::now() + delay,
            timer,
        });
        self.state = RecognitionState::Restarting;
        debug!(?reason, delay_ms = delay.as_millis(), "Recognition restart scheduled");
    }

    fn cancel_restart(&mut self) {
        if let Some(restart) = self.restart.take() {
            restart.timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::{CaptureError, RecognitionErrorKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct StubCapture {
        capturing: AtomicBool,
        starts: AtomicU32,
        refuse: AtomicBool,
        sink: Mutex<Option<RecognitionSink>>,
    }

    impl SpeechCapture for StubCapture {
        fn start(&self, _language: &str, sink: RecognitionSink) -> Result<(), CaptureError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(CaptureError::PermissionDenied);
            }
            self.capturing.store(true, Ordering::SeqCst);
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn stop(&self) {
            self.capturing.store(false, Ordering::SeqCst);
        }

        fn is_capturing(&self) -> bool {
            self.capturing.load(Ordering::SeqCst)
        }
    }

    fn assert_elapsed(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {elapsed:?}"
        );
    }

    fn setup() -> (
        RecognitionSupervisor,
        Arc<StubCapture>,
        Session,
        mpsc::UnboundedReceiver<LoopMessage>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mailbox = Mailbox::new(tx, CancellationToken::new());
        let capture = Arc::new(StubCapture::default());
        let supervisor =
            RecognitionSupervisor::new(capture.clone(), mailbox, RecognitionConfig::default());
        (supervisor, capture, Session::new("en-IN", false, 10), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_start_advances_generation() {
        let (mut supervisor, capture, mut session, _rx) = setup();

        let first = supervisor.start(&mut session).unwrap();
        let second = supervisor.force_restart(&mut session).unwrap();

        assert!(second > first);
        assert_eq!(capture.starts.load(Ordering::SeqCst), 2);
        assert_eq!(supervisor.state(), RecognitionState::Listening);
        assert!(supervisor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_discarded() {
        let (mut supervisor, _capture, mut session, _rx) = setup();
        let old = supervisor.start(&mut session).unwrap();
        supervisor.force_restart(&mut session);

        let report = supervisor.handle_event(
            &session,
            old,
            RecognitionEvent::Final {
                text: "water bill".into(),
                confidence: Some(0.9),
            },
        );
        assert!(report.observed.is_none());
        assert!(report.committed.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_result_commits() {
        let (mut supervisor, _capture, mut session, _rx) = setup();
        let generation = supervisor.start(&mut session).unwrap();

        let report = supervisor.handle_event(
            &session,
            generation,
            RecognitionEvent::Final {
                text: " water bill ".into(),
                confidence: Some(0.9),
            },
        );
        assert_eq!(report.committed.unwrap().text, "water bill");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interim_commits_after_debounce() {
        let (mut supervisor, _capture, mut session, mut rx) = setup();
        let generation = supervisor.start(&mut session).unwrap();

        let report = supervisor.handle_event(
            &session,
            generation,
            RecognitionEvent::Partial {
                text: "gas bill".into(),
                confidence: None,
            },
        );
        assert!(report.committed.is_none());
        assert!(!report.observed.unwrap().is_final);

        let Some(LoopMessage::DebounceElapsed { generation: g, ticket }) = rx.recv().await else {
            panic!("expected debounce timer");
        };
        let committed = supervisor.handle_debounce(&session, g, ticket).unwrap();
        assert_eq!(committed.text, "gas bill");
        assert!(committed.is_final);
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_end_restarts_after_short_delay() {
        let (mut supervisor, _capture, mut session, mut rx) = setup();
        let generation = supervisor.start(&mut session).unwrap();

        supervisor.handle_event(&session, generation, RecognitionEvent::End);
        assert_eq!(supervisor.state(), RecognitionState::Restarting);
        let started = Instant::now();
        assert_eq!(
            supervisor.probe().restart_due_at,
            Some(started + Duration::from_millis(250))
        );

        let Some(LoopMessage::RestartDue { ticket }) = rx.recv().await else {
            panic!("expected restart timer");
        };
        assert_elapsed(started, Duration::from_millis(250));

        let next = supervisor.handle_restart_due(&mut session, ticket).unwrap();
        assert!(next > generation);
        assert!(supervisor.handle_restart_due(&mut session, ticket).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_flushes_buffered_interim() {
        let (mut supervisor, _capture, mut session, _rx) = setup();
        let generation = supervisor.start(&mut session).unwrap();
        supervisor.handle_event(
            &session,
            generation,
            RecognitionEvent::Partial {
                text: "property tax".into(),
                confidence: Some(0.8),
            },
        );

        let report = supervisor.handle_event(&session, generation, RecognitionEvent::End);
        assert_eq!(report.committed.unwrap().text, "property tax");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off() {
        let (mut supervisor, capture, mut session, mut rx) = setup();
        let generation = supervisor.start(&mut session).unwrap();
        capture.refuse.store(true, Ordering::SeqCst);

        supervisor.handle_event(
            &session,
            generation,
            RecognitionEvent::Error(RecognitionErrorKind::Network),
        );
        let started = Instant::now();
        let Some(LoopMessage::RestartDue { ticket }) = rx.recv().await else {
            panic!("expected restart timer");
        };
        assert_elapsed(started, Duration::from_millis(800));

        // Refused start counts as a second failure
        assert!(supervisor.handle_restart_due(&mut session, ticket).is_none());
        let started = Instant::now();
        let Some(LoopMessage::RestartDue { .. }) = rx.recv().await else {
            panic!("expected restart timer");
        };
        assert_elapsed(started, Duration::from_millis(1_600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_restart() {
        let (mut supervisor, capture, mut session, mut rx) = setup();
        let generation = supervisor.start(&mut session).unwrap();
        supervisor.handle_event(&session, generation, RecognitionEvent::End);

        supervisor.stop();
        assert_eq!(supervisor.state(), RecognitionState::Idle);
        assert!(!capture.is_capturing());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }
}
