//! Reply playback with a guaranteed completion.
//!
//! Platform synthesizers sometimes never report the end of an utterance.
//! Every utterance therefore races the synthesizer against cancellation and
//! a length-proportional safety timeout; whichever finishes first resolves
//! the utterance's [`CompletionSignal`], exactly once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kiosk_core::{SessionStatus, SpeechSynthesizer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::PlaybackConfig;
use crate::mailbox::{LoopMessage, Mailbox};
use crate::orchestrator::TurnId;
use crate::session::Session;
use crate::text;

/// Identifies one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// How an utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    /// The synthesizer reported an error.
    Failed,
    Cancelled,
    /// The synthesizer never reported completion.
    TimedOut,
}

/// Why something is being spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPurpose {
    Reply(TurnId),
    RePrompt { index: u32 },
}

/// Once-only completion flag shared by everything that can end an utterance.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    resolved: Arc<AtomicBool>,
}

impl CompletionSignal {
    /// Claim the completion. Returns `false` if something else already did.
    pub fn resolve(&self) -> bool {
        !self.resolved.swap(true, Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }
}

/// An utterance in flight.
#[derive(Debug)]
pub struct PlaybackRequest {
    pub id: UtteranceId,
    pub text: String,
    pub language: String,
    pub purpose: PlaybackPurpose,
    cancel: CancellationToken,
    signal: CompletionSignal,
}

pub struct PlaybackController {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    mailbox: Mailbox,
    config: PlaybackConfig,
    current: Option<PlaybackRequest>,
    next_id: u64,
}

impl PlaybackController {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, mailbox: Mailbox, config: PlaybackConfig) -> Self {
        Self {
            synthesizer,
            mailbox,
            config,
            current: None,
            next_id: 0,
        }
    }

    pub const fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&PlaybackRequest> {
        self.current.as_ref()
    }

    /// Speak `text` in the session language, superseding any utterance in
    /// flight. Returns `None` when there is nothing to say or the session has
    /// ended.
    pub fn speak(
        &mut self,
        session: &mut Session,
        text: &str,
        purpose: PlaybackPurpose,
    ) -> Option<UtteranceId> {
        if !session.is_active() {
            return None;
        }
        let text = text::for_speech(text);
        if text.is_empty() {
            debug!(?purpose, "Nothing to speak");
            return None;
        }

        if let Some(previous) = self.abort() {
            debug!(superseded = %previous.id, "Superseding utterance");
        }

        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        let language = session.language().to_string();
        let signal = CompletionSignal::default();
        let cancel = self.mailbox.child_token();
        let timeout = self.config.safety_timeout(&text);

        session.set_status(SessionStatus::Speaking);
        debug!(utterance = %id, ?purpose, chars = text.chars().count(), timeout_ms = timeout.as_millis(), "Speaking");

        self.spawn_utterance(id, text.clone(), language.clone(), cancel.clone(), signal.clone(), timeout);

        self.current = Some(PlaybackRequest {
            id,
            text,
            language,
            purpose,
            cancel,
            signal,
        });
        Some(id)
    }

    /// Stop the utterance in flight. Returns what was cut off.
    pub fn cancel(&mut self, session: &mut Session) -> Option<(UtteranceId, PlaybackPurpose)> {
        let request = self.abort()?;
        if session.status() == SessionStatus::Speaking {
            session.set_status(SessionStatus::Listening);
        }
        debug!(
            utterance = %request.id,
            language = %request.language,
            text = %request.text,
            "Playback cancelled"
        );
        Some((request.id, request.purpose))
    }

    /// Stop the utterance in flight without touching session status.
    pub fn abort(&mut self) -> Option<PlaybackRequest> {
        let request = self.current.take()?;
        self.synthesizer.cancel();
        request.cancel.cancel();
        request.signal.resolve();
        Some(request)
    }

    /// Accept a completion posted by an utterance task. Completions for
    /// anything but the current utterance are ignored.
    pub fn finish(
        &mut self,
        session: &mut Session,
        id: UtteranceId,
        outcome: PlaybackOutcome,
    ) -> Option<PlaybackPurpose> {
        if self.current.as_ref().is_none_or(|r| r.id != id) {
            trace!(utterance = %id, ?outcome, "Ignoring completion of superseded utterance");
            return None;
        }
        let request = self.current.take()?;
        if session.status() == SessionStatus::Speaking {
            session.set_status(SessionStatus::Listening);
        }
        debug!(utterance = %id, ?outcome, "Playback finished");
        Some(request.purpose)
    }

    fn spawn_utterance(
        &self,
        id: UtteranceId,
        text: String,
        language: String,
        cancel: CancellationToken,
        signal: CompletionSignal,
        timeout: std::time::Duration,
    ) {
        let synthesizer = Arc::clone(&self.synthesizer);
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => PlaybackOutcome::Cancelled,
                result = synthesizer.speak(&text, &language) => match result {
                    Ok(()) => PlaybackOutcome::Completed,
                    Err(e) => {
                        warn!(utterance = %id, error = %e, "Speech synthesis failed");
                        PlaybackOutcome::Failed
                    }
                },
                () = tokio::time::sleep(timeout) => {
                    warn!(
                        utterance = %id,
                        timeout_ms = timeout.as_millis(),
                        "Synthesizer never reported completion; forcing it"
                    );
                    stop_stalled(synthesizer.as_ref(), &cancel);
                    PlaybackOutcome::TimedOut
                }
            };

            if signal.resolve() {
                mailbox.post(LoopMessage::PlaybackFinished {
                    utterance: id,
                    outcome,
                });
            }
        });
    }
}

/// Silence a synthesizer that never reported completion, unless a newer
/// utterance has already taken it over.
fn stop_stalled(synthesizer: &dyn SpeechSynthesizer, superseded: &CancellationToken) -> bool {
    if superseded.is_cancelled() {
        trace!("Timed-out utterance already superseded; leaving synthesizer alone");
        return false;
    }
    synthesizer.cancel();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiosk_core::SynthesisError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Never reports completion.
    #[derive(Default)]
    struct SilentSynth {
        cancels: AtomicU32,
    }

    #[async_trait]
    impl SpeechSynthesizer for SilentSynth {
        async fn speak(&self, _text: &str, _language: &str) -> Result<(), SynthesisError> {
            std::future::pending().await
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct QuickSynth;

    #[async_trait]
    impl SpeechSynthesizer for QuickSynth {
        async fn speak(&self, _text: &str, _language: &str) -> Result<(), SynthesisError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }

        fn cancel(&self) {}
    }

    fn controller(
        synth: Arc<dyn SpeechSynthesizer>,
    ) -> (PlaybackController, Session, mpsc::UnboundedReceiver<LoopMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mailbox = Mailbox::new(tx, CancellationToken::new());
        let controller = PlaybackController::new(synth, mailbox, PlaybackConfig::default());
        let mut session = Session::new("en-IN", false, 10);
        session.set_status(SessionStatus::Listening);
        (controller, session, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_reaches_loop_and_restores_listening() {
        let (mut playback, mut session, mut rx) = controller(Arc::new(QuickSynth));

        let id = playback
            .speak(&mut session, "Opening your water bill.", PlaybackPurpose::RePrompt { index: 0 })
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Speaking);

        let Some(LoopMessage::PlaybackFinished { utterance, outcome }) = rx.recv().await else {
            panic!("expected completion");
        };
        assert_eq!(utterance, id);
        assert_eq!(outcome, PlaybackOutcome::Completed);

        assert_eq!(
            playback.finish(&mut session, utterance, outcome),
            Some(PlaybackPurpose::RePrompt { index: 0 })
        );
        assert_eq!(session.status(), SessionStatus::Listening);
        assert!(!playback.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_timeout_forces_completion() {
        let synth = Arc::new(SilentSynth::default());
        let (mut playback, mut session, mut rx) = controller(synth.clone());
        let text = "Your bill is due on Friday.";
        let expected = PlaybackConfig::default().safety_timeout(text);

        let started = tokio::time::Instant::now();
        playback
            .speak(&mut session, text, PlaybackPurpose::RePrompt { index: 1 })
            .unwrap();

        let Some(LoopMessage::PlaybackFinished { outcome, .. }) = rx.recv().await else {
            panic!("expected forced completion");
        };
        assert_eq!(outcome, PlaybackOutcome::TimedOut);
        assert!(started.elapsed() >= expected);
        assert_eq!(synth.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resolves_exactly_once() {
        let (mut playback, mut session, mut rx) = controller(Arc::new(SilentSynth::default()));
        let spoken = playback
            .speak(&mut session, "Please wait.", PlaybackPurpose::RePrompt { index: 0 })
            .unwrap();

        let (id, _) = playback.cancel(&mut session).unwrap();
        assert_eq!(id, spoken);
        assert_eq!(session.status(), SessionStatus::Listening);

        // The utterance task must not post a second completion
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        assert!(playback.cancel(&mut session).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_utterance_supersedes_previous() {
        let (mut playback, mut session, mut rx) = controller(Arc::new(QuickSynth));
        let first = playback
            .speak(&mut session, "First.", PlaybackPurpose::RePrompt { index: 0 })
            .unwrap();
        let second = playback
            .speak(&mut session, "Second.", PlaybackPurpose::RePrompt { index: 1 })
            .unwrap();

        let Some(LoopMessage::PlaybackFinished { utterance, .. }) = rx.recv().await else {
            panic!("expected completion");
        };
        assert_eq!(utterance, second);
        assert!(rx.try_recv().is_err());

        // A late completion for the first utterance is ignored
        assert!(playback.finish(&mut session, first, PlaybackOutcome::Completed).is_none());
        assert!(playback.finish(&mut session, second, PlaybackOutcome::Completed).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_spoken_when_empty_or_inactive() {
        let (mut playback, mut session, _rx) = controller(Arc::new(QuickSynth));
        assert!(playback.speak(&mut session, " ** ", PlaybackPurpose::RePrompt { index: 0 }).is_none());

        session.deactivate();
        assert!(playback.speak(&mut session, "Hello", PlaybackPurpose::RePrompt { index: 0 }).is_none());
    }

    #[test]
    fn test_stalled_synth_is_stopped_only_while_current() {
        let synth = SilentSynth::default();
        let token = CancellationToken::new();
        assert!(stop_stalled(&synth, &token));
        assert_eq!(synth.cancels.load(Ordering::SeqCst), 1);

        // A newer utterance owns the synthesizer now
        token.cancel();
        assert!(!stop_stalled(&synth, &token));
        assert_eq!(synth.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signal_resolves_once() {
        let signal = CompletionSignal::default();
        assert!(!signal.is_resolved());
        assert!(signal.resolve());
        assert!(!signal.clone().resolve());
        assert!(signal.is_resolved());
    }
}
