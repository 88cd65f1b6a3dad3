//! Turn orchestration.
//!
//! Owns the session and runs one turn at a time: resolve the committed
//! transcript, hand the reply to playback, dispatch the action once the reply
//! has been heard, and record the turn. Transcripts committed while a turn is
//! in flight wait in a single slot; a newer one replaces an older one.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use kiosk_core::{
    ActionExecutor, DialogueRequest, HistoryEntry, KioskAction, Language, PageContextProvider,
    SessionStatus, Turn,
};
use tracing::{debug, error, info, trace};

use crate::mailbox::{LoopMessage, Mailbox};
use crate::playback::{PlaybackOutcome, UtteranceId};
use crate::resolver::{Resolution, ResponseResolver};
use crate::session::Session;

/// Identifies one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Started(TurnId),
    /// Waiting behind the turn in flight.
    Queued,
    Ignored,
}

/// A turn that has finished, one way or another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnCompletion {
    pub turn: TurnId,
    /// The action handed to the executor, if any.
    pub dispatched: Option<KioskAction>,
    pub interrupted: bool,
}

#[derive(Debug)]
struct InFlightTurn {
    id: TurnId,
    user_text: String,
    resolution: Option<Resolution>,
    utterance: Option<UtteranceId>,
}

pub struct DialogueOrchestrator {
    session: Session,
    resolver: Arc<ResponseResolver>,
    executor: Arc<dyn ActionExecutor>,
    page_context: Arc<dyn PageContextProvider>,
    mailbox: Mailbox,
    in_flight: Option<InFlightTurn>,
    pending: Option<String>,
    next_turn: u64,
}

impl DialogueOrchestrator {
    pub fn new(
        session: Session,
        resolver: Arc<ResponseResolver>,
        executor: Arc<dyn ActionExecutor>,
        page_context: Arc<dyn PageContextProvider>,
        mailbox: Mailbox,
    ) -> Self {
        Self {
            session,
            resolver,
            executor,
            page_context,
            mailbox,
            in_flight: None,
            pending: None,
            next_turn: 0,
        }
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// A turn is being resolved or spoken.
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        self.in_flight.as_ref().map(|t| t.id)
    }

    /// Accept a committed transcript.
    pub fn handle(&mut self, transcript: &str) -> HandleOutcome {
        let transcript = transcript.trim();
        if !self.session.is_active() || transcript.is_empty() {
            return HandleOutcome::Ignored;
        }

        if self.in_flight.is_some() {
            if let Some(dropped) = self.pending.replace(transcript.to_string()) {
                debug!(%dropped, "Queued transcript replaced by a newer one");
            }
            debug!(text = %transcript, "Turn in flight; transcript queued");
            return HandleOutcome::Queued;
        }

        HandleOutcome::Started(self.begin(transcript))
    }

    /// Start the queued transcript, if any. Only valid between turns.
    pub fn start_pending(&mut self) -> Option<TurnId> {
        if self.in_flight.is_some() || !self.session.is_active() {
            return None;
        }
        let transcript = self.pending.take()?;
        Some(self.begin(&transcript))
    }

    /// A resolver task finished. Returns the reply to speak.
    pub fn on_resolved(&mut self, turn: TurnId, resolution: Resolution) -> Option<String> {
        if !self.session.is_active() {
            return None;
        }
        let Some(current) = self.in_flight.as_mut().filter(|t| t.id == turn) else {
            trace!(%turn, "Ignoring resolution for a turn no longer in flight");
            return None;
        };

        info!(
            %turn,
            source = %resolution.source,
            action = resolution.action.label(),
            "Turn resolved"
        );
        self.session.set_last_reply(&resolution.reply_text);
        let reply = resolution.reply_text.clone();
        current.resolution = Some(resolution);
        Some(reply)
    }

    /// Playback of the reply for `turn` started.
    pub fn mark_speaking(&mut self, turn: TurnId, utterance: UtteranceId) {
        if let Some(current) = self.in_flight.as_mut().filter(|t| t.id == turn) {
            current.utterance = Some(utterance);
        }
    }

    /// The reply for `turn` finished playing. Dispatches the action unless
    /// playback was cut short by the citizen.
    pub fn finish(&mut self, turn: TurnId, outcome: PlaybackOutcome) -> Option<TurnCompletion> {
        if self.in_flight.as_ref().is_none_or(|t| t.id != turn) {
            trace!(%turn, ?outcome, "Ignoring completion for a turn no longer in flight");
            return None;
        }
        let current = self.in_flight.take()?;
        let interrupted = outcome == PlaybackOutcome::Cancelled;
        let resolution = current.resolution.unwrap_or_else(|| {
            Resolution::apology(Language::from_tag(self.session.language()))
        });

        let dispatched = if interrupted || resolution.action.is_none() || !self.session.is_active() {
            None
        } else {
            info!(%turn, action = resolution.action.label(), "Dispatching action");
            self.executor.execute(&resolution.action);
            Some(resolution.action.clone())
        };

        if interrupted {
            info!(%turn, utterance = ?current.utterance, "Reply interrupted; action withheld");
        }

        self.session.record_turn(Turn {
            user_text: current.user_text,
            reply_text: resolution.reply_text,
            action: resolution.action,
            timestamp: Utc::now(),
            interrupted,
        });
        if self.session.status() == SessionStatus::Processing {
            self.session.set_status(SessionStatus::Listening);
        }

        Some(TurnCompletion {
            turn,
            dispatched,
            interrupted,
        })
    }

    /// Drop the turn in flight and anything queued.
    pub fn abandon(&mut self) {
        if let Some(turn) = self.in_flight.take() {
            debug!(turn = %turn.id, "Abandoning turn");
        }
        self.pending = None;
    }

    fn begin(&mut self, transcript: &str) -> TurnId {
        self.next_turn += 1;
        let turn = TurnId(self.next_turn);

        info!(%turn, text = %transcript, "Turn started");
        self.session.set_last_transcript(transcript);
        self.session.set_status(SessionStatus::Processing);

        let request = self.build_request(transcript);
        self.spawn_resolution(turn, request);

        self.in_flight = Some(InFlightTurn {
            id: turn,
            user_text: transcript.to_string(),
            resolution: None,
            utterance: None,
        });
        turn
    }

    fn build_request(&self, transcript: &str) -> DialogueRequest {
        let accessibility_mode = self.session.accessibility_mode();
        DialogueRequest {
            transcript: transcript.to_string(),
            screen_context: self.page_context.current_screen(),
            language: self.session.language().to_string(),
            history: self.session.history().map(HistoryEntry::from).collect(),
            accessibility_mode,
            page_context: accessibility_mode.then(|| self.page_context.snapshot()),
        }
    }

    /// Resolve on a separate task so a panic in a collaborator becomes an
    /// apology instead of a stuck turn.
    fn spawn_resolution(&self, turn: TurnId, request: DialogueRequest) {
        let resolver = Arc::clone(&self.resolver);
        let mailbox = self.mailbox.clone();
        let shutdown = self.mailbox.child_token();
        let language = Language::from_tag(&request.language);

        tokio::spawn(async move {
            let mut task = tokio::spawn(async move { resolver.resolve(&request).await });

            let resolution = tokio::select! {
                joined = &mut task => match joined {
                    Ok(resolution) => resolution,
                    Err(e) => {
                        error!(%turn, error = %e, "Resolution task failed; apologising");
                        Resolution::apology(language)
                    }
                },
                () = shutdown.cancelled() => {
                    task.abort();
                    return;
                }
            };

            mailbox.post(LoopMessage::Resolved { turn, resolution });
        });
    }
}
