//! Mutable state of one voice session.
//!
//! The session is owned by the orchestrator and only touched from the session
//! loop. Once deactivated it refuses every further mutation, so callbacks
//! that race with teardown cannot resurrect it.

use std::collections::VecDeque;

use kiosk_core::{Generation, SessionSnapshot, SessionStatus, Turn};
use tracing::debug;

#[derive(Debug)]
pub struct Session {
    active: bool,
    generation: Generation,
    language: String,
    accessibility_mode: bool,
    status: SessionStatus,
    history: VecDeque<Turn>,
    history_cap: usize,
    last_transcript: Option<String>,
    last_reply: Option<String>,
    /// Status changes not yet published to the host.
    transitions: Vec<SessionStatus>,
}

impl Session {
    pub fn new(language: impl Into<String>, accessibility_mode: bool, history_cap: usize) -> Self {
        Self {
            active: true,
            generation: Generation::ZERO,
            language: language.into(),
            accessibility_mode,
            status: SessionStatus::Idle,
            history: VecDeque::with_capacity(history_cap),
            history_cap: history_cap.max(1),
            last_transcript: None,
            last_reply: None,
            transitions: Vec::new(),
        }
    }

    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a callback stamped with `generation` may still act.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.active && generation == self.generation
    }

    /// Move to a new recognition generation. No-op once deactivated.
    pub fn advance_generation(&mut self) -> Generation {
        if self.active {
            self.generation = self.generation.next();
        }
        self.generation
    }

    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Change status, recording the transition. Returns whether it changed.
    pub fn set_status(&mut self, status: SessionStatus) -> bool {
        if !self.active || self.status == status {
            return false;
        }
        debug!(from = self.status.label(), to = status.label(), "Session status");
        self.status = status;
        self.transitions.push(status);
        true
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub const fn accessibility_mode(&self) -> bool {
        self.accessibility_mode
    }

    /// Completed turns, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    pub fn record_turn(&mut self, turn: Turn) {
        if !self.active {
            return;
        }
        self.history.push_back(turn);
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    pub fn set_last_transcript(&mut self, text: &str) {
        if self.active {
            self.last_transcript = Some(text.to_string());
        }
    }

    pub fn set_last_reply(&mut self, text: &str) {
        if self.active {
            self.last_reply = Some(text.to_string());
        }
    }

    /// End the session. Idempotent.
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        if self.status != SessionStatus::Idle {
            self.status = SessionStatus::Idle;
            self.transitions.push(SessionStatus::Idle);
        }
        self.active = false;
    }

    /// Drain status changes recorded since the last call.
    pub fn take_transitions(&mut self) -> Vec<SessionStatus> {
        std::mem::take(&mut self.transitions)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.active,
            status: self.status,
            generation: self.generation,
            language: self.language.clone(),
            last_transcript: self.last_transcript.clone(),
            last_reply: self.last_reply.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kiosk_core::KioskAction;

    fn turn(n: usize) -> Turn {
        Turn {
            user_text: format!("question {n}"),
            reply_text: format!("answer {n}"),
            action: KioskAction::None,
            timestamp: Utc::now(),
            interrupted: false,
        }
    }

    #[test]
    fn test_generation_advances_and_gates_callbacks() {
        let mut session = Session::new("en-IN", false, 10);
        let first = session.advance_generation();
        let second = session.advance_generation();
        assert!(second > first);
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
    }

    #[test]
    fn test_history_is_capped_oldest_first() {
        let mut session = Session::new("en-IN", false, 3);
        for n in 0..5 {
            session.record_turn(turn(n));
        }
        let users: Vec<_> = session.history().map(|t| t.user_text.as_str()).collect();
        assert_eq!(users, ["question 2", "question 3", "question 4"]);
    }

    #[test]
    fn test_transitions_are_recorded_once() {
        let mut session = Session::new("en-IN", false, 10);
        assert!(session.set_status(SessionStatus::Listening));
        assert!(!session.set_status(SessionStatus::Listening));
        assert!(session.set_status(SessionStatus::Processing));
        assert_eq!(
            session.take_transitions(),
            [SessionStatus::Listening, SessionStatus::Processing]
        );
        assert!(session.take_transitions().is_empty());
    }

    #[test]
    fn test_no_mutation_after_deactivate() {
        let mut session = Session::new("hi-IN", false, 10);
        session.set_status(SessionStatus::Speaking);
        let generation = session.advance_generation();
        session.deactivate();
        let before = session.snapshot();

        assert!(!session.set_status(SessionStatus::Listening));
        assert_eq!(session.advance_generation(), generation);
        assert!(!session.is_current(generation));
        session.set_last_transcript("late");
        session.record_turn(turn(0));
        session.deactivate();

        assert_eq!(session.snapshot(), before);
        assert_eq!(before.status, SessionStatus::Idle);
        assert!(!before.active);
        assert_eq!(session.history().count(), 0);
    }
}
