//! Messages into the session loop.
//!
//! Every asynchronous boundary (recognition callbacks, timers, playback
//! completion, resolver results) reaches the session as a [`LoopMessage`]
//! carrying the ticket or generation it was issued under. The loop drops
//! messages whose ticket is no longer current.

use std::time::Duration;

use kiosk_core::{Generation, RecognitionEvent};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::orchestrator::TurnId;
use crate::playback::{PlaybackOutcome, UtteranceId};
use crate::resolver::Resolution;

#[derive(Debug)]
pub enum LoopMessage {
    Recognition {
        generation: Generation,
        event: RecognitionEvent,
    },
    RestartDue {
        ticket: u64,
    },
    DebounceElapsed {
        generation: Generation,
        ticket: u64,
    },
    PlaybackFinished {
        utterance: UtteranceId,
        outcome: PlaybackOutcome,
    },
    Resolved {
        turn: TurnId,
        resolution: Resolution,
    },
    RePromptDue {
        ticket: u64,
    },
    HealthTick,
    Deactivate {
        ack: oneshot::Sender<()>,
    },
}

/// Sending half of the session loop, shared by every component.
///
/// Tasks and timers spawned through the mailbox are tied to the session's
/// shutdown token and never outlive it.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<LoopMessage>,
    shutdown: CancellationToken,
}

impl Mailbox {
    pub const fn new(tx: mpsc::UnboundedSender<LoopMessage>, shutdown: CancellationToken) -> Self {
        Self { tx, shutdown }
    }

    /// Post a message. Dropped silently once the session has shut down.
    pub fn post(&self, message: LoopMessage) {
        if self.shutdown.is_cancelled() {
            trace!(?message, "Session closed; dropping message");
            return;
        }
        if let Err(e) = self.tx.send(message) {
            trace!(message = ?e.0, "Session loop gone; dropping message");
        }
    }

    /// A token cancelled when the session shuts down.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Post `message` after `delay` unless the returned token is cancelled
    /// first.
    pub fn post_after(&self, delay: Duration, message: LoopMessage) -> CancellationToken {
        let token = self.child_token();
        let guard = token.clone();
        let mailbox = self.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = guard.cancelled() => {}
                () = tokio::time::sleep(delay) => mailbox.post(message),
            }
        });

        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_post_after_delivers_once_elapsed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mailbox = Mailbox::new(tx, CancellationToken::new());

        let _timer = mailbox.post_after(Duration::from_secs(2), LoopMessage::HealthTick);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(matches!(rx.try_recv(), Ok(LoopMessage::HealthTick)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mailbox = Mailbox::new(tx, CancellationToken::new());

        let timer = mailbox.post_after(Duration::from_secs(1), LoopMessage::RePromptDue { ticket: 1 });
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_posts_and_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let mailbox = Mailbox::new(tx, shutdown.clone());

        let _timer = mailbox.post_after(Duration::from_secs(1), LoopMessage::HealthTick);
        shutdown.cancel();
        mailbox.post(LoopMessage::HealthTick);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
