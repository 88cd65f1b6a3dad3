//! Silence re-prompts.
//!
//! After a turn completes the scheduler waits for the citizen to speak. If the
//! silence window elapses a re-prompt is spoken, up to a fixed number of times.
//! Any committed transcript resets the count.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RePromptConfig;
use crate::mailbox::{LoopMessage, Mailbox};
use crate::phrases::Phrasebook;

pub struct RePromptScheduler {
    config: RePromptConfig,
    mailbox: Mailbox,
    fired: u32,
    ticket: u64,
    timer: Option<CancellationToken>,
}

impl RePromptScheduler {
    pub const fn new(config: RePromptConfig, mailbox: Mailbox) -> Self {
        Self {
            config,
            mailbox,
            fired: 0,
            ticket: 0,
            timer: None,
        }
    }

    /// Re-prompts spoken since the last transcript.
    pub const fn fired(&self) -> u32 {
        self.fired
    }

    #[cfg(test)]
    pub const fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Start the silence window. Returns `false` once the budget is spent.
    pub fn arm(&mut self) -> bool {
        self.cancel();
        if self.fired >= self.config.max_prompts {
            debug!(fired = self.fired, "Re-prompt budget exhausted; staying quiet");
            return false;
        }
        let timer = self
            .mailbox
            .post_after(self.config.silence, LoopMessage::RePromptDue { ticket: self.ticket });
        self.timer = Some(timer);
        true
    }

    /// Cancel the silence window, keeping the count.
    pub fn cancel(&mut self) {
        self.ticket += 1;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// The citizen spoke: cancel and forget earlier re-prompts.
    pub fn reset(&mut self) {
        self.cancel();
        self.fired = 0;
    }

    /// The timer for `ticket` elapsed. Returns the index and phrase to speak.
    pub fn fire(&mut self, ticket: u64, phrases: Phrasebook) -> Option<(u32, &'static str)> {
        if ticket != self.ticket || self.timer.take().is_none() {
            return None;
        }
        let index = self.fired;
        self.fired += 1;
        Some((index, phrases.reprompt(index)))
    }
}
