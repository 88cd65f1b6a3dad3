//! Recognizer liveness monitoring.
//!
//! A periodic tick asks whether recognition is still running. The check is
//! policy-free: it reports a verdict and the session loop decides what to do.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::HealthConfig;
use crate::mailbox::{LoopMessage, Mailbox};
use crate::recognition::RecognizerProbe;

/// Result of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    /// A turn is being resolved or spoken; leave recognition alone.
    TurnInFlight,
    /// A restart is scheduled and not overdue by a full tick; let it run.
    RestartPending,
    /// Nothing is running or coming; force a restart.
    Restart,
}

/// Periodic liveness monitor for the recognizer.
pub struct HealthMonitor {
    tick: Duration,
    cancel_token: Option<CancellationToken>,
}

impl HealthMonitor {
    pub const fn new(config: HealthConfig) -> Self {
        Self {
            tick: config.tick,
            cancel_token: None,
        }
    }

    /// Start posting [`LoopMessage::HealthTick`] every tick.
    pub fn start(&mut self, mailbox: &Mailbox) {
        self.stop();

        let cancel_token = mailbox.child_token();
        let guard = cancel_token.clone();
        let mailbox = mailbox.clone();
        let period = self.tick;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            debug!(tick_ms = period.as_millis(), "Starting health monitor");
            loop {
                tokio::select! {
                    _ = ticker.tick() => mailbox.post(LoopMessage::HealthTick),
                    () = guard.cancelled() => {
                        debug!("Health monitor cancelled");
                        break;
                    }
                }
            }
        });

        self.cancel_token = Some(cancel_token);
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }

    #[cfg(test)]
    pub const fn is_running(&self) -> bool {
        self.cancel_token.is_some()
    }

    /// Judge recognizer liveness at `now`.
    pub fn assess(&self, probe: RecognizerProbe, turn_in_flight: bool, now: Instant) -> HealthVerdict {
        if probe.running {
            return HealthVerdict::Healthy;
        }
        if turn_in_flight {
            return HealthVerdict::TurnInFlight;
        }
        match probe.restart_due_at {
            Some(due) if now < due + self.tick => HealthVerdict::RestartPending,
            _ => HealthVerdict::Restart,
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
