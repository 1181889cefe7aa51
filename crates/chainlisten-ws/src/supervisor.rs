//! Reconnect supervisor.
//!
//! After any closure the supervisor arms one reconnect timer. Scheduling
//! again while a reconnect is pending replaces the pending one, so a burst
//! of closures still yields a single new session.

use std::time::Duration;

use crate::timers::TimerSlot;

#[derive(Debug)]
pub struct ReconnectSupervisor {
    delay: Duration,
    pending: TimerSlot,
    attempts: u64,
}

impl ReconnectSupervisor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: TimerSlot::new(),
            attempts: 0,
        }
    }

    /// Arm the reconnect timer (cancel-then-set).
    pub fn schedule(&mut self) {
        self.pending.arm(self.delay);
    }

    /// Drop any pending reconnect. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_armed()
    }

    /// Number of reconnects that have come due so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Wait for the pending reconnect to come due. Never completes if
    /// nothing is scheduled.
    ///
    /// Cancel-safe.
    pub async fn due(&mut self) {
        self.pending.fired().await;
        self.attempts += 1;
    }
}
