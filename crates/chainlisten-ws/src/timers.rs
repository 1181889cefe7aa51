//! Single-shot timer slots.
//!
//! Every timer kind the listener uses (probe timeout, reconnect delay) lives
//! in its own [`TimerSlot`]. A slot holds at most one deadline: arming it
//! drops the previous `Sleep`, so a replaced or cancelled timer can never fire.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Instant, Sleep};

/// Holds zero or one pending deadline.
#[derive(Debug, Default)]
pub struct TimerSlot {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot to fire `after` from now, replacing any armed deadline.
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Box::pin(time::sleep(after)));
    }

    /// Disarm the slot. Returns `true` if a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The instant the armed deadline elapses.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|s| s.deadline())
    }

    /// Completes when the armed deadline elapses, disarming the slot.
    /// Never completes while the slot is empty.
    ///
    /// Cancel-safe: dropping the future leaves the deadline armed.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => future::pending::<()>().await,
        }
    }
}
