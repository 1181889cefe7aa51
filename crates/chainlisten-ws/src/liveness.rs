//! Liveness monitor.
//!
//! Detects connections that are dead without the transport noticing: on a
//! fixed interval the session sends a `net_listening` probe and the monitor
//! arms a bounded wait for the reply. Only an explicit probe reply
//! (`{"id":2,"result":true}`) disarms that wait; other traffic does not.

use std::future;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::timers::TimerSlot;

/// What the monitor wants the session to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    /// The keep-alive interval elapsed; a probe should be sent.
    ProbeDue,
    /// The last probe went unanswered for too long; terminate the socket.
    ProbeTimedOut,
}

/// Keep-alive interval plus probe-timeout timer, owned by one session.
#[derive(Debug)]
pub struct LivenessMonitor {
    keep_alive_interval: Duration,
    probe_timeout: Duration,
    keep_alive: Option<Interval>,
    probe: TimerSlot,
}

impl LivenessMonitor {
    pub fn new(keep_alive_interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            keep_alive_interval,
            probe_timeout,
            keep_alive: None,
            probe: TimerSlot::new(),
        }
    }

    /// Start (or restart) the keep-alive interval. The first probe is due one
    /// full interval from now.
    pub fn start(&mut self) {
        let mut interval = time::interval_at(
            Instant::now() + self.keep_alive_interval,
            self.keep_alive_interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.keep_alive = Some(interval);
    }

    /// Stop sending probes. A probe already in flight stays armed.
    pub fn halt_keep_alive(&mut self) {
        self.keep_alive = None;
    }

    /// Cancel the interval and any pending probe timeout.
    pub fn stop(&mut self) {
        self.keep_alive = None;
        self.probe.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.keep_alive.is_some()
    }

    /// `true` while a probe is waiting for its reply.
    pub fn probe_pending(&self) -> bool {
        self.probe.is_armed()
    }

    /// A probe was just sent: arm the timeout.
    pub fn probe_sent(&mut self) {
        self.probe.arm(self.probe_timeout);
    }

    /// A probe reply arrived. Returns `true` if a probe was pending.
    pub fn acknowledge(&mut self) -> bool {
        self.probe.cancel()
    }

    /// Wait for the next liveness event. A timeout takes precedence over a
    /// tick that elapses at the same instant.
    ///
    /// Cancel-safe.
    pub async fn next_event(&mut self) -> LivenessEvent {
        tokio::select! {
            biased;
            _ = self.probe.fired() => LivenessEvent::ProbeTimedOut,
            _ = tick(&mut self.keep_alive) => LivenessEvent::ProbeDue,
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
