//! chainlisten-ws — a resilient `eth_subscribe("logs")` listener.
//!
//! # Features
//! - Subscribes to a single contract event over WebSocket
//! - Liveness probing with `net_listening` and forced termination on timeout
//! - Reconnect after a fixed delay on any closure, resubscribing from scratch
//! - Idempotent `stop` that cancels every timer and suppresses reconnection
//!
//! ## Architecture
//! ```text
//! ListenerHandle ──stop──► supervisor task
//!                              │
//!                              ▼
//!                   Session (one socket) ──► LivenessMonitor
//!                              │                 (keep-alive + probe timeout)
//!                              ▼
//!                   message codec ──► LogDecoder ──► callback
//!                              │
//!                       close (any origin)
//!                              ▼
//!                   ReconnectSupervisor (fixed delay) ──► new Session
//! ```

pub mod listener;
pub mod liveness;
mod reporter;
pub mod session;
pub mod supervisor;
pub mod timers;

pub use listener::{ListenerHandle, ResilientListener};
pub use liveness::{LivenessEvent, LivenessMonitor};
pub use session::{Routed, SessionState};
pub use supervisor::ReconnectSupervisor;
pub use timers::TimerSlot;
