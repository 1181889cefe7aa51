//! `ResilientListener` — spawns the supervisor task and hands back a
//! [`ListenerHandle`].
//!
//! # Usage
//! ```no_run
//! use std::sync::Arc;
//! use chainlisten_core::ListenerConfig;
//! use chainlisten_evm::AbiLogDecoder;
//! use chainlisten_ws::ResilientListener;
//!
//! # async fn demo(abi_json: &str) -> Result<(), chainlisten_core::ListenerError> {
//! let decoder = Arc::new(AbiLogDecoder::from_abi_json(abi_json)?);
//! let config = ListenerConfig::new(
//!     "wss://mainnet.infura.io/ws/v3/YOUR_KEY",
//!     "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
//!     "Transfer",
//!     decoder,
//! )
//! .with_callback(|event| println!("{event}"));
//!
//! let handle = ResilientListener::spawn(config)?;
//! // ...
//! handle.stop();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chainlisten_core::{error::ListenerError, ListenerConfig};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::{self, SessionContext, SessionEnd};
use crate::supervisor::ReconnectSupervisor;

/// Entry point for resilient event listeners.
pub struct ResilientListener;

impl ResilientListener {
    /// Validate `config` and start connecting immediately on the current
    /// Tokio runtime.
    ///
    /// # Errors
    /// Fails if the configuration is invalid, the event name does not
    /// resolve to exactly one event, or no Tokio runtime is running.
    pub fn spawn(config: ListenerConfig) -> Result<ListenerHandle, ListenerError> {
        let runtime = Handle::try_current()
            .map_err(|e| ListenerError::InvalidConfig(format!("no Tokio runtime: {e}")))?;
        let ctx = Arc::new(SessionContext::new(config)?);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = runtime.spawn(supervise(ctx, stop_rx));
        Ok(ListenerHandle {
            stop_tx,
            task: Some(task),
        })
    }
}

/// Handle to a running listener. Dropping it stops the listener.
pub struct ListenerHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stop the listener: close the live socket, cancel every timer and never
    /// reconnect. Idempotent.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Wait for the background task to exit. Only returns after [`stop`]
    /// has been called.
    ///
    /// [`stop`]: ListenerHandle::stop
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "listener task failed");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Session → close → fixed delay → new session, until stopped.
async fn supervise(ctx: Arc<SessionContext>, mut stop: watch::Receiver<bool>) {
    let mut reconnect = ReconnectSupervisor::new(ctx.config.timings.reconnect_delay());

    loop {
        if *stop.borrow() {
            break;
        }
        if session::run(&ctx, &mut stop).await == SessionEnd::Stopped {
            break;
        }

        reconnect.schedule();
        tokio::select! {
            biased;
            _ = session::stopped(&mut stop) => {
                reconnect.cancel();
                break;
            }
            _ = reconnect.due() => {
                tracing::debug!(attempt = reconnect.attempts(), "reconnecting");
            }
        }
    }

    ctx.reporter.info("Listener stopped");
}
