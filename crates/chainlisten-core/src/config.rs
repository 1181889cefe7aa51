//! Listener configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::decoder::{DecodedEvent, LogDecoder};
use crate::error::ListenerError;

/// Receives human-readable, timestamped status lines.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives every successfully decoded event.
pub type EventCallback = Arc<dyn Fn(DecodedEvent) + Send + Sync>;

/// Timing constants of the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerTimings {
    /// Interval between liveness probes
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_interval_ms: u64,
    /// How long a probe may stay unanswered before the socket is terminated
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Fixed delay between a closure and the next connection attempt
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_keep_alive_ms() -> u64 { 60_000 }
fn default_probe_timeout_ms() -> u64 { 15_000 }
fn default_reconnect_ms() -> u64 { 1_000 }

impl Default for ListenerTimings {
    fn default() -> Self {
        Self {
            keep_alive_interval_ms: default_keep_alive_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            reconnect_delay_ms: default_reconnect_ms(),
        }
    }
}

impl ListenerTimings {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Every duration must be positive.
    pub fn validate(&self) -> Result<(), ListenerError> {
        for (name, ms) in [
            ("keep_alive_interval_ms", self.keep_alive_interval_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("reconnect_delay_ms", self.reconnect_delay_ms),
        ] {
            if ms == 0 {
                return Err(ListenerError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

/// Everything one listener needs. Read-only once the listener is spawned.
#[derive(Clone)]
pub struct ListenerConfig {
    /// WebSocket RPC endpoint (`ws://` or `wss://`)
    pub rpc_url: String,
    /// Contract whose logs are subscribed to
    pub contract_address: String,
    /// Event name; must resolve to exactly one signature in the decoder's ABI
    pub event_name: String,
    pub decoder: Arc<dyn LogDecoder>,
    pub timings: ListenerTimings,
    pub log: Option<LogSink>,
    pub callback: Option<EventCallback>,
}

impl ListenerConfig {
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: impl Into<String>,
        event_name: impl Into<String>,
        decoder: Arc<dyn LogDecoder>,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            event_name: event_name.into(),
            decoder,
            timings: ListenerTimings::default(),
            log: None,
            callback: None,
        }
    }

    pub fn with_timings(mut self, timings: ListenerTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_log(mut self, log: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log = Some(Arc::new(log));
        self
    }

    pub fn with_callback(mut self, callback: impl Fn(DecodedEvent) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Parse `rpc_url`. The scheme must be `ws` or `wss` (any case).
    pub fn endpoint(&self) -> Result<Url, ListenerError> {
        let url = Url::parse(&self.rpc_url).map_err(|e| {
            ListenerError::InvalidConfig(format!("rpc_url '{}' is not a valid URL: {e}", self.rpc_url))
        })?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ListenerError::InvalidConfig(format!(
                    "rpc_url must be a ws:// or wss:// URL, got scheme '{other}'"
                )))
            }
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ListenerError::InvalidConfig(format!("rpc_url '{}' has no host", self.rpc_url)));
        }
        Ok(url)
    }

    /// Check the URL and timings.
    pub fn validate(&self) -> Result<(), ListenerError> {
        self.endpoint()?;
        if self.event_name.is_empty() {
            return Err(ListenerError::InvalidConfig("event_name must not be empty".into()));
        }
        self.timings.validate()
    }
}

impl fmt::Debug for ListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("event_name", &self.event_name)
            .field("timings", &self.timings)
            .field("log", &self.log.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{RawLog, TopicHash};

    struct NoopDecoder;

    impl LogDecoder for NoopDecoder {
        fn topic_hash(&self, _event_name: &str) -> Result<TopicHash, ListenerError> {
            Ok(TopicHash::new("0x00"))
        }

        fn decode(&self, _log: &RawLog, _event_name: &str) -> Option<DecodedEvent> {
            None
        }
    }

    fn config(url: &str) -> ListenerConfig {
        ListenerConfig::new(url, "0x1", "Transfer", Arc::new(NoopDecoder))
    }

    #[test]
    fn timings_defaults_from_empty_json() {
        let t: ListenerTimings = serde_json::from_str("{}").unwrap();
        assert_eq!(t, ListenerTimings::default());
        assert_eq!(t.keep_alive_interval(), Duration::from_secs(60));
        assert_eq!(t.probe_timeout(), Duration::from_secs(15));
        assert_eq!(t.reconnect_delay(), Duration::from_secs(1));
    }

    #[test]
    fn zero_duration_rejected() {
        let t = ListenerTimings { probe_timeout_ms: 0, ..Default::default() };
        assert!(matches!(t.validate(), Err(ListenerError::InvalidConfig(_))));
    }

    #[test]
    fn url_scheme_checked() {
        assert!(config("wss://node.example").validate().is_ok());
        assert!(config("ws://127.0.0.1:8546").validate().is_ok());
        assert!(config("https://node.example").validate().is_err());
    }

    #[test]
    fn url_scheme_is_case_insensitive() {
        let cfg = config("WSS://Node.Example:8546/ws");
        assert!(cfg.validate().is_ok());
        let url = cfg.endpoint().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert!(url.as_str().starts_with("wss://"));
    }

    #[test]
    fn unparsable_url_rejected() {
        for bad in ["ws://bad host", "ws://", "not a url"] {
            assert!(
                matches!(config(bad).validate(), Err(ListenerError::InvalidConfig(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn debug_hides_closures() {
        let cfg = config("ws://x").with_log(|_| {});
        let s = format!("{cfg:?}");
        assert!(s.contains("log: true"));
        assert!(s.contains("callback: false"));
    }
}
