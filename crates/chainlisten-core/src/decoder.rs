//! The log decoder collaborator.
//!
//! The listener never interprets ABI data itself. It asks a [`LogDecoder`] for
//! the topic hash of the configured event (to build the subscription filter)
//! and hands it every raw log that arrives on the active subscription.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ListenerError;
use crate::types::NormalizedValue;

/// keccak256 of an event's canonical signature, `0x`-prefixed lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicHash(pub String);

impl TopicHash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw topic string.
    pub fn matches(&self, topic: &str) -> bool {
        self.0.eq_ignore_ascii_case(topic)
    }
}

impl std::fmt::Display for TopicHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A log object exactly as delivered in `eth_subscription` notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed arguments, hex with 0x prefix.
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<String>,
    /// `true` if the log was removed by a chain reorganisation.
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    /// Decoded `data` bytes. Malformed hex yields `None`.
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        let hex = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(hex).ok()
    }

    pub fn block_number_u64(&self) -> Option<u64> {
        hex_str_to_u64(self.block_number.as_deref())
    }

    pub fn log_index_u64(&self) -> Option<u64> {
        hex_str_to_u64(self.log_index.as_deref())
    }

    /// topics[0], the event signature hash for non-anonymous events.
    pub fn signature_topic(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

fn hex_str_to_u64(s: Option<&str>) -> Option<u64> {
    s.and_then(|h| u64::from_str_radix(h.strip_prefix("0x").unwrap_or(h), 16).ok())
}

/// A decoded contract event, handed to the caller's callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Event name, e.g. "Transfer"
    pub name: String,
    /// Canonical signature, e.g. "Transfer(address,address,uint256)"
    pub signature: String,
    /// Contract address that emitted the log
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    /// Arguments in ABI declaration order
    pub args: IndexMap<String, NormalizedValue>,
}

impl DecodedEvent {
    /// Get an argument by name.
    pub fn arg(&self, name: &str) -> Option<&NormalizedValue> {
        self.args.get(name)
    }
}

impl std::fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<_> = self.args.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{}({})", self.name, parts.join(", "))
    }
}

/// Resolves event topics and decodes raw logs for one contract ABI.
///
/// Implementations must be cheap to call from the listener task; they are
/// invoked once per notification.
pub trait LogDecoder: Send + Sync {
    /// Topic hash used as the `eth_subscribe` filter for `event_name`.
    ///
    /// Fails if the name does not resolve to exactly one event signature.
    fn topic_hash(&self, event_name: &str) -> Result<TopicHash, ListenerError>;

    /// Decode `log` as `event_name`. `None` means "not this event".
    fn decode(&self, log: &RawLog, event_name: &str) -> Option<DecodedEvent>;
}
