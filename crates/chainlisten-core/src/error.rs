//! Error types for listener construction and the decode collaborator.

use thiserror::Error;

/// Errors surfaced to the caller of ChainListen.
///
/// Transport problems (connect failures, dropped sockets, liveness timeouts)
/// never reach the caller; they are absorbed by the reconnect loop. What is
/// left are configuration problems detected before the first connection.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The requested event name does not exist in the supplied ABI.
    #[error("Event '{name}' not found in ABI")]
    EventNotFound { name: String },

    /// The event name is overloaded and does not identify a single signature.
    #[error("Event '{name}' is ambiguous: {count} signatures share this name")]
    AmbiguousEvent { name: String, count: usize },

    /// The ABI JSON could not be parsed.
    #[error("Invalid ABI: {0}")]
    InvalidAbi(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A JSON payload could not be (de)serialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl ListenerError {
    /// Returns `true` if this error was caused by the ABI / event name pair.
    pub fn is_abi_error(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound { .. } | Self::AmbiguousEvent { .. } | Self::InvalidAbi(_)
        )
    }
}
