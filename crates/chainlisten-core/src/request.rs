//! JSON-RPC 2.0 wire types and the two outbound requests the listener sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request id of the `eth_subscribe` call. Only one is ever outstanding.
pub const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// Request id of the `net_listening` liveness probe.
pub const PROBE_REQUEST_ID: u64 = 2;

pub const SUBSCRIBE_METHOD: &str = "eth_subscribe";
pub const PROBE_METHOD: &str = "net_listening";
pub const NOTIFICATION_METHOD: &str = "eth_subscription";

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl RpcId {
    /// Returns the numeric id, if this is a number.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RpcId,
    pub method: String,
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: RpcId::Number(id),
            method: method.into(),
            params,
        }
    }

    /// `eth_subscribe("logs", { topics: [topic], address })` for a single event
    /// of a single contract.
    pub fn subscribe_logs(topic_hash: &str, contract_address: &str) -> Self {
        Self::new(
            SUBSCRIBE_REQUEST_ID,
            SUBSCRIBE_METHOD,
            vec![
                Value::String("logs".into()),
                serde_json::json!({
                    "topics": [topic_hash],
                    "address": contract_address,
                }),
            ],
        )
    }

    /// The `net_listening` liveness probe.
    pub fn liveness_probe() -> Self {
        Self::new(PROBE_REQUEST_ID, PROBE_METHOD, vec![])
    }

    /// Serialize to the text payload of a WebSocket frame.
    pub fn to_frame_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}
