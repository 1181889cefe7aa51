//! Inbound message codec.
//!
//! Every frame the node sends is classified into one [`InboundMessage`]
//! variant by looking at its `id` and `method`. Frames that are not JSON
//! objects are rejected with `None` and must be ignored by the caller.

use serde::Deserialize;
use serde_json::Value;

use crate::request::{JsonRpcError, RpcId, NOTIFICATION_METHOD, PROBE_REQUEST_ID, SUBSCRIBE_REQUEST_ID};

/// A subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{"id":1,"result":"<subscription-id>"}`
    SubscribeAck { subscription: SubscriptionId },
    /// `{"id":2,"result":true}`
    ProbeAck,
    /// `{"method":"eth_subscription","params":{"subscription":..,"result":<log>}}`
    Notification { subscription: SubscriptionId, result: Value },
    /// Well-formed JSON object of any other shape.
    Unrecognized,
}

/// Loose view of any JSON-RPC message; every field is optional.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<RpcId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Classify a text frame. Returns `None` if it is not a JSON object.
pub fn decode_text(text: &str) -> Option<InboundMessage> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "discarding non-JSON frame");
            return None;
        }
    };
    classify(value)
}

/// Classify a binary frame holding UTF-8 encoded JSON.
pub fn decode_binary(bytes: &[u8]) -> Option<InboundMessage> {
    match std::str::from_utf8(bytes) {
        Ok(text) => decode_text(text),
        Err(e) => {
            tracing::debug!(error = %e, "discarding non-UTF-8 binary frame");
            None
        }
    }
}

fn classify(value: Value) -> Option<InboundMessage> {
    if !value.is_object() {
        tracing::debug!("discarding JSON frame that is not an object");
        return None;
    }
    let envelope: Envelope = match serde_json::from_value(value) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "discarding frame with unexpected field types");
            return None;
        }
    };

    match envelope.id.as_ref().and_then(RpcId::as_number) {
        Some(SUBSCRIBE_REQUEST_ID) => {
            if let Some(Value::String(id)) = envelope.result {
                return Some(InboundMessage::SubscribeAck { subscription: SubscriptionId(id) });
            }
            if let Some(err) = envelope.error {
                tracing::warn!(error = %err, "eth_subscribe rejected by node");
            }
            return Some(InboundMessage::Unrecognized);
        }
        Some(PROBE_REQUEST_ID) => {
            return Some(match envelope.result {
                Some(Value::Bool(true)) => InboundMessage::ProbeAck,
                _ => InboundMessage::Unrecognized,
            });
        }
        _ => {}
    }

    if envelope.method.as_deref() == Some(NOTIFICATION_METHOD) {
        if let Some(Value::Object(mut params)) = envelope.params {
            let subscription = params.get("subscription").and_then(Value::as_str).map(SubscriptionId::from);
            if let (Some(subscription), Some(result)) = (subscription, params.remove("result")) {
                return Some(InboundMessage::Notification { subscription, result });
            }
        }
    }

    Some(InboundMessage::Unrecognized)
}
