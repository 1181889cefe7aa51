//! `AbiLogDecoder` — the `LogDecoder` implementation for EVM contracts.

use alloy_dyn_abi::EventExt;
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::B256;
use chainlisten_core::{
    decoder::{DecodedEvent, LogDecoder, RawLog, TopicHash},
    error::ListenerError,
    types::NormalizedValue,
};
use indexmap::IndexMap;

use crate::{fingerprint, normalizer};

/// EVM log decoder for a single contract ABI.
///
/// Accepts a standard Ethereum ABI JSON and decodes `eth_subscription` log
/// payloads for any non-overloaded event it declares.
#[derive(Debug, Clone)]
pub struct AbiLogDecoder {
    abi: JsonAbi,
}

impl AbiLogDecoder {
    pub fn new(abi: JsonAbi) -> Self {
        Self { abi }
    }

    /// Create a decoder from a standard Ethereum ABI JSON string.
    ///
    /// # Errors
    /// Returns `ListenerError::InvalidAbi` if the JSON is not valid ABI JSON.
    pub fn from_abi_json(abi_json: &str) -> Result<Self, ListenerError> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| ListenerError::InvalidAbi(format!("invalid ABI JSON: {e}")))?;
        Ok(Self { abi })
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// The single event named `name`.
    pub fn event(&self, name: &str) -> Result<&Event, ListenerError> {
        match self.abi.event(name).map(Vec::as_slice) {
            None | Some([]) => Err(ListenerError::EventNotFound { name: name.to_string() }),
            Some([event]) => Ok(event),
            Some(overloads) => Err(ListenerError::AmbiguousEvent {
                name: name.to_string(),
                count: overloads.len(),
            }),
        }
    }

    fn decode_event(&self, event: &Event, log: &RawLog) -> Option<DecodedEvent> {
        if log.removed {
            tracing::debug!(event = %event.name, "skipping removed log");
            return None;
        }

        if !event.anonymous {
            let topic = fingerprint::keccak256_signature(&event.signature());
            if !log.signature_topic().is_some_and(|t| topic.matches(t)) {
                return None;
            }
        }

        let topics: Vec<B256> = log
            .topics
            .iter()
            .map(|t| t.parse::<B256>())
            .collect::<Result<_, _>>()
            .ok()?;
        let data = log.data_bytes()?;

        let decoded = match event.decode_log_parts(topics, &data, true) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(event = %event.name, error = %e, "log does not decode as event");
                return None;
            }
        };

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut args: IndexMap<String, NormalizedValue> = IndexMap::with_capacity(event.inputs.len());
        for (i, param) in event.inputs.iter().enumerate() {
            let value = if param.indexed { indexed.next() } else { body.next() };
            let name = if param.name.is_empty() { i.to_string() } else { param.name.clone() };
            args.insert(name, value.map(normalizer::normalize).unwrap_or(NormalizedValue::Null));
        }

        Some(DecodedEvent {
            name: event.name.clone(),
            signature: event.signature(),
            address: log.address.clone(),
            block_number: log.block_number_u64(),
            tx_hash: log.transaction_hash.clone(),
            log_index: log.log_index_u64(),
            args,
        })
    }
}

impl LogDecoder for AbiLogDecoder {
    fn topic_hash(&self, event_name: &str) -> Result<TopicHash, ListenerError> {
        let event = self.event(event_name)?;
        Ok(fingerprint::keccak256_signature(&event.signature()))
    }

    fn decode(&self, log: &RawLog, event_name: &str) -> Option<DecodedEvent> {
        let event = self.event(event_name).ok()?;
        self.decode_event(event, log)
    }
}
