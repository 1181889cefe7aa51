//! chainlisten-core — wire types and collaborator traits for ChainListen.
//!
//! # Overview
//!
//! ChainListen keeps an `eth_subscribe("logs")` subscription for a single
//! contract event alive over a WebSocket connection. This crate holds the
//! pieces that have no I/O:
//!
//! - [`request`] — JSON-RPC request builders (subscribe, liveness probe)
//! - [`message`] — classification of inbound frames into [`InboundMessage`]
//! - [`decoder`] — the [`LogDecoder`] collaborator and event types
//! - [`config`] — [`ListenerConfig`] and [`ListenerTimings`]
//! - [`error`] — [`ListenerError`]

pub mod config;
pub mod decoder;
pub mod error;
pub mod message;
pub mod request;
pub mod types;

pub use config::{EventCallback, ListenerConfig, ListenerTimings, LogSink};
pub use decoder::{DecodedEvent, LogDecoder, RawLog, TopicHash};
pub use error::ListenerError;
pub use message::{InboundMessage, SubscriptionId};
pub use request::{JsonRpcRequest, RpcId};
pub use types::NormalizedValue;
