//! Subscription session: one WebSocket connection, end to end.
//!
//! A session connects, sends `eth_subscribe`, starts the liveness monitor and
//! then routes every inbound frame until the socket closes for any reason.
//! All per-connection state lives in [`SessionState`] and is dropped with the
//! session, so the next connection always starts from scratch.

use std::time::Duration;

use chainlisten_core::{
    config::ListenerTimings,
    decoder::{DecodedEvent, LogDecoder, RawLog},
    error::ListenerError,
    message::{decode_binary, decode_text, InboundMessage, SubscriptionId},
    request::JsonRpcRequest,
    ListenerConfig,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::liveness::{LivenessEvent, LivenessMonitor};
use crate::reporter::Reporter;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for the close handshake when the caller stops the listener.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// `eth_subscribe` acknowledged; this is now the active subscription.
    Subscribed(SubscriptionId),
    /// The liveness probe was answered.
    ProbeAcknowledged,
    /// A notification on the active subscription decoded into an event.
    Event(DecodedEvent),
    /// A notification on the active subscription that is not the configured event.
    NoMatch,
    /// A notification for a subscription that is not (or no longer) active.
    Stale(SubscriptionId),
    /// Anything else.
    Ignored,
}

/// Per-connection state: the active subscription and the liveness timers.
#[derive(Debug)]
pub struct SessionState {
    subscription: Option<SubscriptionId>,
    liveness: LivenessMonitor,
}

impl SessionState {
    pub fn new(timings: &ListenerTimings) -> Self {
        Self {
            subscription: None,
            liveness: LivenessMonitor::new(timings.keep_alive_interval(), timings.probe_timeout()),
        }
    }

    pub fn subscription(&self) -> Option<&SubscriptionId> {
        self.subscription.as_ref()
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn liveness_mut(&mut self) -> &mut LivenessMonitor {
        &mut self.liveness
    }

    /// The socket is open and the subscribe request has been sent.
    pub fn opened(&mut self) {
        self.liveness.start();
    }

    /// The socket closed: forget the subscription and cancel every timer.
    pub fn closed(&mut self) {
        self.subscription = None;
        self.liveness.stop();
    }

    /// Route one inbound message. Probe replies disarm the probe timeout here.
    pub fn route(&mut self, msg: InboundMessage, decoder: &dyn LogDecoder, event_name: &str) -> Routed {
        match msg {
            InboundMessage::SubscribeAck { subscription } => self.subscribed(subscription),
            InboundMessage::ProbeAck => {
                self.liveness.acknowledge();
                Routed::ProbeAcknowledged
            }
            InboundMessage::Notification { subscription, result } => {
                self.notified(subscription, result, decoder, event_name)
            }
            InboundMessage::Unrecognized => Routed::Ignored,
        }
    }

    fn subscribed(&mut self, subscription: SubscriptionId) -> Routed {
        self.subscription = Some(subscription.clone());
        Routed::Subscribed(subscription)
    }

    fn notified(
        &self,
        subscription: SubscriptionId,
        result: Value,
        decoder: &dyn LogDecoder,
        event_name: &str,
    ) -> Routed {
        if self.subscription.as_ref() != Some(&subscription) {
            return Routed::Stale(subscription);
        }
        let log: RawLog = match serde_json::from_value(result) {
            Ok(log) => log,
            Err(e) => {
                tracing::debug!(error = %e, "notification result is not a log object");
                return Routed::Ignored;
            }
        };
        match decoder.decode(&log, event_name) {
            Some(event) => Routed::Event(event),
            None => Routed::NoMatch,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Socket closed (error, server close, or liveness timeout); reconnect.
    Closed,
    /// The listener was stopped; do not reconnect.
    Stopped,
}

/// Immutable inputs shared by every session of one listener.
pub(crate) struct SessionContext {
    pub(crate) config: ListenerConfig,
    pub(crate) reporter: Reporter,
    /// Parsed `rpc_url` with the scheme normalized to lower case.
    endpoint: String,
    subscribe_frame: String,
    probe_frame: String,
}

impl SessionContext {
    /// Resolve the event topic and pre-build both outbound requests.
    pub(crate) fn new(config: ListenerConfig) -> Result<Self, ListenerError> {
        config.validate()?;
        let endpoint = config.endpoint()?.to_string();
        let topic = config.decoder.topic_hash(&config.event_name)?;
        let subscribe_frame =
            JsonRpcRequest::subscribe_logs(topic.as_hex(), &config.contract_address).to_frame_text()?;
        let probe_frame = JsonRpcRequest::liveness_probe().to_frame_text()?;
        let reporter = Reporter::new(config.log.clone(), config.rpc_url.clone(), config.event_name.clone());
        Ok(Self {
            config,
            reporter,
            endpoint,
            subscribe_frame,
            probe_frame,
        })
    }
}

/// Completes once stop has been requested (or the handle is gone).
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Run one session to completion.
pub(crate) async fn run(ctx: &SessionContext, stop: &mut watch::Receiver<bool>) -> SessionEnd {
    let connected = tokio::select! {
        biased;
        _ = stopped(stop) => return SessionEnd::Stopped,
        res = connect(&ctx.endpoint) => res,
    };

    let mut ws = match connected {
        Ok(ws) => ws,
        Err(e) => {
            ctx.reporter.warn(&e.to_string());
            ctx.reporter.info("WebSocket closed");
            return SessionEnd::Closed;
        }
    };

    let mut state = SessionState::new(&ctx.config.timings);
    let end = drive(ctx, &mut ws, &mut state, stop).await;
    state.closed();
    drop(ws);
    ctx.reporter.info("WebSocket closed");
    end
}

async fn drive(
    ctx: &SessionContext,
    ws: &mut WsStream,
    state: &mut SessionState,
    stop: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let reporter = &ctx.reporter;
    let mut open = send_frame(ws, &ctx.subscribe_frame, reporter).await;
    reporter.info("WebSocket connection opened");
    state.opened();

    loop {
        tokio::select! {
            biased;
            _ = stopped(stop) => {
                let _ = time::timeout(CLOSE_GRACE, ws.close(None)).await;
                return SessionEnd::Stopped;
            }
            event = state.liveness.next_event() => match event {
                LivenessEvent::ProbeDue => open = probe_due(ctx, ws, state, open).await,
                LivenessEvent::ProbeTimedOut => {
                    reporter.warn("Ping timeout, terminating websocket connection");
                    return SessionEnd::Closed;
                }
            },
            frame = ws.next() => match frame {
                None => return SessionEnd::Closed,
                Some(Err(e)) => {
                    reporter.warn(&format!("WebSocket connection error: {e}"));
                    return SessionEnd::Closed;
                }
                Some(Ok(Message::Text(text))) => dispatch(ctx, state, decode_text(&text)),
                Some(Ok(Message::Binary(bytes))) => dispatch(ctx, state, decode_binary(&bytes)),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "close frame received");
                    return SessionEnd::Closed;
                }
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Keep-alive tick. Sends a probe unless the socket is gone (which also ends
/// the keep-alive interval) or a probe is still in flight. Returns whether
/// the socket is still writable.
async fn probe_due(ctx: &SessionContext, ws: &mut WsStream, state: &mut SessionState, open: bool) -> bool {
    let reporter = &ctx.reporter;
    if !open {
        reporter.info("No connected websocket, exiting keep alive interval");
        state.liveness.halt_keep_alive();
        return false;
    }
    if state.liveness.probe_pending() {
        tracing::debug!("previous probe unanswered, not sending another");
        return true;
    }
    reporter.info(&format!(
        "Performing health check on the Web Socket RPC, to maintain subscription to '{}'.",
        ctx.config.event_name
    ));
    let sent = send_frame(ws, &ctx.probe_frame, reporter).await;
    state.liveness.probe_sent();
    sent
}

fn dispatch(ctx: &SessionContext, state: &mut SessionState, msg: Option<InboundMessage>) {
    let Some(msg) = msg else { return };
    let event_name = ctx.config.event_name.as_str();
    match state.route(msg, ctx.config.decoder.as_ref(), event_name) {
        Routed::Subscribed(id) => ctx.reporter.info(&format!(
            "Subscription to event '{event_name}' established with subscription ID '{id}'."
        )),
        Routed::ProbeAcknowledged => ctx.reporter.info(&format!(
            "Health check complete, subscription to '{event_name}' is still active."
        )),
        Routed::Event(event) => {
            ctx.reporter.info(&format!("Received event {event}"));
            if let Some(callback) = &ctx.config.callback {
                callback(event);
            }
        }
        Routed::Stale(id) => {
            tracing::debug!(subscription = %id, "dropping notification for inactive subscription");
        }
        Routed::NoMatch | Routed::Ignored => {}
    }
}

async fn connect(url: &str) -> Result<WsStream, ListenerError> {
    let (ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| ListenerError::WebSocket(e.to_string()))?;
    Ok(ws)
}

async fn send_frame(ws: &mut WsStream, frame: &str, reporter: &Reporter) -> bool {
    match ws.send(Message::Text(frame.to_string())).await {
        Ok(()) => true,
        Err(e) => {
            reporter.warn(&format!("WebSocket is not open. Unable to send message: {e}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlisten_core::{decoder::TopicHash, types::NormalizedValue};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    /// Decodes any log whose topics[0] is `TOPIC`, counting calls.
    #[derive(Default)]
    struct CountingDecoder {
        calls: AtomicUsize,
    }

    impl LogDecoder for CountingDecoder {
        fn topic_hash(&self, _event_name: &str) -> Result<TopicHash, ListenerError> {
            Ok(TopicHash::new(TOPIC))
        }

        fn decode(&self, log: &RawLog, event_name: &str) -> Option<DecodedEvent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if log.signature_topic() != Some(TOPIC) {
                return None;
            }
            Some(DecodedEvent {
                name: event_name.to_string(),
                signature: "Transfer(address,address,uint256)".into(),
                address: log.address.clone(),
                block_number: log.block_number_u64(),
                tx_hash: log.transaction_hash.clone(),
                log_index: log.log_index_u64(),
                args: [("value".to_string(), NormalizedValue::Uint(1))].into_iter().collect(),
            })
        }
    }

    fn state() -> SessionState {
        SessionState::new(&ListenerTimings {
            keep_alive_interval_ms: 1_000,
            probe_timeout_ms: 500,
            reconnect_delay_ms: 100,
        })
    }

    fn notification(sub: &str, topic: &str) -> InboundMessage {
        decode_text(
            &json!({
                "jsonrpc": "2.0",
                "method": "eth_subscription",
                "params": {
                    "subscription": sub,
                    "result": {
                        "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                        "topics": [topic],
                        "data": "0x",
                        "blockNumber": "0x10",
                    }
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn ack(sub: &str) -> InboundMessage {
        decode_text(&json!({"jsonrpc": "2.0", "id": 1, "result": sub}).to_string()).unwrap()
    }

    #[test]
    fn subscribe_ack_sets_active_subscription() {
        let dec = CountingDecoder::default();
        let mut st = state();
        assert_eq!(st.route(ack("0xabc"), &dec, "Transfer"), Routed::Subscribed("0xabc".into()));
        assert_eq!(st.subscription(), Some(&SubscriptionId::from("0xabc")));
    }

    #[test]
    fn notification_on_active_subscription_is_decoded() {
        let dec = CountingDecoder::default();
        let mut st = state();
        st.route(ack("0xabc"), &dec, "Transfer");
        match st.route(notification("0xabc", TOPIC), &dec, "Transfer") {
            Routed::Event(ev) => {
                assert_eq!(ev.name, "Transfer");
                assert_eq!(ev.block_number, Some(16));
            }
            other => panic!("expected event, got {other:?}"),
        }
        assert_eq!(dec.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn decoder_mismatch_is_no_match() {
        let dec = CountingDecoder::default();
        let mut st = state();
        st.route(ack("0xabc"), &dec, "Transfer");
        assert_eq!(st.route(notification("0xabc", "0x01"), &dec, "Transfer"), Routed::NoMatch);
    }

    #[test]
    fn stale_subscription_is_never_decoded() {
        let dec = CountingDecoder::default();
        let mut st = state();

        // before any ack
        assert_eq!(
            st.route(notification("0xabc", TOPIC), &dec, "Transfer"),
            Routed::Stale("0xabc".into())
        );

        st.route(ack("0xnew"), &dec, "Transfer");
        assert_eq!(
            st.route(notification("0xold", TOPIC), &dec, "Transfer"),
            Routed::Stale("0xold".into())
        );

        // after close the previous id is no longer active either
        st.closed();
        assert!(st.subscription().is_none());
        assert_eq!(
            st.route(notification("0xnew", TOPIC), &dec, "Transfer"),
            Routed::Stale("0xnew".into())
        );
        assert_eq!(dec.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unrecognized_frames_change_nothing() {
        let dec = CountingDecoder::default();
        let mut st = state();
        st.route(ack("0xabc"), &dec, "Transfer");

        for frame in [r#"{"id":3,"result":"0xother"}"#, r#"{"method":"eth_foo"}"#, r#"{}"#] {
            let msg = decode_text(frame).unwrap();
            assert_eq!(st.route(msg, &dec, "Transfer"), Routed::Ignored);
        }
        // notification whose result is not a log object
        let bad = decode_text(r#"{"method":"eth_subscription","params":{"subscription":"0xabc","result":"0x1"}}"#)
            .unwrap();
        assert_eq!(st.route(bad, &dec, "Transfer"), Routed::Ignored);

        assert_eq!(st.subscription(), Some(&SubscriptionId::from("0xabc")));
        assert_eq!(dec.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_ack_disarms_probe_timeout() {
        let dec = CountingDecoder::default();
        let mut st = state();
        st.opened();
        assert_eq!(st.liveness_mut().next_event().await, LivenessEvent::ProbeDue);
        st.liveness_mut().probe_sent();

        let probe_ack = decode_text(r#"{"jsonrpc":"2.0","id":2,"result":true}"#).unwrap();
        assert_eq!(st.route(probe_ack, &dec, "Transfer"), Routed::ProbeAcknowledged);
        assert!(!st.liveness().probe_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn other_traffic_does_not_disarm_probe_timeout() {
        let dec = CountingDecoder::default();
        let mut st = state();
        st.opened();
        st.route(ack("0xabc"), &dec, "Transfer");
        assert_eq!(st.liveness_mut().next_event().await, LivenessEvent::ProbeDue);
        st.liveness_mut().probe_sent();

        st.route(notification("0xabc", TOPIC), &dec, "Transfer");
        st.route(ack("0xabc"), &dec, "Transfer");
        assert!(st.liveness().probe_pending());
        assert_eq!(st.liveness_mut().next_event().await, LivenessEvent::ProbeTimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_session_timers() {
        let mut st = state();
        st.opened();
        st.liveness_mut().probe_sent();
        st.closed();
        assert!(!st.liveness().is_running());
        assert!(timeout(Duration::from_secs(3600), st.liveness_mut().next_event()).await.is_err());
    }

    #[test]
    fn context_rejects_bad_config() {
        let cfg = ListenerConfig::new(
            "http://not-a-websocket",
            "0x1",
            "Transfer",
            std::sync::Arc::new(CountingDecoder::default()),
        );
        assert!(matches!(SessionContext::new(cfg), Err(ListenerError::InvalidConfig(_))));
    }

    #[test]
    fn context_builds_subscribe_frame_from_topic() {
        let cfg = ListenerConfig::new(
            "ws://127.0.0.1:1",
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "Transfer",
            std::sync::Arc::new(CountingDecoder::default()),
        );
        let ctx = SessionContext::new(cfg).unwrap();
        let v: Value = serde_json::from_str(&ctx.subscribe_frame).unwrap();
        assert_eq!(v["id"], 1);
        assert_eq!(v["params"][1]["topics"][0], TOPIC);
        let p: Value = serde_json::from_str(&ctx.probe_frame).unwrap();
        assert_eq!(p["method"], "net_listening");
    }

    type Lines = Arc<Mutex<Vec<String>>>;

    fn context(lines: &Lines) -> SessionContext {
        let captured = Arc::clone(lines);
        let cfg = ListenerConfig::new(
            "ws://127.0.0.1:1",
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "Transfer",
            Arc::new(CountingDecoder::default()),
        )
        .with_log(move |l| captured.lock().unwrap().push(l.to_string()));
        SessionContext::new(cfg).unwrap()
    }

    /// Client socket to a one-connection node that forwards every text frame
    /// it receives. With `closed`, the node closes right away and the client
    /// has already read the close frame.
    async fn node_socket(closed: bool) -> (WsStream, mpsc::UnboundedReceiver<String>) {
        let server = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (stream, _) = server.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            if closed {
                let _ = ws.close(None).await;
            }
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let _ = tx.send(text);
                }
            }
        });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();
        if closed {
            assert!(matches!(ws.next().await, Some(Ok(Message::Close(_)))));
        }
        (ws, rx)
    }

    #[tokio::test]
    async fn send_on_closed_socket_warns_and_fails() {
        let lines = Lines::default();
        let ctx = context(&lines);
        let (mut ws, _frames) = node_socket(true).await;

        assert!(!send_frame(&mut ws, &ctx.probe_frame, &ctx.reporter).await);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("] WebSocket is not open. Unable to send message: "));
        // the transport error is reported once, without an extra prefix
        assert!(!lines[0].contains("WebSocket error:"));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_without_socket_halts_keep_alive() {
        let lines = Lines::default();
        let ctx = context(&lines);
        let (mut ws, mut frames) = node_socket(true).await;
        let mut st = state();
        st.opened();
        assert_eq!(st.liveness_mut().next_event().await, LivenessEvent::ProbeDue);

        assert!(!probe_due(&ctx, &mut ws, &mut st, false).await);

        assert!(!st.liveness().is_running());
        assert!(!st.liveness().probe_pending());
        assert!(timeout(Duration::from_secs(3600), st.liveness_mut().next_event()).await.is_err());
        assert!(frames.try_recv().is_err());

        let lines = lines.lock().unwrap();
        assert!(lines
            .iter()
            .any(|l| l.ends_with("No connected websocket, exiting keep alive interval")));
        assert!(!lines.iter().any(|l| l.contains("Performing health check")));
        assert!(!lines.iter().any(|l| l.contains("Unable to send message")));
    }

    #[tokio::test]
    async fn tick_on_open_socket_sends_single_probe() {
        let lines = Lines::default();
        let ctx = context(&lines);
        let (mut ws, mut frames) = node_socket(false).await;
        let mut st = state();
        st.opened();

        assert!(probe_due(&ctx, &mut ws, &mut st, true).await);
        assert!(st.liveness().probe_pending());
        let sent = timeout(Duration::from_secs(5), frames.recv()).await.unwrap().unwrap();
        assert_eq!(sent, ctx.probe_frame);

        // the first probe is still unanswered: nothing more goes out
        assert!(probe_due(&ctx, &mut ws, &mut st, true).await);
        assert!(timeout(Duration::from_millis(200), frames.recv()).await.is_err());
        assert!(lines.lock().unwrap().iter().any(|l| l.contains("Performing health check")));
    }
}
