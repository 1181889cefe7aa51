//! Status reporting: every line goes to `tracing` and, when configured, to
//! the caller's log sink with an RFC 3339 timestamp prefix.

use chainlisten_core::config::LogSink;
use chrono::{SecondsFormat, Utc};

#[derive(Clone)]
pub(crate) struct Reporter {
    sink: Option<LogSink>,
    url: String,
    event: String,
}

impl Reporter {
    pub(crate) fn new(sink: Option<LogSink>, url: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            sink,
            url: url.into(),
            event: event.into(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        tracing::info!(url = %self.url, event = %self.event, "{msg}");
        self.emit(msg);
    }

    pub(crate) fn warn(&self, msg: &str) {
        tracing::warn!(url = %self.url, event = %self.event, "{msg}");
        self.emit(msg);
    }

    fn emit(&self, msg: &str) {
        if let Some(sink) = &self.sink {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            sink(&format!("[{ts}] {msg}"));
        }
    }
}
