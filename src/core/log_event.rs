//! Logging event structure

use super::log_context::{LogContext, Mdc, Ndc};
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Rendered error attached to an event: its message followed by every
/// `source()` in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub lines: Vec<String>,
}

impl ErrorInfo {
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut lines = vec![error.to_string()];
        let mut source = error.source();
        while let Some(cause) = source {
            lines.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        Self { lines }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            lines: vec![message.into()],
        }
    }
}

fn captured_elsewhere() -> bool {
    true
}

/// One logging request, immutable once handed to a sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Process-wide logical timestamp, strictly increasing in creation order
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub logger_name: String,
    pub message: String,
    pub thread_id: String,
    pub thread_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mdc: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LogContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    /// Decoded events carry the sender's context, never the receiver's
    #[serde(skip, default = "captured_elsewhere")]
    context_captured: bool,
}

impl LogEvent {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(logger_name: impl Into<String>, level: LogLevel, message: impl AsRef<str>) -> Self {
        Self {
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            message: Self::sanitize_message(message.as_ref()),
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
            ndc: None,
            mdc: None,
            error: None,
            properties: BTreeMap::new(),
            context: None,
            file: None,
            line: None,
            module_path: None,
            context_captured: false,
        }
    }

    /// Snapshot NDC, MDC and thread identity of the calling thread.
    ///
    /// Only the first call has an effect; later calls (possibly on another
    /// thread) keep the original snapshot.
    pub fn capture_thread_context(&mut self) {
        if self.context_captured {
            return;
        }
        self.context_captured = true;
        self.thread_id = current_thread_id();
        self.thread_name = current_thread_name();
        self.ndc = Ndc::get();
        self.mdc = Mdc::snapshot();
    }

    pub fn is_thread_context_captured(&self) -> bool {
        self.context_captured
    }

    pub fn with_location(mut self, file: &str, line: u32, module_path: &str) -> Self {
        self.file = Some(file.to_string());
        self.line = Some(line);
        self.module_path = Some(module_path.to_string());
        self
    }

    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_error(mut self, error: &(dyn StdError + 'static)) -> Self {
        self.error = Some(ErrorInfo::from_error(error));
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn mdc_value(&self, key: &str) -> Option<&str> {
        self.mdc.as_ref().and_then(|m| m.get(key)).map(String::as_str)
    }

    /// Thread name when known, thread id otherwise
    pub fn thread_label(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;

    impl std::fmt::Display for Inner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "disk unplugged")
        }
    }

    impl StdError for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "write failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_sequence_is_increasing() {
        let a = LogEvent::new("a", LogLevel::Info, "first");
        let b = LogEvent::new("a", LogLevel::Info, "second");
        assert!(b.sequence > a.sequence);
    }

    #[test]
    fn test_message_is_sanitized() {
        let event = LogEvent::new("a", LogLevel::Warn, "line1\nline2\tend");
        assert_eq!(event.message, "line1\\nline2\\tend");
    }

    #[test]
    fn test_error_chain_rendering() {
        let event = LogEvent::new("io", LogLevel::Error, "flush").with_error(&Outer(Inner));
        let info = event.error.unwrap();
        assert_eq!(info.lines, vec!["write failed", "caused by: disk unplugged"]);
    }

    #[test]
    fn test_capture_thread_context_once() {
        Ndc::clear();
        Ndc::push("req-9");
        Mdc::put("tenant", "acme");

        let mut event = LogEvent::new("svc", LogLevel::Info, "hello");
        event.capture_thread_context();
        Ndc::clear();
        Mdc::clear();

        let captured = std::thread::spawn(move || {
            event.capture_thread_context();
            event
        })
        .join()
        .unwrap();

        assert_eq!(captured.ndc.as_deref(), Some("req-9"));
        assert_eq!(captured.mdc_value("tenant"), Some("acme"));
    }

    #[test]
    fn test_serde_roundtrip_keeps_properties() {
        let event = LogEvent::new("net", LogLevel::Debug, "ping").with_property("hostname", "h1");
        let json = serde_json::to_string(&event).unwrap();
        let back: LogEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.property("hostname"), Some("h1"));
        assert_eq!(back.sequence, event.sequence);
        assert_eq!(back.logger_name, "net");
    }

    #[test]
    fn test_decoded_event_keeps_sender_context() {
        let mut event = LogEvent::new("net", LogLevel::Info, "remote");
        {
            let _scope = Ndc::scope("sender-request");
            event.capture_thread_context();
        }
        let json = serde_json::to_string(&event).unwrap();

        let _receiver = Ndc::scope("receiver-request");
        let mut back: LogEvent = serde_json::from_str(&json).unwrap();
        assert!(back.is_thread_context_captured());
        back.capture_thread_context();
        assert_eq!(back.ndc.as_deref(), Some("sender-request"));
        assert_eq!(back.thread_id, event.thread_id);
    }
}
