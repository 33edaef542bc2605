//! What a sink does with its own delivery failures
//!
//! Failures inside a sink never reach the code that logged. They are handed to
//! the sink's `ErrorHandler` instead, which decides whether to print, count,
//! or redirect them.

use super::diagnostics;
use super::error::LoggerError;
use super::log_event::LogEvent;
use super::sink::SinkRef;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub trait ErrorHandler: Send + Sync {
    /// Called for every failed or refused delivery of `sink_name`.
    fn handle(&self, sink_name: &str, error: &LoggerError, event: Option<&LogEvent>);

    /// How many failures this handler made visible, if it keeps track
    fn reported_count(&self) -> Option<u64> {
        None
    }
}

/// Prints the first failure of a sink and swallows the rest
#[derive(Debug, Default)]
pub struct OnlyOnceErrorHandler {
    fired: AtomicBool,
    handled: AtomicU64,
    reported: AtomicU64,
}

impl OnlyOnceErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Failures passed to this handler, printed or not
    pub fn handled_count(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }
}

impl ErrorHandler for OnlyOnceErrorHandler {
    fn handle(&self, sink_name: &str, error: &LoggerError, _event: Option<&LogEvent>) {
        self.handled.fetch_add(1, Ordering::Relaxed);
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.reported.fetch_add(1, Ordering::Relaxed);
            diagnostics::error(format_args!("Sink [{}]: {}", sink_name, error));
        }
    }

    fn reported_count(&self) -> Option<u64> {
        Some(self.reported.load(Ordering::Relaxed))
    }
}

/// Re-routes the failed event to a backup sink
///
/// The first failure is announced; every event that failed is delivered to
/// `backup` when one was passed along with the error.
pub struct FallbackErrorHandler {
    backup: SinkRef,
    announced: AtomicBool,
    redirected: AtomicU64,
}

impl FallbackErrorHandler {
    pub fn new(backup: SinkRef) -> Self {
        Self {
            backup,
            announced: AtomicBool::new(false),
            redirected: AtomicU64::new(0),
        }
    }

    pub fn backup(&self) -> &SinkRef {
        &self.backup
    }

    pub fn redirected_count(&self) -> u64 {
        self.redirected.load(Ordering::Relaxed)
    }
}

impl ErrorHandler for FallbackErrorHandler {
    fn handle(&self, sink_name: &str, error: &LoggerError, event: Option<&LogEvent>) {
        if !self.announced.swap(true, Ordering::AcqRel) {
            diagnostics::warn(format_args!(
                "Sink [{}] failed ({}), falling back to [{}]",
                sink_name,
                error,
                self.backup.name()
            ));
        }
        if let Some(event) = event {
            self.redirected.fetch_add(1, Ordering::Relaxed);
            self.backup.deliver(event);
        }
    }
}

/// Counts every failure without printing anything
#[derive(Debug, Default)]
pub struct CountingErrorHandler {
    count: AtomicU64,
}

impl CountingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl ErrorHandler for CountingErrorHandler {
    fn handle(&self, _sink_name: &str, _error: &LoggerError, _event: Option<&LogEvent>) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use crate::core::log_level::LogLevel;
    use crate::core::sink::SinkBuilder;

    #[test]
    fn test_only_once_fires_once() {
        let handler = OnlyOnceErrorHandler::new();
        let err = LoggerError::writer("boom");
        assert!(!handler.has_fired());
        handler.handle("s", &err, None);
        handler.handle("s", &err, None);
        assert!(handler.has_fired());
        assert_eq!(handler.handled_count(), 2);
        assert_eq!(handler.reported_count(), Some(1));
    }

    #[test]
    fn test_default_handler_reports_first_failure_only() {
        struct Broken;

        impl crate::core::Appender for Broken {
            fn append(&mut self, _event: &LogEvent) -> crate::core::Result<()> {
                Err(LoggerError::writer("always fails"))
            }
        }

        let sink = SinkBuilder::new("broken", Broken).build().unwrap();
        for i in 0..25 {
            assert!(!sink.deliver(&LogEvent::new("app", LogLevel::Error, format!("{}", i))));
        }
        assert_eq!(sink.error_handler().reported_count(), Some(1));
        assert_eq!(CountingErrorHandler::new().reported_count(), None);
    }

    #[test]
    fn test_fallback_redirects_events() {
        let memory = MemoryAppender::new();
        let events = memory.events_handle();
        let backup = SinkBuilder::new("backup", memory).build().unwrap();

        let handler = FallbackErrorHandler::new(backup);
        let event = LogEvent::new("app", LogLevel::Error, "primary down");
        handler.handle("primary", &LoggerError::writer("disk full"), Some(&event));
        handler.handle("primary", &LoggerError::writer("disk full"), None);

        assert_eq!(handler.redirected_count(), 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events.messages(), vec!["primary down".to_string()]);
    }
}
