//! Named, closeable delivery endpoint wrapping an [`Appender`]
//!
//! A `Sink` owns the delivery contract shared by every destination:
//!
//! 1. a closed or inactive sink refuses the event and reports it,
//! 2. events below the threshold are dropped silently,
//! 3. the filter chain may deny the event,
//! 4. the appender writes it; any error or panic goes to the error handler.
//!
//! All four steps run under the sink's own lock, so concurrent callers see a
//! consistent state and output is never interleaved. A sink re-entered on the
//! same thread while it is delivering (an appender that logs) drops the
//! nested event instead of deadlocking.

use super::appender::{Appender, ThreadGate};
use super::diagnostics;
use super::error::{LoggerError, Result};
use super::error_handler::{ErrorHandler, OnlyOnceErrorHandler};
use super::fan_out::FanOut;
use super::filter::{Filter, FilterChain, FilterDecision};
use super::log_event::LogEvent;
use super::log_level::LogLevel;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

pub type SinkRef = Arc<Sink>;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static DELIVERING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks a sink as delivering on the current thread until dropped
struct ReentryGuard {
    id: u64,
}

impl ReentryGuard {
    fn enter(id: u64) -> Option<Self> {
        DELIVERING.with(|ids| {
            let mut ids = ids.borrow_mut();
            if ids.contains(&id) {
                None
            } else {
                ids.push(id);
                Some(Self { id })
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        DELIVERING.with(|ids| {
            let mut ids = ids.borrow_mut();
            if let Some(pos) = ids.iter().rposition(|&id| id == self.id) {
                ids.remove(pos);
            }
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Inactive = 0,
    Active = 1,
    Closed = 2,
}

impl SinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SinkState::Inactive,
            1 => SinkState::Active,
            _ => SinkState::Closed,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

pub struct Sink {
    id: u64,
    name: String,
    state: AtomicU8,
    threshold: RwLock<Option<LogLevel>>,
    filters: RwLock<FilterChain>,
    error_handler: RwLock<Arc<dyn ErrorHandler>>,
    nested: Option<Arc<FanOut>>,
    gate: Option<Arc<dyn ThreadGate>>,
    appender: Mutex<Box<dyn Appender>>,
}

impl Sink {
    pub fn builder<A: Appender + 'static>(name: impl Into<String>, appender: A) -> SinkBuilder {
        SinkBuilder::new(name, appender)
    }

    /// Process-unique identity of this sink
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.state() == SinkState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SinkState::Closed
    }

    pub fn threshold(&self) -> Option<LogLevel> {
        *self.threshold.read()
    }

    pub fn set_threshold(&self, threshold: Option<LogLevel>) {
        *self.threshold.write() = threshold;
    }

    /// True when `level` passes the threshold gate.
    pub fn is_as_severe_as_threshold(&self, level: LogLevel) -> bool {
        match self.threshold() {
            Some(threshold) => level.is_at_least(threshold),
            None => level != LogLevel::Off,
        }
    }

    pub fn add_filter(&self, filter: Arc<dyn Filter>) {
        self.filters.write().push(filter);
    }

    pub fn clear_filters(&self) {
        self.filters.write().clear();
    }

    pub fn filter_count(&self) -> usize {
        self.filters.read().len()
    }

    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        Arc::clone(&self.error_handler.read())
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self.error_handler.write() = handler;
    }

    /// Whether the appender forwards to sinks of its own.
    pub fn is_container(&self) -> bool {
        self.nested.is_some()
    }

    pub fn nested_sinks(&self) -> Option<Arc<FanOut>> {
        self.nested.clone()
    }

    fn report(&self, error: &LoggerError, event: Option<&LogEvent>) {
        self.error_handler().handle(&self.name, error, event);
    }

    /// Open the appender's resources.
    ///
    /// A failure is reported through the error handler and returned; the
    /// sink then stays inactive and refuses deliveries.
    pub fn activate(&self) -> Result<()> {
        let mut appender = self.appender.lock();
        match self.state() {
            SinkState::Active => return Ok(()),
            SinkState::Closed => return Err(LoggerError::sink_closed(&self.name)),
            SinkState::Inactive => {}
        }
        match appender.activate() {
            Ok(()) => {
                self.set_state(SinkState::Active);
                Ok(())
            }
            Err(e) => {
                self.report(&e, None);
                Err(e)
            }
        }
    }

    /// Run the delivery contract for `event`.
    ///
    /// Returns `true` when the appender accepted the event. Never panics and
    /// never returns an error to the caller.
    pub fn deliver(&self, event: &LogEvent) -> bool {
        let Some(_guard) = ReentryGuard::enter(self.id) else {
            diagnostics::debug(format_args!(
                "Sink [{}] re-entered while delivering, nested event dropped",
                self.name
            ));
            return false;
        };

        if self.gate.as_ref().is_some_and(|g| g.refuses_current_thread()) {
            self.report(&LoggerError::thread_refused(&self.name), Some(event));
            return false;
        }

        let mut appender = self.appender.lock();

        match self.state() {
            SinkState::Closed => {
                self.report(&LoggerError::sink_closed(&self.name), Some(event));
                return false;
            }
            SinkState::Inactive => {
                self.report(&LoggerError::sink_inactive(&self.name), Some(event));
                return false;
            }
            SinkState::Active => {}
        }

        if !self.is_as_severe_as_threshold(event.level) {
            return false;
        }

        if self.filters.read().decide(event) == FilterDecision::Deny {
            return false;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| appender.append(event)));
        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.report(&e, Some(event));
                false
            }
            Err(payload) => {
                let error = LoggerError::appender_panicked(&self.name, panic_message(&*payload));
                self.report(&error, Some(event));
                false
            }
        }
    }

    pub fn flush(&self) {
        let mut appender = self.appender.lock();
        if self.state() != SinkState::Active {
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| appender.flush())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report(&e, None),
            Err(payload) => {
                let error = LoggerError::appender_panicked(&self.name, panic_message(&*payload));
                self.report(&error, None);
            }
        }
    }

    /// Release the appender. Closing twice is a no-op.
    pub fn close(&self) {
        let mut appender = self.appender.lock();
        let previous = self.state();
        if previous == SinkState::Closed {
            return;
        }
        self.set_state(SinkState::Closed);
        if previous == SinkState::Inactive {
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| appender.close())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report(&e, None),
            Err(payload) => {
                let error = LoggerError::appender_panicked(&self.name, panic_message(&*payload));
                self.report(&error, None);
            }
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("threshold", &self.threshold())
            .field("container", &self.is_container())
            .finish()
    }
}

/// Builder for a [`Sink`]
///
/// ```
/// use rust_logger_hierarchy::appenders::MemoryAppender;
/// use rust_logger_hierarchy::core::{LevelMatchFilter, LogLevel, Sink};
/// use std::sync::Arc;
///
/// let sink = Sink::builder("audit", MemoryAppender::new())
///     .threshold(LogLevel::Info)
///     .filter(Arc::new(LevelMatchFilter::new(LogLevel::Warn, false)))
///     .build()
///     .unwrap();
/// assert!(sink.is_active());
/// ```
pub struct SinkBuilder {
    name: String,
    appender: Box<dyn Appender>,
    threshold: Option<LogLevel>,
    filters: FilterChain,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl SinkBuilder {
    pub fn new<A: Appender + 'static>(name: impl Into<String>, appender: A) -> Self {
        Self {
            name: name.into(),
            appender: Box::new(appender),
            threshold: None,
            filters: FilterChain::new(),
            error_handler: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn threshold(mut self, level: LogLevel) -> Self {
        self.threshold = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Build without activating; deliveries are refused until
    /// [`Sink::activate`] succeeds.
    pub fn build_inactive(self) -> SinkRef {
        let nested = self.appender.nested_sinks();
        let gate = self.appender.thread_gate();
        Arc::new(Sink {
            id: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            state: AtomicU8::new(SinkState::Inactive as u8),
            threshold: RwLock::new(self.threshold),
            filters: RwLock::new(self.filters),
            error_handler: RwLock::new(
                self.error_handler
                    .unwrap_or_else(|| Arc::new(OnlyOnceErrorHandler::new())),
            ),
            nested,
            gate,
            appender: Mutex::new(self.appender),
        })
    }

    /// Build and activate.
    pub fn build(self) -> Result<SinkRef> {
        let sink = self.build_inactive();
        sink.activate()?;
        Ok(sink)
    }
}
