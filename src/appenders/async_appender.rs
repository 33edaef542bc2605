//! Bounded-queue decoupling of callers from slow sinks
//!
//! An [`AsyncAppender`] sits inside a sink like any other appender. Appending
//! copies the event (with the caller's thread context already captured) into
//! a [`BlockingQueue`]; a dedicated dispatcher thread drains the queue and
//! delivers each event to the nested sinks attached to it.
//!
//! A full queue blocks the producer until the dispatcher frees a slot. Events
//! are never dropped for lack of room, only by an explicit shrinking
//! [`resize`](AsyncHandle::resize), which discards the oldest queued events.
//!
//! Closing refuses new events, lets the dispatcher drain what is queued,
//! closes the nested sinks and joins the thread.
//!
//! ```
//! use rust_logger_hierarchy::appenders::{AsyncAppender, MemoryAppender};
//! use rust_logger_hierarchy::core::{LogLevel, Repository, SinkBuilder};
//!
//! let memory = MemoryAppender::new();
//! let events = memory.events_handle();
//!
//! let async_appender = AsyncAppender::new()
//!     .with_sink(SinkBuilder::new("memory", memory).build().unwrap());
//! let handle = async_appender.handle();
//!
//! let repo = Repository::new();
//! repo.root_logger()
//!     .add_sink(SinkBuilder::new("async", async_appender).build().unwrap());
//! repo.get_logger("app").info("queued");
//!
//! repo.shutdown();
//! assert_eq!(events.messages(), vec!["queued"]);
//! assert_eq!(handle.metrics().delivered(), 1);
//! ```

use crate::core::bounded_queue::{BlockingQueue, PutOutcome};
use crate::core::diagnostics;
use crate::core::sink::panic_message;
use crate::core::{
    Appender, DispatchMetrics, FanOut, LogEvent, LoggerError, Result, SinkRef, ThreadGate,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Default number of queued events
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

static NEXT_DISPATCHER: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Built but not activated; no thread yet
    Idle = 0,
    Running = 1,
    /// Refusing new events, draining the queue
    Closing = 2,
    Stopped = 3,
}

impl DispatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatchState::Idle,
            1 => DispatchState::Running,
            2 => DispatchState::Closing,
            _ => DispatchState::Stopped,
        }
    }
}

struct Shared {
    queue: BlockingQueue<LogEvent>,
    sinks: Arc<FanOut>,
    metrics: DispatchMetrics,
    state: AtomicU8,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    dispatcher_thread: Mutex<Option<ThreadId>>,
}

/// A nested sink routing an event back into its own async sink would wait
/// on the dispatcher it is running on.
impl ThreadGate for Shared {
    fn refuses_current_thread(&self) -> bool {
        *self.dispatcher_thread.lock() == Some(thread::current().id())
    }
}

impl Shared {
    fn state(&self) -> DispatchState {
        DispatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DispatchState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: DispatchState, to: DispatchState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn dispatch(&self) {
        diagnostics::debug(format_args!(
            "{} started",
            thread::current().name().unwrap_or("async dispatcher")
        ));
        while let Some(event) = self.queue.take() {
            self.sinks.deliver_all(&event);
            self.metrics.record_delivered();
        }
        self.sinks.close_all();
        self.set_state(DispatchState::Stopped);
        diagnostics::debug(format_args!(
            "{} drained and stopped",
            thread::current().name().unwrap_or("async dispatcher")
        ));
    }

    fn shutdown(&self) {
        if self.transition(DispatchState::Idle, DispatchState::Stopped) {
            self.queue.close();
            self.sinks.close_all();
            return;
        }
        if !self.transition(DispatchState::Running, DispatchState::Closing) {
            return;
        }
        self.queue.close();

        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if let Err(payload) = handle.join() {
                diagnostics::error(format_args!(
                    "Async dispatcher panicked: {}",
                    panic_message(&*payload)
                ));
                // Whatever is left cannot be delivered any more
                self.sinks.close_all();
                self.set_state(DispatchState::Stopped);
            }
        }
    }
}

/// Appender that hands events to a background dispatcher thread
pub struct AsyncAppender {
    capacity: usize,
    shared: Arc<Shared>,
}

impl AsyncAppender {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            shared: Arc::new(Shared {
                queue: BlockingQueue::new(DEFAULT_QUEUE_CAPACITY),
                sinks: Arc::new(FanOut::new()),
                metrics: DispatchMetrics::new(),
                state: AtomicU8::new(DispatchState::Idle as u8),
                dispatcher: Mutex::new(None),
                dispatcher_thread: Mutex::new(None),
            }),
        }
    }

    /// Queue size. Zero is rejected when the sink is activated.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_sink(self, sink: SinkRef) -> Self {
        self.shared.sinks.add(sink);
        self
    }

    /// Control handle usable after the appender has moved into a sink
    pub fn handle(&self) -> AsyncHandle {
        AsyncHandle {
            shared: Arc::clone(&self.shared),
        }
    }

}

impl Default for AsyncAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for AsyncAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        if self.shared.refuses_current_thread() {
            return Err(LoggerError::thread_refused("AsyncAppender"));
        }

        let mut event = event.clone();
        event.capture_thread_context();

        match self.shared.queue.put(event) {
            Ok(outcome) => {
                self.shared.metrics.record_enqueued();
                if outcome == PutOutcome::AfterBlocking {
                    self.shared.metrics.record_producer_block();
                }
                Ok(())
            }
            Err(_) => {
                self.shared.metrics.record_rejected();
                Err(LoggerError::QueueClosed)
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.sinks.flush_all();
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        if self.capacity == 0 {
            return Err(LoggerError::config(
                "AsyncAppender",
                "queue capacity must be at least 1",
            ));
        }
        if self.shared.state() != DispatchState::Idle {
            return Ok(());
        }
        self.shared.queue.resize(self.capacity);

        let name = format!(
            "async-dispatcher-{}",
            NEXT_DISPATCHER.fetch_add(1, Ordering::Relaxed)
        );
        let shared = Arc::clone(&self.shared);
        self.shared.set_state(DispatchState::Running);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || shared.dispatch());

        match spawned {
            Ok(handle) => {
                *self.shared.dispatcher_thread.lock() = Some(handle.thread().id());
                *self.shared.dispatcher.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(DispatchState::Idle);
                Err(LoggerError::io_operation("spawning dispatcher thread", name, e))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.shared.shutdown();
        Ok(())
    }

    fn nested_sinks(&self) -> Option<Arc<FanOut>> {
        Some(Arc::clone(&self.shared.sinks))
    }

    fn thread_gate(&self) -> Option<Arc<dyn ThreadGate>> {
        Some(Arc::clone(&self.shared) as Arc<dyn ThreadGate>)
    }
}

impl Drop for AsyncAppender {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

/// Shared control surface of an [`AsyncAppender`]
#[derive(Clone)]
pub struct AsyncHandle {
    shared: Arc<Shared>,
}

impl AsyncHandle {
    /// Returns `false` if the sink was already attached.
    pub fn add_sink(&self, sink: SinkRef) -> bool {
        self.shared.sinks.add(sink)
    }

    pub fn remove_sink(&self, sink: &SinkRef) -> Option<SinkRef> {
        self.shared.sinks.remove(sink)
    }

    pub fn remove_sink_by_name(&self, name: &str) -> Option<SinkRef> {
        self.shared.sinks.remove_by_name(name)
    }

    pub fn sink(&self, name: &str) -> Option<SinkRef> {
        self.shared.sinks.get(name)
    }

    pub fn sinks(&self) -> Arc<Vec<SinkRef>> {
        self.shared.sinks.snapshot()
    }

    /// Change the queue capacity, keeping FIFO order.
    ///
    /// Shrinking below the number of queued events discards the oldest
    /// ones; the number discarded is returned.
    pub fn resize(&self, capacity: usize) -> Result<usize> {
        if capacity == 0 {
            return Err(LoggerError::config(
                "AsyncAppender",
                "queue capacity must be at least 1",
            ));
        }
        let dropped = self.shared.queue.resize(capacity);
        if !dropped.is_empty() {
            self.shared.metrics.record_truncated(dropped.len());
            diagnostics::warn(format_args!(
                "Async queue shrunk to {}, {} queued events discarded",
                capacity,
                dropped.len()
            ));
        }
        Ok(dropped.len())
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Events waiting for the dispatcher
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.shared.metrics
    }

    pub fn state(&self) -> DispatchState {
        self.shared.state()
    }
}

impl std::fmt::Debug for AsyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("state", &self.state())
            .field("capacity", &self.capacity())
            .field("queued", &self.queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use crate::core::{CountingErrorHandler, LogLevel, Ndc, SinkBuilder};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::time::Duration;

    /// Announces each event, then waits until released
    struct GateAppender {
        started: Sender<String>,
        release: Receiver<()>,
        delivered: Arc<Mutex<Vec<String>>>,
    }

    impl Appender for GateAppender {
        fn append(&mut self, event: &LogEvent) -> Result<()> {
            let _ = self.started.send(event.message.clone());
            let _ = self.release.recv();
            self.delivered.lock().push(event.message.clone());
            Ok(())
        }
    }

    fn event(message: &str) -> LogEvent {
        LogEvent::new("async", LogLevel::Info, message)
    }

    #[test]
    fn test_zero_capacity_is_configuration_error() {
        let result = SinkBuilder::new("async", AsyncAppender::new().with_capacity(0)).build();
        assert!(result.unwrap_err().is_configuration());
    }

    #[test]
    fn test_close_drains_every_event_once() {
        let memory = MemoryAppender::new().with_delay(Duration::from_millis(1));
        let events = memory.events_handle();
        let inner = SinkBuilder::new("memory", memory).build().unwrap();

        let appender = AsyncAppender::new().with_capacity(4).with_sink(inner.clone());
        let handle = appender.handle();
        let sink = SinkBuilder::new("async", appender).build().unwrap();
        assert_eq!(handle.state(), DispatchState::Running);

        for i in 0..20 {
            assert!(sink.deliver(&event(&format!("e{}", i))));
        }
        sink.close();

        let expected: Vec<String> = (0..20).map(|i| format!("e{}", i)).collect();
        assert_eq!(events.messages(), expected);
        assert_eq!(events.close_count(), 1);
        assert!(inner.is_closed());
        assert_eq!(handle.state(), DispatchState::Stopped);
        assert_eq!(handle.metrics().delivered(), 20);

        // Second close is a no-op
        sink.close();
        assert_eq!(events.close_count(), 1);
    }

    #[test]
    fn test_full_queue_blocks_producer() {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let gate = GateAppender {
            started: started_tx,
            release: release_rx,
            delivered: Arc::clone(&delivered),
        };
        let inner = SinkBuilder::new("gate", gate).build().unwrap();

        let mut appender = AsyncAppender::new().with_capacity(1).with_sink(inner);
        let handle = appender.handle();
        appender.activate().unwrap();

        appender.append(&event("first")).unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        appender.append(&event("second")).unwrap();
        assert_eq!(handle.queued(), 1);

        let producer = thread::spawn(move || {
            appender.append(&event("third")).unwrap();
            appender
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());

        for _ in 0..3 {
            release_tx.send(()).unwrap();
        }
        let mut appender = producer.join().unwrap();
        appender.close().unwrap();

        assert_eq!(*delivered.lock(), vec!["first", "second", "third"]);
        assert_eq!(handle.metrics().producer_blocks(), 1);
    }

    #[test]
    fn test_resize_discards_oldest() {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let gate = GateAppender {
            started: started_tx,
            release: release_rx,
            delivered: Arc::clone(&delivered),
        };
        let inner = SinkBuilder::new("gate", gate).build().unwrap();

        let mut appender = AsyncAppender::new().with_capacity(8).with_sink(inner);
        let handle = appender.handle();
        appender.activate().unwrap();

        appender.append(&event("held")).unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        for name in ["a", "b", "c", "d"] {
            appender.append(&event(name)).unwrap();
        }

        assert_eq!(handle.resize(2).unwrap(), 2);
        assert_eq!(handle.capacity(), 2);
        assert!(handle.resize(0).is_err());

        drop(release_tx);
        appender.close().unwrap();
        assert_eq!(*delivered.lock(), vec!["held", "c", "d"]);
        assert_eq!(handle.metrics().truncated_by_resize(), 2);
    }

    #[test]
    fn test_submit_after_close_is_reported() {
        let counter = Arc::new(CountingErrorHandler::new());
        let appender = AsyncAppender::new();
        let handle = appender.handle();
        let sink = SinkBuilder::new("async", appender)
            .error_handler(counter.clone())
            .build()
            .unwrap();

        handle.shared.shutdown();
        assert!(!sink.deliver(&event("late")));
        assert_eq!(counter.count(), 1);
        assert_eq!(handle.metrics().rejected_after_close(), 1);
    }

    #[test]
    fn test_context_captured_on_submitting_thread() {
        let memory = MemoryAppender::new();
        let events = memory.events_handle();
        let mut appender = AsyncAppender::new()
            .with_sink(SinkBuilder::new("memory", memory).build().unwrap());
        appender.activate().unwrap();

        {
            let _scope = Ndc::scope("request-7");
            appender.append(&event("with context")).unwrap();
        }
        appender.close().unwrap();

        let captured = events.events();
        assert_eq!(captured[0].ndc.as_deref(), Some("request-7"));
        assert_eq!(
            captured[0].thread_name.as_deref(),
            thread::current().name()
        );
    }

    /// Sends the first event back into the outer sink once released
    struct LoopbackAppender {
        outer: Arc<Mutex<Option<SinkRef>>>,
        started: Sender<String>,
        release: Receiver<()>,
        delivered: Arc<Mutex<Vec<String>>>,
        looped_back: Arc<Mutex<Option<bool>>>,
    }

    impl Appender for LoopbackAppender {
        fn append(&mut self, event: &LogEvent) -> Result<()> {
            if event.message == "first" {
                let _ = self.started.send(event.message.clone());
                let _ = self.release.recv();
                let outer = self.outer.lock().clone();
                if let Some(outer) = outer {
                    let accepted = outer.deliver(&LogEvent::new("loop", LogLevel::Info, "loop"));
                    *self.looped_back.lock() = Some(accepted);
                }
            }
            self.delivered.lock().push(event.message.clone());
            Ok(())
        }
    }

    #[test]
    fn test_dispatcher_loopback_does_not_wait_behind_blocked_producer() {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let outer_slot = Arc::new(Mutex::new(None));
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let looped_back = Arc::new(Mutex::new(None));
        let loopback = LoopbackAppender {
            outer: Arc::clone(&outer_slot),
            started: started_tx,
            release: release_rx,
            delivered: Arc::clone(&delivered),
            looped_back: Arc::clone(&looped_back),
        };

        let counter = Arc::new(CountingErrorHandler::new());
        let appender = AsyncAppender::new()
            .with_capacity(1)
            .with_sink(SinkBuilder::new("loopback", loopback).build().unwrap());
        let handle = appender.handle();
        let outer = SinkBuilder::new("async", appender)
            .error_handler(counter.clone())
            .build()
            .unwrap();
        *outer_slot.lock() = Some(outer.clone());

        assert!(outer.deliver(&event("first")));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(outer.deliver(&event("second")));
        assert_eq!(handle.queued(), 1);

        // Blocks in put on the full queue while holding the sink lock
        let (done_tx, done_rx) = unbounded();
        let producer = {
            let outer = outer.clone();
            thread::spawn(move || {
                let accepted = outer.deliver(&event("third"));
                let _ = done_tx.send(accepted);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());

        release_tx.send(()).unwrap();
        let accepted = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("producer and dispatcher deadlocked");
        assert!(accepted);
        producer.join().unwrap();

        *outer_slot.lock() = None;
        outer.close();
        assert_eq!(*delivered.lock(), vec!["first", "second", "third"]);
        assert_eq!(*looped_back.lock(), Some(false));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_handle_manages_nested_sinks() {
        let appender = AsyncAppender::new();
        let handle = appender.handle();
        let sink = SinkBuilder::new("m", MemoryAppender::new()).build().unwrap();

        assert!(handle.add_sink(sink.clone()));
        assert!(!handle.add_sink(sink.clone()));
        assert!(handle.sink("m").is_some());
        assert_eq!(handle.sinks().len(), 1);
        assert!(appender.nested_sinks().is_some());
        assert!(handle.remove_sink_by_name("m").is_some());
        assert!(handle.remove_sink(&sink).is_none());
    }
}
