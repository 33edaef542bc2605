//! In-process capture of events
//!
//! `MemoryAppender` keeps delivered events in a shared buffer that can be
//! inspected through a [`MemoryEvents`] handle after the appender has been
//! moved into a sink. A capacity turns the buffer into a ring that keeps the
//! newest events. An optional per-event delay makes it a convenient slow
//! consumer.

use crate::core::{Appender, LogEvent, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Shared {
    events: Mutex<VecDeque<LogEvent>>,
    changed: Condvar,
    closes: AtomicUsize,
    flushes: AtomicUsize,
}

/// Read side of a [`MemoryAppender`]
#[derive(Clone, Default)]
pub struct MemoryEvents {
    shared: Arc<Shared>,
}

impl MemoryEvents {
    pub fn len(&self) -> usize {
        self.shared.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.events.lock().is_empty()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.shared.events.lock().iter().cloned().collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.shared
            .events
            .lock()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.shared.events.lock().clear();
    }

    /// Times the owning appender was closed
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::Acquire)
    }

    pub fn flush_count(&self) -> usize {
        self.shared.flushes.load(Ordering::Acquire)
    }

    /// Wait until at least `count` events are stored or `timeout` passes.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.shared.events.lock();
        while events.len() < count {
            if self
                .shared
                .changed
                .wait_until(&mut events, deadline)
                .timed_out()
            {
                return events.len() >= count;
            }
        }
        true
    }
}

impl std::fmt::Debug for MemoryEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEvents").field("len", &self.len()).finish()
    }
}

#[derive(Debug, Default)]
pub struct MemoryAppender {
    events: MemoryEvents,
    capacity: Option<usize>,
    delay: Option<Duration>,
}

impl MemoryAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the newest `capacity` events.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    /// Sleep for `delay` before storing each event.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn events_handle(&self) -> MemoryEvents {
        self.events.clone()
    }
}

impl Appender for MemoryAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let shared = &self.events.shared;
        let mut events = shared.events.lock();
        if let Some(capacity) = self.capacity {
            while events.len() >= capacity {
                events.pop_front();
            }
        }
        events.push_back(event.clone());
        shared.changed.notify_all();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.events.shared.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.events.shared.closes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
