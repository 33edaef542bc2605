//! Ordered set of sinks with snapshot iteration
//!
//! Membership is by identity: adding the same `SinkRef` twice keeps one entry,
//! while two distinct sinks may share a name. Delivery iterates an immutable
//! snapshot, so sinks added or removed during a fan-out do not disturb it.

use super::log_event::LogEvent;
use super::sink::SinkRef;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct FanOut {
    sinks: RwLock<Arc<Vec<SinkRef>>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `sink` unless this exact sink is already present.
    ///
    /// Returns `false` for a duplicate.
    pub fn add(&self, sink: SinkRef) -> bool {
        let mut guard = self.sinks.write();
        if guard.iter().any(|s| Arc::ptr_eq(s, &sink)) {
            return false;
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(sink);
        *guard = Arc::new(next);
        true
    }

    /// Detach `sink` without closing it.
    pub fn remove(&self, sink: &SinkRef) -> Option<SinkRef> {
        self.remove_where(|s| Arc::ptr_eq(s, sink))
    }

    /// Detach the first sink named `name` without closing it.
    pub fn remove_by_name(&self, name: &str) -> Option<SinkRef> {
        self.remove_where(|s| s.name() == name)
    }

    fn remove_where(&self, pred: impl Fn(&SinkRef) -> bool) -> Option<SinkRef> {
        let mut guard = self.sinks.write();
        let pos = guard.iter().position(pred)?;
        let mut next: Vec<SinkRef> = guard.as_ref().clone();
        let removed = next.remove(pos);
        *guard = Arc::new(next);
        Some(removed)
    }

    /// Detach every sink and hand them back, closing none.
    pub fn remove_all(&self) -> Vec<SinkRef> {
        let taken = std::mem::take(&mut *self.sinks.write());
        Arc::try_unwrap(taken).unwrap_or_else(|shared| shared.as_ref().clone())
    }

    pub fn get(&self, name: &str) -> Option<SinkRef> {
        self.sinks.read().iter().find(|s| s.name() == name).cloned()
    }

    pub fn contains(&self, sink: &SinkRef) -> bool {
        self.sinks.read().iter().any(|s| Arc::ptr_eq(s, sink))
    }

    /// Current members in insertion order
    pub fn snapshot(&self) -> Arc<Vec<SinkRef>> {
        Arc::clone(&self.sinks.read())
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    /// Hand `event` to every member; returns how many sinks were tried.
    pub fn deliver_all(&self, event: &LogEvent) -> usize {
        let snapshot = self.snapshot();
        for sink in snapshot.iter() {
            sink.deliver(event);
        }
        snapshot.len()
    }

    pub fn flush_all(&self) {
        for sink in self.snapshot().iter() {
            sink.flush();
        }
    }

    /// Close every member and empty the set.
    pub fn close_all(&self) {
        for sink in self.remove_all() {
            sink.close();
        }
    }
}
