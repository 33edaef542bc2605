//! Counters for the asynchronous dispatch stage
//!
//! Tracks how events move through an [`AsyncAppender`](crate::appenders::AsyncAppender):
//! accepted into the queue, delivered by the dispatcher, producers that had
//! to wait for room, events refused after close began, and events discarded
//! by shrinking the queue.

use std::sync::atomic::{AtomicU64, Ordering};

/// ```
/// use rust_logger_hierarchy::core::DispatchMetrics;
///
/// let metrics = DispatchMetrics::new();
/// assert_eq!(metrics.in_flight(), 0);
/// assert_eq!(metrics.loss_rate(), 0.0);
/// ```
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    producer_blocks: AtomicU64,
    rejected_after_close: AtomicU64,
    truncated_by_resize: AtomicU64,
}

impl DispatchMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            producer_blocks: AtomicU64::new(0),
            rejected_after_close: AtomicU64::new(0),
            truncated_by_resize: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Times a producer waited for a free slot
    #[inline]
    pub fn producer_blocks(&self) -> u64 {
        self.producer_blocks.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_after_close(&self) -> u64 {
        self.rejected_after_close.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn truncated_by_resize(&self) -> u64 {
        self.truncated_by_resize.load(Ordering::Relaxed)
    }

    /// Accepted but neither delivered nor truncated yet
    pub fn in_flight(&self) -> u64 {
        self.enqueued()
            .saturating_sub(self.delivered() + self.truncated_by_resize())
    }

    /// Share of accepted events lost to resizing, as a percentage
    pub fn loss_rate(&self) -> f64 {
        let enqueued = self.enqueued();
        if enqueued == 0 {
            0.0
        } else {
            self.truncated_by_resize() as f64 / enqueued as f64 * 100.0
        }
    }

    #[inline]
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_producer_block(&self) {
        self.producer_blocks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_rejected(&self) {
        self.rejected_after_close.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_truncated(&self, count: usize) {
        self.truncated_by_resize
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

impl Clone for DispatchMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            delivered: AtomicU64::new(self.delivered()),
            producer_blocks: AtomicU64::new(self.producer_blocks()),
            rejected_after_close: AtomicU64::new(self.rejected_after_close()),
            truncated_by_resize: AtomicU64::new(self.truncated_by_resize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = DispatchMetrics::new();
        assert_eq!(metrics.enqueued(), 0);
        assert_eq!(metrics.delivered(), 0);
        assert_eq!(metrics.producer_blocks(), 0);
        assert_eq!(metrics.loss_rate(), 0.0);
    }

    #[test]
    fn test_in_flight_and_loss_rate() {
        let metrics = DispatchMetrics::new();
        for _ in 0..10 {
            metrics.record_enqueued();
        }
        for _ in 0..6 {
            metrics.record_delivered();
        }
        metrics.record_truncated(1);
        assert_eq!(metrics.in_flight(), 3);
        let rate = metrics.loss_rate();
        assert!((9.9..=10.1).contains(&rate), "loss rate was {}", rate);
    }

    #[test]
    fn test_clone_is_snapshot() {
        let metrics = DispatchMetrics::new();
        metrics.record_enqueued();
        let snapshot = metrics.clone();
        metrics.record_enqueued();
        assert_eq!(snapshot.enqueued(), 1);
        assert_eq!(metrics.enqueued(), 2);
    }
}
