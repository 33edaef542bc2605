//! Fixed-capacity FIFO buffers
//!
//! [`BoundedQueue`] is the bare ring buffer; it never blocks and reports the
//! empty/full transitions its callers need for wake-ups. [`BlockingQueue`]
//! wraps it with a mutex and two condition variables: producers wait on
//! `not_full`, the consumer waits on `not_empty`, and each side is only woken
//! by the transition it cares about.

use parking_lot::{Condvar, Mutex};

/// Ring buffer with a fixed, resizable capacity (at least 1)
#[derive(Debug)]
pub struct BoundedQueue<T> {
    buf: Vec<Option<T>>,
    first: usize,
    next: usize,
    len: usize,
}

impl<T> BoundedQueue<T> {
    /// Capacity 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        Self {
            buf,
            first: 0,
            next: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// True when exactly one element is stored, i.e. the last push moved the
    /// queue out of the empty state.
    pub fn was_empty(&self) -> bool {
        self.len == 1
    }

    /// True when one slot is free, i.e. the last pop moved the queue out of
    /// the full state.
    pub fn was_full(&self) -> bool {
        self.len + 1 == self.buf.len()
    }

    /// Append `item`, handing it back when there is no room.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.buf[self.next] = Some(item);
        self.next = (self.next + 1) % self.buf.len();
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.buf[self.first].take();
        self.first = (self.first + 1) % self.buf.len();
        self.len -= 1;
        item
    }

    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            None
        } else {
            self.buf[self.first].as_ref()
        }
    }

    /// Change the capacity, keeping FIFO order.
    ///
    /// When shrinking below the current length the oldest excess entries are
    /// discarded and returned, oldest first.
    pub fn resize(&mut self, new_capacity: usize) -> Vec<T> {
        let new_capacity = new_capacity.max(1);
        let mut items = Vec::with_capacity(self.len);
        while let Some(item) = self.pop() {
            items.push(item);
        }
        let excess = items.len().saturating_sub(new_capacity);
        let kept = items.split_off(excess);

        *self = Self::new(new_capacity);
        for item in kept {
            // Cannot fail: kept.len() <= new_capacity.
            let _ = self.push(item);
        }
        items
    }

    /// Remove and return everything, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len);
        while let Some(item) = self.pop() {
            items.push(item);
        }
        items
    }
}

struct Shared<T> {
    queue: BoundedQueue<T>,
    closing: bool,
    producers_blocked: u64,
}

/// Thread-safe blocking wrapper around [`BoundedQueue`]
pub struct BlockingQueue<T> {
    shared: Mutex<Shared<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

/// Outcome of [`BlockingQueue::put`]
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// Stored without waiting
    Immediate,
    /// Stored after waiting for a free slot
    AfterBlocking,
}

impl<T> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Mutex::new(Shared {
                queue: BoundedQueue::new(capacity),
                closing: false,
                producers_blocked: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Store `item`, waiting while the queue is full.
    ///
    /// Once [`close`](Self::close) has been called the item is handed back,
    /// including to producers that were already waiting.
    pub fn put(&self, item: T) -> Result<PutOutcome, T> {
        let mut shared = self.shared.lock();
        let mut waited = false;
        while shared.queue.is_full() && !shared.closing {
            if !waited {
                shared.producers_blocked += 1;
                waited = true;
            }
            self.not_full.wait(&mut shared);
        }
        if shared.closing {
            return Err(item);
        }
        shared.queue.push(item)?;
        if shared.queue.was_empty() {
            self.not_empty.notify_one();
        }
        Ok(if waited {
            PutOutcome::AfterBlocking
        } else {
            PutOutcome::Immediate
        })
    }

    /// Take the oldest item, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closing and fully drained.
    pub fn take(&self) -> Option<T> {
        let mut shared = self.shared.lock();
        while shared.queue.is_empty() && !shared.closing {
            self.not_empty.wait(&mut shared);
        }
        let item = shared.queue.pop()?;
        if shared.queue.was_full() {
            self.not_full.notify_all();
        }
        Some(item)
    }

    /// Refuse further puts and wake every waiter. Queued items stay
    /// available to [`take`](Self::take).
    pub fn close(&self) {
        let mut shared = self.shared.lock();
        shared.closing = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closing(&self) -> bool {
        self.shared.lock().closing
    }

    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().queue.capacity()
    }

    /// Times a producer had to wait for space
    pub fn producers_blocked(&self) -> u64 {
        self.shared.lock().producers_blocked
    }

    /// See [`BoundedQueue::resize`]; waiting producers are woken if room
    /// appeared.
    pub fn resize(&self, new_capacity: usize) -> Vec<T> {
        let mut shared = self.shared.lock();
        let dropped = shared.queue.resize(new_capacity);
        if !shared.queue.is_full() {
            self.not_full.notify_all();
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_and_wraparound() {
        let mut q = BoundedQueue::new(3);
        for round in 0..4 {
            assert!(q.push(round * 10).is_ok());
            assert!(q.push(round * 10 + 1).is_ok());
            assert_eq!(q.pop(), Some(round * 10));
            assert_eq!(q.pop(), Some(round * 10 + 1));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_push_when_full_hands_item_back() {
        let mut q = BoundedQueue::new(2);
        q.push('a').unwrap();
        assert!(q.was_empty());
        q.push('b').unwrap();
        assert!(q.is_full());
        assert_eq!(q.push('c'), Err('c'));
        assert_eq!(q.pop(), Some('a'));
        assert!(q.was_full());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let q: BoundedQueue<u8> = BoundedQueue::new(0);
        assert_eq!(q.capacity(), 1);
    }

    #[test]
    fn test_resize_grow_keeps_order() {
        let mut q = BoundedQueue::new(3);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.pop();
        q.push(3).unwrap();
        q.push(4).unwrap();

        assert!(q.resize(8).is_empty());
        assert_eq!(q.capacity(), 8);
        assert_eq!(q.drain(), vec![2, 3, 4]);
    }

    #[test]
    fn test_resize_shrink_drops_oldest() {
        let mut q = BoundedQueue::new(5);
        for i in 0..5 {
            q.push(i).unwrap();
        }
        let dropped = q.resize(2);
        assert_eq!(dropped, vec![0, 1, 2]);
        assert_eq!(q.drain(), vec![3, 4]);
    }

    #[test]
    fn test_blocking_put_waits_for_take() {
        let q = Arc::new(BlockingQueue::new(1));
        assert_eq!(q.put(1), Ok(PutOutcome::Immediate));

        let producer = {
            let q = q.clone();
            thread::spawn(move || q.put(2))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());

        assert_eq!(q.take(), Some(1));
        assert_eq!(producer.join().unwrap(), Ok(PutOutcome::AfterBlocking));
        assert_eq!(q.take(), Some(2));
        assert_eq!(q.producers_blocked(), 1);
    }

    #[test]
    fn test_close_drains_then_ends() {
        let q = BlockingQueue::new(4);
        q.put("a").unwrap();
        q.put("b").unwrap();
        q.close();
        assert_eq!(q.put("c"), Err("c"));
        assert_eq!(q.take(), Some("a"));
        assert_eq!(q.take(), Some("b"));
        assert_eq!(q.take(), None);
    }

    #[test]
    fn test_close_wakes_idle_consumer() {
        let q: Arc<BlockingQueue<u32>> = Arc::new(BlockingQueue::new(2));
        let consumer = {
            let q = q.clone();
            thread::spawn(move || q.take())
        };
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_close_rejects_waiting_producer() {
        let q = Arc::new(BlockingQueue::new(1));
        q.put(0).unwrap();
        let producer = {
            let q = q.clone();
            thread::spawn(move || q.put(1))
        };
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(producer.join().unwrap(), Err(1));
        assert_eq!(q.len(), 1);
    }
}
