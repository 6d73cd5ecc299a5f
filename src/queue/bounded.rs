//! A bounded, policy-driven FIFO (spec §4.F "Configuration" /
//! "`enqueue`"). The `drop_oldest` policy needs producer-side eviction of
//! the queue's head, which a channel's `Sender` cannot do, so this is a
//! hand-rolled `VecDeque` guarded by a `parking_lot::Mutex` and signalled
//! with a `Condvar` rather than `crossbeam-channel`'s bounded channel.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// How `push` behaves when the queue is already at capacity (spec §4.F
/// `backpressure_policy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Suspend the caller until space is available or the queue is shut down.
    Block,
    /// Reject the new item and increment the drop counter.
    Drop,
    /// Evict the oldest queued item to make room for the new one.
    DropOldest,
}

/// The outcome `push` reports back to the caller, for drop-counter
/// bookkeeping at the call site (the queue itself has no notion of logger
/// names, so it cannot key the counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Pushed,
    /// The new item was rejected (`Drop` policy, queue full).
    DroppedNew,
    /// The queue's oldest item was evicted to make room (`DropOldest`).
    DroppedOldest,
    /// `push` was abandoned because the queue had already been shut down.
    Closed,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A bounded queue supporting the three spec backpressure policies plus a
/// cooperative shutdown signal the worker waits on alongside "item
/// available".
pub(crate) struct BoundedQueue<T> {
    capacity: usize,
    policy: BackpressurePolicy,
    state: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        assert!(capacity > 0, "max_queue_size must be positive");
        BoundedQueue {
            capacity,
            policy,
            state: Mutex::new(Inner { items: VecDeque::with_capacity(capacity), closed: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push `item` per the configured policy. Blocks only under
    /// [`BackpressurePolicy::Block`]; every other policy returns immediately.
    pub fn push(&self, item: T) -> PushOutcome {
        let mut guard = self.state.lock();
        if guard.closed {
            return PushOutcome::Closed;
        }

        if guard.items.len() < self.capacity {
            guard.items.push_back(item);
            self.not_empty.notify_one();
            return PushOutcome::Pushed;
        }

        match self.policy {
            BackpressurePolicy::Block => {
                while guard.items.len() >= self.capacity && !guard.closed {
                    self.not_full.wait(&mut guard);
                }
                if guard.closed {
                    return PushOutcome::Closed;
                }
                guard.items.push_back(item);
                self.not_empty.notify_one();
                PushOutcome::Pushed
            }
            BackpressurePolicy::Drop => PushOutcome::DroppedNew,
            BackpressurePolicy::DropOldest => {
                guard.items.pop_front();
                guard.items.push_back(item);
                self.not_empty.notify_one();
                PushOutcome::DroppedOldest
            }
        }
    }

    /// Block the worker until an item is available or the queue is closed
    /// and drained. Returns `None` only once nothing remains to drain.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.state.lock();
        loop {
            if let Some(item) = guard.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            self.not_empty.wait(&mut guard);
        }
    }

    /// Mark the queue closed: no further `push` succeeds, and every waiter
    /// in `pop`/blocked `push` is woken so it can observe the closed flag
    /// rather than hang (spec §4.F `shutdown`: "stop accepting new
    /// enqueues").
    pub fn close(&self) {
        let mut guard = self.state.lock();
        guard.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn push_and_pop_preserve_fifo_order() {
        let queue = BoundedQueue::new(4, BackpressurePolicy::Block);
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn drop_policy_rejects_when_full() {
        let queue = BoundedQueue::new(2, BackpressurePolicy::Drop);
        assert_eq!(queue.push(1), PushOutcome::Pushed);
        assert_eq!(queue.push(2), PushOutcome::Pushed);
        assert_eq!(queue.push(3), PushOutcome::DroppedNew);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn drop_oldest_policy_evicts_head() {
        let queue = BoundedQueue::new(2, BackpressurePolicy::DropOldest);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.push(3), PushOutcome::DroppedOldest);
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn blocked_push_resumes_once_space_frees() {
        let queue = Arc::new(BoundedQueue::new(1, BackpressurePolicy::Block));
        queue.push(1);

        let producer_queue = Arc::clone(&queue);
        let producer = thread::spawn(move || {
            producer_queue.push(2);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.pop(), Some(1));
        producer.join().unwrap();
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn close_wakes_blocked_pop_with_none_once_drained() {
        let queue = Arc::new(BoundedQueue::<i32>::new(2, BackpressurePolicy::Block));
        let waiter_queue = Arc::clone(&queue);
        let waiter = thread::spawn(move || waiter_queue.pop());

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn close_then_push_reports_closed() {
        let queue = BoundedQueue::new(2, BackpressurePolicy::Block);
        queue.close();
        assert_eq!(queue.push(1), PushOutcome::Closed);
    }
}
