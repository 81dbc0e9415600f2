//! Monitor-style FIFO shared by every producer and consumer of a run.
//!
//! One mutex guards the pending items together with the depth watermark and the
//! serial/ordinal counters, and one condition variable signals "work or shutdown".
//! Producers wake a single waiter per push; the shutdown coordinator wakes all of
//! them through `wake_all`.
use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::{item::WorkItem, metrics::RunMetrics, sync::shutdown::ShutdownCoordinator};

#[derive(Debug)]
struct QueueState {
    items: VecDeque<WorkItem>,
    max_depth: usize,
    /// Serial handed to the next enqueued item
    next_serial: u64,
    /// Ordinal handed to the next dequeued item
    next_ordinal: u64,
    waiting: usize,
}

impl QueueState {
    fn pop(&mut self) -> Option<Dequeued> {
        let item = self.items.pop_front()?;
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        Some(Dequeued { item, ordinal })
    }
}

/// An item removed from the queue, tagged with its position in the dequeue order.
///
/// Serials and ordinals both start at 1 and are assigned under the same lock, so in
/// a FIFO queue the n-th item dequeued is always carrying serial n.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dequeued {
    pub item: WorkItem,
    pub ordinal: u64,
}

/// Point-in-time depth figures for a queue.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub depth: usize,
    pub max_depth: usize,
    pub enqueued: u64,
    pub dequeued: u64,
}

/// Unbounded multi-producer, multi-consumer work queue.
#[derive(Debug)]
pub struct SharedQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl Default for SharedQueue {
    fn default() -> Self {
        SharedQueue::new()
    }
}

impl SharedQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                max_depth: 0,
                next_serial: 1,
                next_ordinal: 1,
                waiting: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Appends `item` at the tail and wakes one waiting consumer.
    ///
    /// The serial is stamped, the watermark raised and `metrics` updated before the
    /// lock is released, so any consumer that sees the item also sees its bookkeeping.
    /// Returns the serial assigned to the item.
    pub fn enqueue(&self, mut item: WorkItem, metrics: &RunMetrics) -> u64 {
        let serial = {
            let mut state = self.state.lock();
            let serial = state.next_serial;
            state.next_serial += 1;
            item.stamp(serial);
            metrics.record_generated(&item);
            state.items.push_back(item);
            state.max_depth = state.max_depth.max(state.items.len());
            serial
        };
        self.ready.notify_one();
        serial
    }

    /// Removes the head item if there is one.
    pub fn try_dequeue(&self) -> Option<Dequeued> {
        self.state.lock().pop()
    }

    /// Blocks until an item is available or `shutdown` has been signaled.
    ///
    /// Pending items always win over the shutdown flag, so `None` means the queue was
    /// empty *and* no more items will ever arrive. The predicate is re-checked after
    /// every wake, spurious or not.
    pub fn wait_dequeue(&self, shutdown: &ShutdownCoordinator) -> Option<Dequeued> {
        let mut state = self.state.lock();
        loop {
            if let Some(next) = state.pop() {
                return Some(next);
            }
            if shutdown.is_finished() {
                return None;
            }
            state.waiting += 1;
            self.ready.wait(&mut state);
            state.waiting -= 1;
        }
    }

    /// Broadcast to every waiter. The lock is taken first so a consumer that has
    /// checked the predicate but not yet parked cannot miss the wake.
    pub(crate) fn wake_all(&self) -> usize {
        let _state = self.state.lock();
        self.ready.notify_all()
    }

    pub fn depth(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Highest depth observed since the queue was created.
    pub fn max_depth(&self) -> usize {
        self.state.lock().max_depth
    }

    /// Number of consumers currently parked in `wait_dequeue`.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiting
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            depth: state.items.len(),
            max_depth: state.max_depth,
            enqueued: state.next_serial - 1,
            dequeued: state.next_ordinal - 1,
        }
    }
}
