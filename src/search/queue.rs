//! The concurrent min-priority queue (§4.3): a binary heap protected by one
//! mutex and one condition variable, supporting blocking pop, non-blocking
//! pop, and closure.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};

use crate::basetypes::{Cost, Digest};
use crate::search::node::MoveDescriptor;

/// One entry in the open set: a priority paired with the digest it refers
/// to and the move that produced it. Duplicates by digest are permitted
/// and expected (§3, §4.3) -- the closed-set check at pop time is what
/// filters obsolete entries, not the queue itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueItem {
    pub priority: Cost,
    pub digest: Digest,
    pub incoming_move: Option<MoveDescriptor>,
}

// `BinaryHeap` is a max-heap; reversing the comparison turns it into the
// min-heap the spec calls for.
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority)
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    heap: BinaryHeap<QueueItem>,
    closed: bool,
    /// Number of items popped via `pop_min_blocking` that have not yet been
    /// passed to `finish_task` -- i.e. the number of workers that might
    /// still push more work onto this queue. See `finish_task`.
    active: usize,
}

/// A thread-safe min-priority queue.
///
/// `add` signals one waiter; `close` broadcasts to all of them. No
/// decrease-key operation is offered on purpose (see `search::table`'s
/// doc comment) -- pushing a fresh, possibly-duplicate entry is always
/// correct and avoids complicating this type's locking.
pub struct PriorityQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl PriorityQueue {
    pub fn new() -> PriorityQueue {
        PriorityQueue {
            inner: Mutex::new(Inner { heap: BinaryHeap::new(), closed: false, active: 0 }),
            not_empty: Condvar::new(),
        }
    }

    /// Inserts `item`. Silently discarded if the queue is closed.
    pub fn add(&self, item: QueueItem) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        inner.heap.push(item);
        drop(inner);
        self.not_empty.notify_one();
    }

    /// Returns the minimum-priority item. Blocks while the queue is empty
    /// and open; returns `None` only once the queue is empty *and* closed.
    ///
    /// Every `Some` returned here counts as one "active" pop until the
    /// caller reports it finished via `finish_task` -- this is how the
    /// scheduler tells exhaustion (every worker idle, nothing left to pop)
    /// apart from a queue that simply hasn't been seeded yet.
    pub fn pop_min_blocking(&self) -> Option<QueueItem> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(item) = inner.heap.pop() {
                inner.active += 1;
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// Returns the minimum-priority item, or `None` immediately if the
    /// queue is currently empty (open or closed). Does not affect the
    /// active-task count; callers of this method are not expected to call
    /// `finish_task`.
    pub fn pop_min_nonblocking(&self) -> Option<QueueItem> {
        self.inner.lock().unwrap().heap.pop()
    }

    /// Reports that a previously `pop_min_blocking`-popped item has been
    /// fully processed, including pushing any successors it generated. If
    /// this was the last active pop and the heap is still empty, no worker
    /// can ever produce more work, so the queue closes itself and wakes
    /// every blocked consumer -- this is what lets the scheduler detect
    /// true open-set exhaustion rather than blocking forever.
    pub fn finish_task(&self) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(inner.active > 0, "finish_task called without a matching pop");
        inner.active = inner.active.saturating_sub(1);
        if inner.active == 0 && inner.heap.is_empty() && !inner.closed {
            inner.closed = true;
            drop(inner);
            self.not_empty.notify_all();
        }
    }

    /// Marks the queue closed and wakes every blocked consumer.
    /// Subsequent `add` calls are silently discarded.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        drop(inner);
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriorityQueue {
    fn default() -> PriorityQueue {
        PriorityQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn item(priority: Cost, digest: Digest) -> QueueItem {
        QueueItem { priority, digest, incoming_move: None }
    }

    #[test]
    fn pops_return_non_decreasing_priority() {
        let queue = PriorityQueue::new();
        queue.add(item(5, 1));
        queue.add(item(1, 2));
        queue.add(item(3, 3));
        let mut popped = Vec::new();
        while let Some(it) = queue.pop_min_nonblocking() {
            popped.push(it.priority);
        }
        assert_eq!(popped, vec![1, 3, 5]);
    }

    #[test]
    fn nonblocking_pop_on_empty_queue_returns_none() {
        let queue = PriorityQueue::new();
        assert!(queue.pop_min_nonblocking().is_none());
    }

    #[test]
    fn close_wakes_blocked_consumers() {
        let queue = Arc::new(PriorityQueue::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || queue.pop_min_blocking()));
        }
        // Give the consumers a chance to actually block before closing.
        thread::sleep(Duration::from_millis(50));
        queue.close();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), None);
        }
    }

    #[test]
    fn add_after_close_is_discarded() {
        let queue = PriorityQueue::new();
        queue.close();
        queue.add(item(1, 1));
        assert_eq!(queue.pop_min_blocking(), None);
    }

    #[test]
    fn blocking_pop_wakes_on_add() {
        let queue = Arc::new(PriorityQueue::new());
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_min_blocking())
        };
        thread::sleep(Duration::from_millis(20));
        queue.add(item(7, 42));
        let popped = reader.join().unwrap().unwrap();
        assert_eq!(popped.digest, 42);
    }

    #[test]
    fn finishing_the_last_active_task_on_an_empty_heap_closes_the_queue() {
        let queue = PriorityQueue::new();
        queue.add(item(1, 1));
        let popped = queue.pop_min_blocking().unwrap();
        assert_eq!(popped.digest, 1);
        // No successors pushed; finishing this task with nothing else in
        // flight and an empty heap means the queue is exhausted.
        queue.finish_task();
        assert_eq!(queue.pop_min_blocking(), None);
    }

    #[test]
    fn finishing_a_task_that_left_work_behind_does_not_close_the_queue() {
        let queue = PriorityQueue::new();
        queue.add(item(1, 1));
        let popped = queue.pop_min_blocking().unwrap();
        assert_eq!(popped.digest, 1);
        // Simulate this task's expansion pushing a successor before it
        // finishes.
        queue.add(item(2, 2));
        queue.finish_task();
        let next = queue.pop_min_blocking().unwrap();
        assert_eq!(next.digest, 2);
    }

    #[test]
    fn an_unseeded_queue_still_blocks_until_explicitly_closed() {
        // No item is ever added or popped here, so `active` never leaves
        // zero. This must not be mistaken for exhaustion: a queue that
        // hasn't been seeded yet is not the same as one that has run dry.
        let queue = Arc::new(PriorityQueue::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || queue.pop_min_blocking()));
        }
        thread::sleep(Duration::from_millis(50));
        queue.close();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), None);
        }
    }
}
