//! A capacity-bounded, non-blocking FIFO.

use std::collections::VecDeque;
use std::sync::Mutex;

/// FIFO with a fixed capacity. `put` and `get` never block; overflow is
/// signalled by a `false` return, not a panic.
pub struct Queue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> Queue<T> {
    /// Creates an empty queue with room for `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Pushes `item` to the back. Returns `false` without blocking if the
    /// queue is already at capacity.
    pub fn put(&self, item: T) -> bool {
        let mut items = self.items.lock().expect("queue lock poisoned");
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(item);
        true
    }

    /// Pops the item at the front, if any.
    pub fn get(&self) -> Option<T> {
        self.items.lock().expect("queue lock poisoned").pop_front()
    }

    /// Pops up to `max` items in FIFO order.
    pub fn drain_up_to(&self, max: usize) -> Vec<T> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let take = max.min(items.len());
        items.drain(..take).collect()
    }

    /// Whether the queue currently holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.lock().expect("queue lock poisoned").is_empty()
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().expect("queue lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_rejects_beyond_capacity() {
        let queue = Queue::new(2);
        assert!(queue.put(1));
        assert!(queue.put(2));
        assert!(!queue.put(3));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn get_returns_none_when_empty() {
        let queue: Queue<i32> = Queue::new(4);
        assert!(queue.is_empty());
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn drain_up_to_respects_fifo_order_and_cap() {
        let queue = Queue::new(10);
        for i in 0..5 {
            queue.put(i);
        }
        let drained = queue.drain_up_to(3);
        assert_eq!(drained, vec![0, 1, 2]);
        assert_eq!(queue.len(), 2);
    }
}
