//! Bounded FIFO ring buffer of pids.
//!
//! Shaped after the teacher's [`RingBuffer`]-style metric buffer
//! (`metrics/series.rs`), but capped: pushing past capacity is rejected with
//! [`SimError::QueueFull`] rather than evicting the oldest entry, matching
//! §7's backpressure policy.

use std::collections::VecDeque;

use crate::error::{SimError, SimResult};
use crate::pcb::Pid;

/// A bounded FIFO queue of process ids.
#[derive(Debug, Clone)]
pub struct ProcessQueue {
    items: VecDeque<Pid>,
    capacity: usize,
}

impl ProcessQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Enqueue at the tail, or [`SimError::QueueFull`] if already at capacity.
    pub fn enqueue(&mut self, pid: Pid) -> SimResult<()> {
        if self.is_full() {
            return Err(SimError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.items.push_back(pid);
        Ok(())
    }

    /// Dequeue the head of the queue.
    pub fn dequeue(&mut self) -> Option<Pid> {
        self.items.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pid> {
        self.items.iter()
    }

    /// Remove and return the first pid matching `predicate`, preserving the
    /// relative order of everything else — used by DeadlineEDF to pull a
    /// specific pid out of the middle of the queue (§4.7).
    pub fn remove_where<F: Fn(Pid) -> bool>(&mut self, predicate: F) -> Option<Pid> {
        let index = self.items.iter().position(|&pid| predicate(pid))?;
        self.items.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = ProcessQueue::new(4);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn enqueue_past_capacity_is_rejected() {
        let mut q = ProcessQueue::new(2);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert!(matches!(q.enqueue(3), Err(SimError::QueueFull { capacity: 2 })));
    }

    #[test]
    fn remove_where_preserves_remaining_order() {
        let mut q = ProcessQueue::new(4);
        q.enqueue(10).unwrap();
        q.enqueue(20).unwrap();
        q.enqueue(30).unwrap();
        assert_eq!(q.remove_where(|pid| pid == 20), Some(20));
        let remaining: Vec<Pid> = q.iter().copied().collect();
        assert_eq!(remaining, vec![10, 30]);
    }
}
