//! Deterministic event queue.
//!
//! 确定性事件队列。

use crate::time::SimTime;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
struct Scheduled<E> {
    at: SimTime,
    id: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; insertion order breaks ties.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Pops events in non-decreasing time, first-in first-out among equal times.
///
/// 按时间非递减顺序弹出事件，时间相同时先进先出。
#[derive(Debug)]
pub struct EventQueue<E> {
    heap: BinaryHeap<Scheduled<E>>,
    next_id: u64,
    now: SimTime,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_id: 0,
            now: SimTime::ZERO,
        }
    }

    /// Time of the last popped event.
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedules `event` at `at`.
    ///
    /// # Panics
    /// If `at` lies before the current time.
    pub fn schedule(&mut self, at: SimTime, event: E) {
        assert!(at >= self.now, "event scheduled in the past: {at} < {}", self.now);
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Scheduled { at, id, event });
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|s| s.at)
    }

    /// Pops the earliest event and advances the clock to it.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        let Scheduled { at, event, .. } = self.heap.pop()?;
        self.now = at;
        Some((at, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_by_time_then_fifo() {
        let mut queue = EventQueue::new();
        queue.schedule(SimTime::from_micros(5), "c");
        queue.schedule(SimTime::from_micros(1), "a");
        queue.schedule(SimTime::from_micros(5), "d");
        queue.schedule(SimTime::from_micros(1), "b");

        let order: Vec<_> = std::iter::from_fn(|| queue.pop().map(|(_, e)| e)).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
        assert_eq!(queue.now(), SimTime::from_micros(5));
    }

    #[test]
    #[should_panic(expected = "in the past")]
    fn test_rejects_past_events() {
        let mut queue = EventQueue::new();
        queue.schedule(SimTime::from_micros(5), ());
        queue.pop();
        queue.schedule(SimTime::from_micros(4), ());
    }
}
