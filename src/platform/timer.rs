//! Timer queue for the local host
//!
//! Design:
//! - Min-heap of (deadline, generation) entries
//! - Callbacks live in a slab; the heap only holds slot indices
//! - Cancellation removes the slab entry and leaves the heap entry stale;
//!   stale entries are skipped when they reach the top
//! - Equal deadlines fire in registration order

use super::{Callback, TimerHandle};
use slab::Slab;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// A timer waiting for its deadline
struct Timer {
    generation: u64,
    callback: Callback,
}

/// Entry in the timer heap (for ordering)
#[derive(Debug)]
struct TimerEntry {
    deadline: Duration,
    generation: u64,
    slot: usize,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest deadline
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

/// Pending one-shot timers, ordered by deadline
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    timers: Slab<Timer>,
    next_generation: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            timers: Slab::new(),
            next_generation: 1,
        }
    }

    /// Schedule `callback` to fire at `deadline`
    pub(crate) fn schedule(&mut self, deadline: Duration, callback: Callback) -> TimerHandle {
        let generation = self.next_generation;
        self.next_generation += 1;

        let slot = self.timers.insert(Timer {
            generation,
            callback,
        });
        self.heap.push(TimerEntry {
            deadline,
            generation,
            slot,
        });

        TimerHandle::new(slot, generation)
    }

    /// Cancel a timer
    /// Returns false if the timer already fired or was already cancelled
    pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
        let live = self
            .timers
            .get(handle.slot())
            .is_some_and(|t| t.generation == handle.generation());
        if live {
            self.timers.remove(handle.slot());
        }
        live
    }

    /// Remove and return the earliest callback whose deadline is <= `now`
    pub(crate) fn pop_expired(&mut self, now: Duration) -> Option<Callback> {
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                return None;
            }
            let entry = self.heap.pop()?;
            if self.is_live(&entry) {
                return Some(self.timers.remove(entry.slot).callback);
            }
        }
        None
    }

    /// Deadline of the earliest live timer
    pub(crate) fn next_deadline(&mut self) -> Option<Duration> {
        while let Some(entry) = self.heap.peek() {
            if self.is_live(entry) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Number of pending timers
    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }

    fn is_live(&self, entry: &TimerEntry) -> bool {
        self.timers
            .get(entry.slot)
            .is_some_and(|t| t.generation == entry.generation)
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn recorder(log: &Rc<RefCell<Vec<u32>>>, id: u32) -> Callback {
        let log = log.clone();
        Box::new(move || log.borrow_mut().push(id))
    }

    fn fire_all(queue: &mut TimerQueue, now: Duration) {
        while let Some(callback) = queue.pop_expired(now) {
            callback();
        }
    }

    #[test]
    fn test_oneshot_timer() {
        let mut queue = TimerQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        queue.schedule(ms(100), recorder(&log, 1));
        assert_eq!(queue.len(), 1);

        // Not expired yet
        assert!(queue.pop_expired(ms(50)).is_none());
        assert_eq!(queue.len(), 1);

        // Now expired
        fire_all(&mut queue, ms(100));
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_multiple_timers_fire_by_deadline() {
        let mut queue = TimerQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        queue.schedule(ms(100), recorder(&log, 1));
        queue.schedule(ms(50), recorder(&log, 2));
        queue.schedule(ms(150), recorder(&log, 3));

        fire_all(&mut queue, ms(50));
        assert_eq!(*log.borrow(), vec![2]);

        fire_all(&mut queue, ms(150));
        assert_eq!(*log.borrow(), vec![2, 1, 3]);
    }

    #[test]
    fn test_equal_deadlines_fire_in_registration_order() {
        let mut queue = TimerQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for id in 0..5 {
            queue.schedule(ms(10), recorder(&log, id));
        }

        fire_all(&mut queue, ms(10));
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_timer() {
        let mut queue = TimerQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let handle = queue.schedule(ms(100), recorder(&log, 1));
        assert!(queue.cancel(handle));
        assert!(!queue.cancel(handle)); // Already cancelled

        fire_all(&mut queue, ms(100));
        assert!(log.borrow().is_empty());
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_stale_handle_does_not_cancel_reused_slot() {
        let mut queue = TimerQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = queue.schedule(ms(10), recorder(&log, 1));
        fire_all(&mut queue, ms(10));

        // Slab hands the same slot to the next timer
        let second = queue.schedule(ms(20), recorder(&log, 2));
        assert_eq!(first.slot(), second.slot());

        assert!(!queue.cancel(first));
        fire_all(&mut queue, ms(20));
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_next_deadline_skips_cancelled() {
        let mut queue = TimerQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        assert!(queue.next_deadline().is_none());

        let early = queue.schedule(ms(10), recorder(&log, 1));
        queue.schedule(ms(30), recorder(&log, 2));
        assert_eq!(queue.next_deadline(), Some(ms(10)));

        queue.cancel(early);
        assert_eq!(queue.next_deadline(), Some(ms(30)));
    }
}
