//! Time-ordered event queue that owns the simulation clock.
//!
//! Events pop in non-decreasing time order. Events sharing a timestamp pop
//! in the order they were scheduled: every insert gets a monotonically
//! increasing sequence number used as the secondary key, so a seeded run
//! replays identically.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::event::Event;

/// Heap entry. Ordering: (time ASC, seq ASC).
#[derive(Debug)]
struct QueuedEvent {
    seq: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.event
            .time
            .total_cmp(&other.event.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Discrete-event priority queue for one simulation run.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<QueuedEvent>>,
    clock: f64,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event. No check is made that it lies in the future.
    pub fn schedule(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(QueuedEvent { seq, event }));
    }

    /// Remove the earliest event and advance the clock to its time.
    ///
    /// Returns `None` when nothing is queued; that is how the run loop
    /// learns it is done. The clock never moves backwards: an event
    /// scheduled before the current clock pops at the current clock.
    pub fn pop_next(&mut self) -> Option<Event> {
        let Reverse(QueuedEvent { event, .. }) = self.queue.pop()?;
        if event.time >= self.clock {
            self.clock = event.time;
        } else {
            log::debug!(
                "event for {} at {:.3} popped after clock {:.3}",
                event.agent,
                event.time,
                self.clock
            );
        }
        Some(event)
    }

    /// Time of the most recently popped event (0.0 before the first pop).
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Time of the next event without consuming it.
    pub fn peek_time(&self) -> Option<f64> {
        self.queue.peek().map(|e| e.0.event.time)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
