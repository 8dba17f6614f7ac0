//! Cycle-driven event queue.
//!
//! Hardware blocks register future work (scanline transitions, timer
//! overflows) as events due at an absolute cycle count. The CPU advances the
//! counter after every instruction and the bus drains whatever came due.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// What a due event means to the bus. The bus owns every hardware block, so
/// dispatch happens there instead of through stored closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The visible part of the current scanline ended.
    HBlankStart,
    /// The current scanline (visible + blank) ended.
    LineEnd,
    /// Timer `0..=3` counted past 0xFFFF.
    TimerOverflow(usize),
}

#[derive(Debug, PartialEq, Eq)]
struct Event {
    due: u64,
    seq: u64,
    kind: EventKind,
}

// BinaryHeap is a max-heap: invert the (due, seq) ordering so the earliest
// event, and among equals the first scheduled, surfaces first.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct Scheduler {
    current: u64,
    next_seq: u64,
    queue: BinaryHeap<Event>,
}

impl Scheduler {
    /// Register `kind` to fire `cycles_from_now` cycles from the current one.
    pub fn schedule(&mut self, cycles_from_now: u64, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.queue.push(Event {
            due: self.current + cycles_from_now,
            seq,
            kind,
        });
    }

    /// Advance the cycle counter. Due events stay queued until the owner
    /// drains them with [`Self::pop_due`].
    pub fn tick(&mut self, cycles: u64) {
        self.current += cycles;
    }

    /// Remove and return the earliest event whose due cycle has been reached,
    /// together with that due cycle.
    pub fn pop_due(&mut self) -> Option<(EventKind, u64)> {
        if self.queue.peek()?.due > self.current {
            return None;
        }

        self.queue.pop().map(|event| (event.kind, event.due))
    }

    #[must_use]
    pub const fn current_cycle(&self) -> u64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(10, EventKind::LineEnd);
        scheduler.schedule(5, EventKind::HBlankStart);

        scheduler.tick(4);
        assert_eq!(scheduler.pop_due(), None);

        scheduler.tick(6);
        assert_eq!(scheduler.pop_due(), Some((EventKind::HBlankStart, 5)));
        assert_eq!(scheduler.pop_due(), Some((EventKind::LineEnd, 10)));
        assert_eq!(scheduler.pop_due(), None);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(5, EventKind::TimerOverflow(0));
        scheduler.schedule(10, EventKind::LineEnd);
        scheduler.schedule(5, EventKind::TimerOverflow(1));

        scheduler.tick(10);
        assert_eq!(scheduler.pop_due(), Some((EventKind::TimerOverflow(0), 5)));
        assert_eq!(scheduler.pop_due(), Some((EventKind::TimerOverflow(1), 5)));
        assert_eq!(scheduler.pop_due(), Some((EventKind::LineEnd, 10)));
    }

    #[test]
    fn events_scheduled_while_draining_are_seen() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(2, EventKind::HBlankStart);
        scheduler.tick(3);

        let (kind, due) = scheduler.pop_due().unwrap();
        assert_eq!((kind, due), (EventKind::HBlankStart, 2));

        // A handler re-arming itself inside the drain loop.
        scheduler.schedule(0, EventKind::LineEnd);
        assert_eq!(scheduler.pop_due(), Some((EventKind::LineEnd, 3)));
    }

    #[test]
    fn counter_is_monotonic() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.current_cycle(), 0);
        scheduler.tick(7);
        scheduler.tick(1);
        assert_eq!(scheduler.current_cycle(), 8);
    }
}
