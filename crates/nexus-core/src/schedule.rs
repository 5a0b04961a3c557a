//! Cancellable timers over an explicit clock.
//!
//! All time here is a `Duration` measured from the owner's origin (console
//! start). Nothing sleeps; the owner polls with the current time and acts on
//! whatever came due.

use std::time::Duration;

/// A single-shot timer slot. Scheduling again supersedes the pending deadline,
/// so at most one deadline of this kind is ever live.
#[derive(Debug, Default)]
pub struct Deadline {
    pending: Option<Pending>,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    generation: u64,
    due: Duration,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot for `now + delay`, cancelling whatever was pending.
    /// Returns the generation of the new deadline.
    pub fn schedule(&mut self, now: Duration, delay: Duration) -> u64 {
        self.generation += 1;
        self.pending = Some(Pending {
            generation: self.generation,
            due: now + delay,
        });
        self.generation
    }

    /// Returns true if a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due(&self) -> Option<Duration> {
        self.pending.map(|p| p.due)
    }

    /// Generation of the most recently scheduled deadline.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fire the deadline if it is due. Returns its generation exactly once.
    pub fn fire(&mut self, now: Duration) -> Option<u64> {
        match self.pending {
            Some(p) if now >= p.due => {
                self.pending = None;
                Some(p.generation)
            }
            _ => None,
        }
    }
}

/// Many independent one-shot timers carrying a payload.
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: Vec<Entry<T>>,
    seq: u64,
}

#[derive(Debug)]
struct Entry<T> {
    due: Duration,
    seq: u64,
    item: T,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due: Duration, item: T) {
        self.seq += 1;
        let entry = Entry {
            due,
            seq: self.seq,
            item,
        };
        // keep sorted by (due, seq) so equal deadlines fire in push order
        let at = self
            .entries
            .partition_point(|e| (e.due, e.seq) <= (entry.due, entry.seq));
        self.entries.insert(at, entry);
    }

    /// Remove and return every item due at `now`, earliest first.
    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let split = self.entries.partition_point(|e| e.due <= now);
        self.entries.drain(..split).map(|e| e.item).collect()
    }

    /// Remove and return everything regardless of deadline.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.entries.drain(..).map(|e| e.item).collect()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.entries.first().map(|e| e.due)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
