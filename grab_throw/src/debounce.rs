//! One timer per kind, last writer wins.
//!
//! [`EventDebouncer::start`] publishes a value for a kind immediately and
//! (re)arms that kind's timer.  Expiry is driven by [`EventDebouncer::poll`]
//! from the owner's update loop, so a firing timer always runs on the same
//! path that owns the state it clears.
//!
//! Deadlines sit in a min-heap.  Restarting a kind does not dig the old entry
//! out of the heap; the old entry simply carries a stale generation and is
//! skipped when it surfaces.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use tracing::debug;

/// The live timer of one kind.  A timer exists only while live; expiry and
/// cancellation remove it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedbackTimer<K> {
    pub kind:       K,
    pub deadline:   Duration,
    pub generation: u64,
}

#[derive(Debug)]
struct Slot<K, V> {
    value: V,
    timer: FeedbackTimer<K>,
}

#[derive(Debug)]
pub struct EventDebouncer<K, V> {
    slots:           HashMap<K, Slot<K, V>>,
    queue:           BinaryHeap<Reverse<(Duration, u64, K)>>,
    next_generation: u64,
    torn_down:       bool,
}

impl<K, V> Default for EventDebouncer<K, V> {
    fn default() -> Self {
        EventDebouncer {
            slots:           HashMap::new(),
            queue:           BinaryHeap::new(),
            next_generation: 0,
            torn_down:       false,
        }
    }
}

impl<K, V> EventDebouncer<K, V>
where
    K: Copy + Eq + Hash + Ord + std::fmt::Debug,
{
    pub fn new() -> Self { Self::default() }

    /// Publish `value` for `kind` now and clear it `duration` later.  A live
    /// timer of the same kind is cancelled first.
    ///
    /// Returns `false` (and does nothing) after [`teardown`](Self::teardown).
    pub fn start(&mut self, kind: K, value: V, duration: Duration, now: Duration) -> bool {
        if self.torn_down {
            return false;
        }
        if self.slots.contains_key(&kind) {
            debug!(?kind, "debounce restarted");
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        let deadline = now + duration;
        let timer = FeedbackTimer { kind, deadline, generation };
        // Replacing the slot invalidates the previous generation.
        self.slots.insert(kind, Slot { value, timer });
        self.queue.push(Reverse((deadline, generation, kind)));
        true
    }

    /// Clear `kind` without waiting for its deadline.
    pub fn cancel(&mut self, kind: K) -> Option<V> {
        self.slots.remove(&kind).map(|s| s.value)
    }

    /// Fire every timer whose deadline is `<= now`.  Returns the kinds that
    /// were cleared, in deadline order.
    pub fn poll(&mut self, now: Duration) -> Vec<K> {
        let mut expired = Vec::new();
        while let Some(Reverse((deadline, generation, kind))) = self.queue.peek().copied() {
            if deadline > now {
                break;
            }
            self.queue.pop();
            let current = self.slots.get(&kind)
                .is_some_and(|s| s.timer.generation == generation);
            if current {
                self.slots.remove(&kind);
                expired.push(kind);
            }
        }
        expired
    }

    /// The value currently published for `kind`, if its timer is live.
    pub fn current(&self, kind: K) -> Option<&V> {
        self.slots.get(&kind).map(|s| &s.value)
    }

    pub fn is_live(&self, kind: K) -> bool { self.slots.contains_key(&kind) }

    pub fn timer(&self, kind: K) -> Option<FeedbackTimer<K>> {
        self.slots.get(&kind).map(|s| s.timer)
    }

    /// Earliest pending deadline among live timers.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.slots.values().map(|s| s.timer.deadline).min()
    }

    /// Invalidate every timer and refuse new ones.
    pub fn teardown(&mut self) {
        self.slots.clear();
        self.queue.clear();
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool { self.torn_down }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
