//! The per-hand pose cache.
//!
//! Entries are kept in first-seen order.  A hand that is removed and later
//! added again goes to the back, so the order is deterministic for any given
//! event sequence.

use tracing::debug;

use crate::{HandId, HandPoseSample, HandUpdate, HandUpdateKind};

/// What [`HandPoseTracker::apply`] did to the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new entry was appended.
    Inserted,
    /// An existing entry was overwritten (this includes a duplicate `Added`).
    Replaced,
    /// The entry was deleted.
    Removed,
    /// `Removed` for a hand that was not cached.
    Absent,
}

/// One indicator slot in a per-tick snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HandSlot {
    Visible(HandPoseSample),
    Hidden,
}

impl HandSlot {
    pub fn is_visible(&self) -> bool { matches!(self, HandSlot::Visible(_)) }

    pub fn sample(&self) -> Option<&HandPoseSample> {
        match self {
            HandSlot::Visible(s) => Some(s),
            HandSlot::Hidden     => None,
        }
    }
}

/// Stable `HandId → latest sample` cache.
#[derive(Debug, Default, Clone)]
pub struct HandPoseTracker {
    entries: Vec<HandPoseSample>,
}

impl HandPoseTracker {
    pub fn new() -> Self { Self::default() }

    /// Fold one event into the cache.
    ///
    /// `Added` and `Updated` both upsert; `Removed` deletes the entry if
    /// present.  None of the cases is an error.
    pub fn apply(&mut self, kind: HandUpdateKind, sample: HandPoseSample) -> ApplyOutcome {
        let idx = self.position(sample.hand_id);
        match (kind, idx) {
            (HandUpdateKind::Added | HandUpdateKind::Updated, Some(i)) => {
                self.entries[i] = sample;
                ApplyOutcome::Replaced
            }
            (HandUpdateKind::Added | HandUpdateKind::Updated, None) => {
                debug!(hand = %sample.hand_id, "hand entered cache");
                self.entries.push(sample);
                ApplyOutcome::Inserted
            }
            (HandUpdateKind::Removed, Some(i)) => {
                debug!(hand = %sample.hand_id, "hand left cache");
                self.entries.remove(i);
                ApplyOutcome::Removed
            }
            (HandUpdateKind::Removed, None) => ApplyOutcome::Absent,
        }
    }

    pub fn apply_update(&mut self, update: &HandUpdate) -> ApplyOutcome {
        self.apply(update.kind, update.sample)
    }

    /// The first `max_count` entries in cache order.  Fewer is valid.
    pub fn snapshot(&self, max_count: usize) -> Vec<HandPoseSample> {
        self.entries.iter().take(max_count).copied().collect()
    }

    /// Exactly `count` slots for indicator placement: cached hands first,
    /// the remainder [`HandSlot::Hidden`].
    pub fn slots(&self, count: usize) -> Vec<HandSlot> {
        let mut out: Vec<HandSlot> = self.entries.iter()
            .take(count)
            .map(|s| HandSlot::Visible(*s))
            .collect();
        out.resize(count, HandSlot::Hidden);
        out
    }

    pub fn get(&self, id: HandId) -> Option<&HandPoseSample> {
        self.entries.iter().find(|s| s.hand_id == id)
    }

    pub fn contains(&self, id: HandId) -> bool { self.position(id).is_some() }
    pub fn len(&self)      -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool  { self.entries.is_empty() }

    pub fn clear(&mut self) { self.entries.clear(); }

    fn position(&self, id: HandId) -> Option<usize> {
        self.entries.iter().position(|s| s.hand_id == id)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::collections::HashSet;
    use std::time::Duration;

    fn sample(id: u64, x: f32, ms: u64) -> HandPoseSample {
        HandPoseSample::at(HandId(id), Vec3::new(x, 0.0, 0.0), Duration::from_millis(ms))
    }

    #[test]
    fn added_then_updated_keeps_one_entry() {
        let mut t = HandPoseTracker::new();
        assert_eq!(t.apply(HandUpdateKind::Added,   sample(1, 0.0, 0)),   ApplyOutcome::Inserted);
        assert_eq!(t.apply(HandUpdateKind::Updated, sample(1, 0.5, 10)),  ApplyOutcome::Replaced);
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(HandId(1)).unwrap().world_position.x, 0.5);
    }

    #[test]
    fn duplicate_added_is_an_upsert() {
        let mut t = HandPoseTracker::new();
        t.apply(HandUpdateKind::Added, sample(3, 0.0, 0));
        assert_eq!(t.apply(HandUpdateKind::Added, sample(3, 1.0, 5)), ApplyOutcome::Replaced);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn update_for_unseen_hand_inserts() {
        let mut t = HandPoseTracker::new();
        assert_eq!(t.apply(HandUpdateKind::Updated, sample(9, 0.0, 0)), ApplyOutcome::Inserted);
        assert!(t.contains(HandId(9)));
    }

    #[test]
    fn removed_absent_is_not_an_error() {
        let mut t = HandPoseTracker::new();
        t.apply(HandUpdateKind::Added, sample(1, 0.0, 0));
        assert_eq!(t.apply(HandUpdateKind::Removed, sample(2, 0.0, 0)), ApplyOutcome::Absent);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn snapshot_is_capped_and_ordered() {
        let mut t = HandPoseTracker::new();
        for id in [5, 2, 8] {
            t.apply(HandUpdateKind::Added, sample(id, id as f32, 0));
        }
        let snap = t.snapshot(2);
        let ids: Vec<_> = snap.iter().map(|s| s.hand_id).collect();
        assert_eq!(ids, vec![HandId(5), HandId(2)]);
        // Updating does not reorder.
        t.apply(HandUpdateKind::Updated, sample(5, 9.0, 1));
        assert_eq!(t.snapshot(1)[0].hand_id, HandId(5));
    }

    #[test]
    fn readded_hand_moves_to_back() {
        let mut t = HandPoseTracker::new();
        t.apply(HandUpdateKind::Added,   sample(1, 0.0, 0));
        t.apply(HandUpdateKind::Added,   sample(2, 0.0, 0));
        t.apply(HandUpdateKind::Removed, sample(1, 0.0, 1));
        t.apply(HandUpdateKind::Added,   sample(1, 0.0, 2));
        let ids: Vec<_> = t.snapshot(4).iter().map(|s| s.hand_id).collect();
        assert_eq!(ids, vec![HandId(2), HandId(1)]);
    }

    #[test]
    fn slots_hide_unseen_hands() {
        let mut t = HandPoseTracker::new();
        t.apply(HandUpdateKind::Added, sample(1, 0.3, 0));
        let slots = t.slots(2);
        assert_eq!(slots.len(), 2);
        assert!(slots[0].is_visible());
        assert_eq!(slots[1], HandSlot::Hidden);
        assert!(slots[1].sample().is_none());
    }

    /// Pseudo-random interleavings over a handful of ids: the cache never
    /// duplicates an id and a `Removed` always leaves that id absent.
    #[test]
    fn invariants_hold_under_interleaving() {
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _round in 0..50 {
            let mut t = HandPoseTracker::new();
            for step in 0..200u64 {
                let id = next() % 5;
                let kind = match next() % 3 {
                    0 => HandUpdateKind::Added,
                    1 => HandUpdateKind::Updated,
                    _ => HandUpdateKind::Removed,
                };
                t.apply(kind, sample(id, step as f32, step));

                let ids: Vec<_> = t.snapshot(usize::MAX).iter().map(|s| s.hand_id).collect();
                let unique: HashSet<_> = ids.iter().copied().collect();
                assert_eq!(ids.len(), unique.len(), "duplicate id after step {}", step);

                if kind == HandUpdateKind::Removed {
                    assert!(!t.contains(HandId(id)), "id {} survived removal", id);
                } else {
                    assert_eq!(t.get(HandId(id)).unwrap().timestamp, Duration::from_millis(step));
                }
            }
        }
    }
}
