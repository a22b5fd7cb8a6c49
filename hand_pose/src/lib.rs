//! # hand_pose
//!
//! Hand-pose samples and the per-hand cache that folds a tracking stream
//! into one stable entry per hand.
//!
//! A tracking provider reports each detected hand as a stream of
//! [`HandUpdate`]s:
//!
//! | Kind | Effect on the cache |
//! |---|---|
//! | `Added` | upsert the entry for `hand_id` |
//! | `Updated` | upsert the entry for `hand_id` |
//! | `Removed` | delete the entry for `hand_id` (absent is fine) |
//!
//! ```rust
//! use hand_pose::{HandId, HandPoseSample, HandPoseTracker, HandUpdateKind};
//! use glam::Vec3;
//! use std::time::Duration;
//!
//! let mut tracker = HandPoseTracker::new();
//! let a = HandId(1);
//! tracker.apply(HandUpdateKind::Added, HandPoseSample::at(a, Vec3::ZERO, Duration::ZERO));
//! tracker.apply(HandUpdateKind::Updated, HandPoseSample::at(a, Vec3::Z, Duration::from_millis(100)));
//! assert_eq!(tracker.len(), 1);
//! assert_eq!(tracker.get(a).unwrap().world_position, Vec3::Z);
//! ```

use std::fmt;
use std::time::Duration;

use glam::{Mat4, Vec3};

mod tracker;

pub use tracker::{ApplyOutcome, HandPoseTracker, HandSlot};

// ════════════════════════════════════════════════════════════════════════════
// HandId
// ════════════════════════════════════════════════════════════════════════════

/// Opaque, stable identity of a tracked hand.
///
/// Providers choose the value; the cache only compares them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandId(pub u64);

impl HandId {
    /// Identity used by providers that only distinguish handedness.
    pub const LEFT:  HandId = HandId(0);
    pub const RIGHT: HandId = HandId(1);
}

impl fmt::Display for HandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HandId::LEFT  => write!(f, "left"),
            HandId::RIGHT => write!(f, "right"),
            HandId(n)     => write!(f, "hand#{}", n),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandPoseSample
// ════════════════════════════════════════════════════════════════════════════

/// Latest known pose of one hand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandPoseSample {
    pub hand_id:        HandId,
    /// Origin-from-anchor transform reported by the provider.
    pub transform:      Mat4,
    /// Translation part of `transform`.
    pub world_position: Vec3,
    /// Time since the session epoch.
    pub timestamp:      Duration,
}

impl HandPoseSample {
    /// Build a sample from a full pose transform; the world position is the
    /// transform's translation column.
    pub fn from_transform(hand_id: HandId, transform: Mat4, timestamp: Duration) -> Self {
        HandPoseSample {
            hand_id,
            transform,
            world_position: transform.w_axis.truncate(),
            timestamp,
        }
    }

    /// Build a translation-only sample.
    pub fn at(hand_id: HandId, position: Vec3, timestamp: Duration) -> Self {
        Self::from_transform(hand_id, Mat4::from_translation(position), timestamp)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandUpdate
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandUpdateKind {
    Added,
    Updated,
    Removed,
}

/// One event from the tracking provider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandUpdate {
    pub kind:   HandUpdateKind,
    pub sample: HandPoseSample,
}

impl HandUpdate {
    pub fn added(sample: HandPoseSample) -> Self {
        HandUpdate { kind: HandUpdateKind::Added, sample }
    }
    pub fn updated(sample: HandPoseSample) -> Self {
        HandUpdate { kind: HandUpdateKind::Updated, sample }
    }
    pub fn removed(sample: HandPoseSample) -> Self {
        HandUpdate { kind: HandUpdateKind::Removed, sample }
    }

    pub fn hand_id(&self) -> HandId { self.sample.hand_id }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    #[test]
    fn world_position_is_translation_column() {
        let t = Mat4::from_rotation_translation(
            Quat::from_rotation_y(0.7),
            Vec3::new(0.2, 1.1, -0.4),
        );
        let s = HandPoseSample::from_transform(HandId(7), t, Duration::ZERO);
        assert_abs_diff_eq!(s.world_position.x,  0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(s.world_position.y,  1.1, epsilon = 1e-6);
        assert_abs_diff_eq!(s.world_position.z, -0.4, epsilon = 1e-6);
    }

    #[test]
    fn handedness_ids_display() {
        assert_eq!(HandId::LEFT.to_string(), "left");
        assert_eq!(HandId::RIGHT.to_string(), "right");
        assert_eq!(HandId(42).to_string(), "hand#42");
    }
}
