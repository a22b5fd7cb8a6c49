//! Finite-difference velocity from drag-gesture samples.

use std::time::Duration;

use glam::Vec3;
use tracing::debug;

/// One drag-gesture sample in scene coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragSample {
    pub position:  Vec3,
    pub timestamp: Duration,
}

impl DragSample {
    pub fn new(position: Vec3, timestamp: Duration) -> Self {
        DragSample { position, timestamp }
    }
}

/// Result of feeding one sample to [`GestureVelocityEstimator::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    /// First sample of a gesture; recorded, nothing to difference against.
    Primed,
    /// A new velocity was computed.
    Recomputed(Vec3),
    /// `dt <= 0`: the sample was dropped and no state changed.
    Discarded,
}

/// Tracks the last sample of the gesture in progress and the last computed
/// velocity.
///
/// [`end_gesture`](Self::end_gesture) forgets the last sample only; the
/// velocity stays readable until the next recompute or
/// [`reset`](Self::reset).
#[derive(Clone, Debug, Default)]
pub struct GestureVelocityEstimator {
    last_position:  Option<Vec3>,
    last_timestamp: Option<Duration>,
    velocity:       Option<Vec3>,
}

impl GestureVelocityEstimator {
    pub fn new() -> Self { Self::default() }

    pub fn observe(&mut self, sample: DragSample) -> Observation {
        let (last_pos, last_t) = match (self.last_position, self.last_timestamp) {
            (Some(p), Some(t)) => (p, t),
            _ => {
                self.record(sample);
                return Observation::Primed;
            }
        };

        // Duplicate or out-of-order timestamp.
        if sample.timestamp <= last_t {
            debug!(
                ts_ms = sample.timestamp.as_millis() as u64,
                last_ms = last_t.as_millis() as u64,
                "drag sample discarded"
            );
            return Observation::Discarded;
        }

        let dt = (sample.timestamp - last_t).as_secs_f32();
        let v = (sample.position - last_pos) / dt;
        self.velocity = Some(v);
        self.record(sample);
        debug!(speed = v.length(), dt, "velocity recomputed");
        Observation::Recomputed(v)
    }

    /// Gesture ended: forget the last sample, keep the velocity.
    pub fn end_gesture(&mut self) {
        self.last_position  = None;
        self.last_timestamp = None;
    }

    /// Forget everything, including the velocity.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn velocity(&self) -> Option<Vec3> { self.velocity }

    pub fn speed(&self) -> f32 {
        self.velocity.map(|v| v.length()).unwrap_or(0.0)
    }

    pub fn in_gesture(&self) -> bool { self.last_timestamp.is_some() }

    fn record(&mut self, sample: DragSample) {
        self.last_position  = Some(sample.position);
        self.last_timestamp = Some(sample.timestamp);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
