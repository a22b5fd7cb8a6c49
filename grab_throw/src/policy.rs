//! Speed threshold that decides when a held object is thrown.
//!
//! The policy is edge-triggered: it fires at most once per armed lifecycle.
//! Two independent conditions keep it from firing again:
//!
//! * the object must still be attached (the caller passes this in), and
//! * the policy's own latch, which is set when it fires and cleared only by
//!   [`ReleaseDecisionPolicy::rearm`].
//!
//! An optional cooldown suppresses triggers for a fixed window after re-arm.

use std::time::Duration;

use glam::Vec3;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ReleaseDecisionPolicy {
    threshold: f32,
    cooldown:  Duration,
    armed_at:  Duration,
    latched:   bool,
}

impl ReleaseDecisionPolicy {
    pub const DEFAULT_THRESHOLD: f32 = 2.5;

    pub fn new(threshold: f32) -> Self {
        ReleaseDecisionPolicy {
            threshold,
            cooldown: Duration::ZERO,
            armed_at: Duration::ZERO,
            latched:  false,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Evaluate a freshly computed velocity.  Returns `true` exactly when the
    /// caller should release now.
    pub fn evaluate(&mut self, velocity: Vec3, attached: bool, now: Duration) -> bool {
        if !attached || self.latched {
            return false;
        }
        let speed = velocity.length();
        if speed <= self.threshold {
            return false;
        }
        if now < self.armed_at + self.cooldown {
            debug!(speed, "release suppressed by cooldown");
            return false;
        }
        self.latched = true;
        debug!(speed, threshold = self.threshold, "release threshold crossed");
        true
    }

    /// Start a new lifecycle at `now`.
    pub fn rearm(&mut self, now: Duration) {
        self.latched  = false;
        self.armed_at = now;
    }

    pub fn threshold(&self) -> f32 { self.threshold }
    pub fn is_latched(&self) -> bool { self.latched }
}

impl Default for ReleaseDecisionPolicy {
    fn default() -> Self { Self::new(Self::DEFAULT_THRESHOLD) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Duration = Duration::ZERO;

    #[test]
    fn fires_once_above_threshold() {
        let mut p = ReleaseDecisionPolicy::default();
        assert!(p.evaluate(Vec3::new(0.0, 0.0, 10.0), true, T0));
        assert!(!p.evaluate(Vec3::new(0.0, 0.0, 20.0), true, T0));
        assert!(p.is_latched());
    }

    #[test]
    fn threshold_is_strict() {
        let mut p = ReleaseDecisionPolicy::new(2.5);
        assert!(!p.evaluate(Vec3::new(2.5, 0.0, 0.0), true, T0));
        assert!(p.evaluate(Vec3::new(2.51, 0.0, 0.0), true, T0));
    }

    #[test]
    fn never_fires_when_free() {
        let mut p = ReleaseDecisionPolicy::default();
        assert!(!p.evaluate(Vec3::splat(100.0), false, T0));
        assert!(!p.is_latched());
    }

    #[test]
    fn rearm_clears_latch() {
        let mut p = ReleaseDecisionPolicy::default();
        assert!(p.evaluate(Vec3::X * 5.0, true, T0));
        p.rearm(Duration::from_secs(1));
        assert!(!p.evaluate(Vec3::X * 0.5, true, Duration::from_secs(1)));
        assert!(p.evaluate(Vec3::X * 5.0, true, Duration::from_secs(1)));
    }

    #[test]
    fn cooldown_window_after_rearm() {
        let mut p = ReleaseDecisionPolicy::default().with_cooldown(Duration::from_millis(200));
        p.rearm(Duration::from_millis(1000));
        assert!(!p.evaluate(Vec3::X * 5.0, true, Duration::from_millis(1100)));
        assert!(!p.is_latched());
        assert!(p.evaluate(Vec3::X * 5.0, true, Duration::from_millis(1200)));
    }
}
