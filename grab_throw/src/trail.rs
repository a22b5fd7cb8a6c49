//! Trailing markers left behind a thrown object.
//!
//! While the effect runs, a marker is dropped at the object's position every
//! `interval`.  Each marker fades and expires on its own clock; clearing the
//! effect removes every marker at once.

use std::time::Duration;

use glam::Vec3;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailMarker {
    pub position:   Vec3,
    pub spawned_at: Duration,
    pub expires_at: Duration,
}

impl TrailMarker {
    /// Linear fade from 1.0 at spawn to 0.0 at expiry.
    pub fn opacity(&self, now: Duration) -> f32 {
        if now >= self.expires_at {
            return 0.0;
        }
        let life = (self.expires_at - self.spawned_at).as_secs_f32();
        if life <= 0.0 {
            return 0.0;
        }
        let left = (self.expires_at - now.max(self.spawned_at)).as_secs_f32();
        (left / life).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Debug)]
pub struct TrailEffect {
    interval:   Duration,
    lifespan:   Duration,
    next_spawn: Duration,
    markers:    Vec<TrailMarker>,
    spawned:    u64,
}

impl TrailEffect {
    /// Start an effect; the first marker drops on the first tick at or after
    /// `now`.
    pub fn start(now: Duration, interval: Duration, lifespan: Duration) -> Self {
        TrailEffect {
            interval: interval.max(Duration::from_millis(1)),
            lifespan,
            next_spawn: now,
            markers: Vec::new(),
            spawned: 0,
        }
    }

    /// Expire old markers and drop any that are due at `position`.  Returns
    /// the number of markers spawned.
    pub fn tick(&mut self, now: Duration, position: Vec3) -> usize {
        self.markers.retain(|m| m.expires_at > now);

        // After a stall, jump to the first slot whose marker would still be
        // alive at `now`.
        if self.next_spawn + self.lifespan <= now {
            let behind = now - self.lifespan - self.next_spawn;
            let steps = behind.as_nanos() / self.interval.as_nanos() + 1;
            let skip = u64::try_from(steps * self.interval.as_nanos()).unwrap_or(u64::MAX);
            self.next_spawn = self.next_spawn.saturating_add(Duration::from_nanos(skip));
        }

        let mut spawned = 0;
        while self.next_spawn <= now {
            let at = self.next_spawn;
            self.next_spawn += self.interval;
            self.markers.push(TrailMarker {
                position,
                spawned_at: at,
                expires_at: at + self.lifespan,
            });
            spawned += 1;
        }
        self.spawned += spawned as u64;
        if spawned > 0 {
            debug!(live = self.markers.len(), "trail marker spawned");
        }
        spawned
    }

    /// Stop and remove every marker immediately.
    pub fn clear(&mut self) {
        self.markers.clear();
    }

    pub fn markers(&self) -> &[TrailMarker] { &self.markers }
    pub fn total_spawned(&self) -> u64 { self.spawned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn effect() -> TrailEffect { TrailEffect::start(ms(1000), ms(50), ms(400)) }

    #[test]
    fn spawns_on_interval() {
        let mut t = effect();
        assert_eq!(t.tick(ms(1000), Vec3::ZERO), 1);
        assert_eq!(t.tick(ms(1020), Vec3::X), 0);
        assert_eq!(t.tick(ms(1050), Vec3::X), 1);
        assert_eq!(t.tick(ms(1160), Vec3::Y), 2);
        assert_eq!(t.markers().len(), 4);
        assert_eq!(t.markers()[3].position, Vec3::Y);
    }

    #[test]
    fn markers_expire_independently() {
        let mut t = effect();
        t.tick(ms(1000), Vec3::ZERO);
        t.tick(ms(1200), Vec3::ZERO);
        assert_eq!(t.markers().len(), 5);
        // The first marker (spawned at 1000) is gone at 1400, later ones stay.
        t.tick(ms(1400), Vec3::ZERO);
        assert!(t.markers().iter().all(|m| m.spawned_at > ms(1000)));
    }

    #[test]
    fn stall_skips_dead_markers() {
        let mut t = effect();
        let n = t.tick(ms(11_000), Vec3::ZERO);
        // Only markers young enough to still be alive are created.
        assert_eq!(n, 8);
        assert!(t.markers().iter().all(|m| m.expires_at > ms(11_000)));
    }

    #[test]
    fn long_stall_jumps_straight_to_live_slots() {
        let mut t = TrailEffect::start(ms(0), ms(1), ms(400));
        assert_eq!(t.tick(ms(0), Vec3::ZERO), 1);

        let six_hours = Duration::from_secs(6 * 60 * 60);
        assert_eq!(t.tick(six_hours, Vec3::X), 400);
        assert_eq!(t.markers().len(), 400);
        assert_eq!(t.markers()[0].spawned_at, six_hours - ms(399));
        assert_eq!(t.total_spawned(), 401);

        // Back on the regular cadence afterwards.
        assert_eq!(t.tick(six_hours + ms(1), Vec3::X), 1);
    }

    #[test]
    fn opacity_fades_linearly() {
        let m = TrailMarker { position: Vec3::ZERO, spawned_at: ms(0), expires_at: ms(400) };
        assert_relative_eq!(m.opacity(ms(0)), 1.0);
        assert_relative_eq!(m.opacity(ms(100)), 0.75, epsilon = 1e-5);
        assert_relative_eq!(m.opacity(ms(400)), 0.0);
    }

    #[test]
    fn clear_is_immediate() {
        let mut t = effect();
        t.tick(ms(1100), Vec3::ZERO);
        assert!(!t.markers().is_empty());
        t.clear();
        assert!(t.markers().is_empty());
        assert_eq!(t.total_spawned(), 3);
    }
}
