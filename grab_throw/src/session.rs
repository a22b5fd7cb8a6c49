//! The session context: everything on the single per-tick update path.
//!
//! A [`ThrowSession`] is owned by whoever runs the update loop.  Hand
//! updates arriving from another thread are queued by the caller and fed in
//! arrival order through [`ThrowSession::apply_hand_update`]; nothing here
//! locks or blocks.  Renderers read state back through the accessors and
//! [`ThrowSession::drain_transitions`].

use std::time::Duration;

use glam::Vec3;
use hand_pose::{ApplyOutcome, HandPoseTracker, HandSlot, HandUpdate};
use tracing::{info, warn};

use crate::attachment::{
    AttachmentTransition, ManipulatedObject, ObjectAttachmentStateMachine, ObjectId, ReleaseOutcome,
};
use crate::config::ThrowConfig;
use crate::debounce::EventDebouncer;
use crate::error::{ConfigError, TrackingError};
use crate::feedback::{AppEvent, AuthorizationState, FeedbackKind};
use crate::policy::ReleaseDecisionPolicy;
use crate::velocity::{DragSample, GestureVelocityEstimator, Observation};

#[derive(Debug)]
pub struct ThrowSession {
    config:        ThrowConfig,
    authorization: AuthorizationState,
    hands:         HandPoseTracker,
    estimator:     GestureVelocityEstimator,
    policy:        ReleaseDecisionPolicy,
    machine:       ObjectAttachmentStateMachine,
    feedback:      EventDebouncer<FeedbackKind, AppEvent>,
    torn_down:     bool,
}

impl ThrowSession {
    pub fn new(config: ThrowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = ReleaseDecisionPolicy::new(config.release_threshold)
            .with_cooldown(config.release_cooldown());
        let machine = ObjectAttachmentStateMachine::new(&config);
        Ok(ThrowSession {
            config,
            authorization: AuthorizationState::NotDetermined,
            hands:         HandPoseTracker::new(),
            estimator:     GestureVelocityEstimator::new(),
            policy,
            machine,
            feedback:      EventDebouncer::new(),
            torn_down:     false,
        })
    }

    // ── tracking session status ──────────────────────────────────────────

    /// The provider is running; hand updates are accepted from now on.
    pub fn tracking_started(&mut self, now: Duration) {
        if self.torn_down || self.authorization == AuthorizationState::Denied {
            return;
        }
        self.authorization = AuthorizationState::Authorized;
        info!("hand tracking started");
        self.publish(AppEvent::TrackingStarted, now);
    }

    /// Terminal failure.  Reported once; later failures are ignored.
    pub fn tracking_failed(&mut self, error: &TrackingError, now: Duration) {
        if self.torn_down || self.authorization == AuthorizationState::Denied {
            return;
        }
        self.authorization = AuthorizationState::Denied;
        warn!(%error, "hand tracking failed");
        self.publish(AppEvent::TrackingFailed(error.reason().to_string()), now);
    }

    // ── inputs ────────────────────────────────────────────────────────────

    /// Fold one hand update into the cache.  `None` when updates are not
    /// being consumed (not authorized, or torn down).
    pub fn apply_hand_update(&mut self, update: &HandUpdate) -> Option<ApplyOutcome> {
        if self.torn_down || self.authorization != AuthorizationState::Authorized {
            return None;
        }
        Some(self.hands.apply_update(update))
    }

    /// Feed a drag-gesture sample.  Returns the release outcome when this
    /// sample triggered a release.
    pub fn drag_changed(&mut self, sample: DragSample) -> Option<ReleaseOutcome> {
        if self.torn_down {
            return None;
        }
        let Observation::Recomputed(velocity) = self.estimator.observe(sample) else {
            return None;
        };
        if !self.policy.evaluate(velocity, self.machine.is_attached(), sample.timestamp) {
            return None;
        }
        Some(self.machine.release(Some(velocity), sample.timestamp))
    }

    pub fn drag_ended(&mut self) {
        self.estimator.end_gesture();
    }

    /// Replace the object with a fresh attached one and forget any velocity
    /// from the previous lifecycle.
    pub fn rearm(&mut self, now: Duration) -> Option<ObjectId> {
        if self.torn_down {
            return None;
        }
        let hand_pose = self.hands.get(self.config.attach_hand()).map(|s| s.transform);
        let id = self.machine.rearm(hand_pose);
        self.estimator.reset();
        self.policy.rearm(now);
        Some(id)
    }

    /// A tap on the target: both flashes, then the status line.
    pub fn tap(&mut self, now: Duration) {
        if self.torn_down {
            return;
        }
        self.feedback.start(FeedbackKind::TapFlash, AppEvent::TapDetected, self.config.tap_flash(), now);
        self.publish(AppEvent::TapDetected, now);
        self.collision(now);
    }

    pub fn collision(&mut self, now: Duration) {
        if self.torn_down {
            return;
        }
        self.feedback.start(
            FeedbackKind::CollisionFlash,
            AppEvent::CollisionDetected,
            self.config.collision_flash(),
            now,
        );
        self.publish(AppEvent::CollisionDetected, now);
    }

    /// Simulated pose of a free object, from the physics collaborator.
    pub fn sync_simulated(&mut self, world_position: Vec3, linear_velocity: Vec3) {
        self.machine.sync_simulated(world_position, linear_velocity);
    }

    // ── per-tick ──────────────────────────────────────────────────────────

    /// Advance time-driven state.  Returns the feedback kinds cleared.
    pub fn tick(&mut self, now: Duration) -> Vec<FeedbackKind> {
        if self.torn_down {
            return Vec::new();
        }
        self.machine.follow(&self.hands);
        self.machine.tick(now);
        self.feedback.poll(now)
    }

    /// Stop everything.  Timers are invalidated and further input is
    /// ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.feedback.teardown();
        self.machine.teardown();
        self.hands.clear();
        self.estimator.reset();
        self.torn_down = true;
        info!("session torn down");
    }

    // ── outputs ───────────────────────────────────────────────────────────

    pub fn authorization(&self) -> AuthorizationState { self.authorization }
    pub fn hands(&self) -> &HandPoseTracker { &self.hands }

    /// Indicator slots for this tick, capped by `visible_hands`.
    pub fn visible_hands(&self) -> Vec<HandSlot> {
        self.hands.slots(self.config.visible_hands)
    }

    pub fn object(&self) -> Option<&ManipulatedObject> { self.machine.object() }
    pub fn velocity(&self) -> Option<Vec3> { self.estimator.velocity() }

    pub fn drain_transitions(&mut self) -> Vec<AttachmentTransition> {
        self.machine.drain_transitions()
    }

    pub fn status(&self) -> Option<&AppEvent> {
        self.feedback.current(FeedbackKind::StatusMessage)
    }

    pub fn tap_flash(&self)    -> bool { self.feedback.is_live(FeedbackKind::TapFlash) }
    pub fn is_colliding(&self) -> bool { self.feedback.is_live(FeedbackKind::CollisionFlash) }
    pub fn is_torn_down(&self) -> bool { self.torn_down }
    pub fn config(&self) -> &ThrowConfig { &self.config }

    fn publish(&mut self, event: AppEvent, now: Duration) {
        let hold = self.config.status_message();
        self.feedback.start(FeedbackKind::StatusMessage, event, hold, now);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hand_pose::{HandId, HandPoseSample};

    use crate::attachment::PhysicsMode;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn drag(x: f32, y: f32, z: f32, at_ms: u64) -> DragSample {
        DragSample::new(Vec3::new(x, y, z), ms(at_ms))
    }

    fn live_session() -> ThrowSession {
        let mut s = ThrowSession::new(ThrowConfig::default()).unwrap();
        s.tracking_started(ms(0));
        s.rearm(ms(0));
        s.drain_transitions();
        s
    }

    fn released(out: Option<ReleaseOutcome>) -> bool {
        matches!(out, Some(ReleaseOutcome::Released { .. }))
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = ThrowConfig { launch_multiplier: -1.0, ..ThrowConfig::default() };
        assert!(ThrowSession::new(cfg).is_err());
    }

    #[test]
    fn fast_drag_releases_exactly_once() {
        let mut s = live_session();
        assert_eq!(s.drag_changed(drag(0.0, 0.0, 0.0, 0)), None);
        let out = s.drag_changed(drag(0.0, 0.0, 1.0, 100));
        let Some(ReleaseOutcome::Released { launch_velocity, .. }) = out else {
            panic!("expected a release, got {:?}", out);
        };
        assert_relative_eq!(launch_velocity.z, 15.0, epsilon = 1e-3);
        assert_relative_eq!(s.velocity().unwrap().z, 10.0, epsilon = 1e-3);

        // Same gesture keeps going: nothing more happens.
        assert_eq!(s.drag_changed(drag(0.0, 0.0, 3.0, 200)), None);
        assert_eq!(s.drag_changed(drag(0.0, 0.0, 9.0, 300)), None);
        let transitions = s.drain_transitions();
        assert_eq!(transitions.len(), 1);
        assert!(matches!(transitions[0], AttachmentTransition::Released { .. }));
        assert_eq!(s.object().unwrap().physics_mode(), PhysicsMode::Dynamic);
    }

    #[test]
    fn slow_drag_keeps_object_attached() {
        let mut s = live_session();
        for i in 0..20u64 {
            assert_eq!(s.drag_changed(drag(i as f32 * 0.01, 0.0, 0.0, i * 16)), None);
        }
        assert!(s.object().unwrap().is_attached());
    }

    #[test]
    fn equal_timestamps_do_not_disturb_velocity() {
        let mut s = live_session();
        s.drag_changed(drag(0.0, 0.0, 0.0, 0));
        s.drag_changed(drag(0.1, 0.0, 0.0, 100));
        let v = s.velocity();
        assert_eq!(s.drag_changed(drag(50.0, 0.0, 0.0, 100)), None);
        assert_eq!(s.velocity(), v);
        assert!(s.object().unwrap().is_attached());
    }

    #[test]
    fn rearm_after_release_ignores_stale_velocity() {
        let mut s = live_session();
        s.drag_changed(drag(0.0, 0.0, 0.0, 0));
        assert!(released(s.drag_changed(drag(0.0, 0.0, 1.0, 100))));

        s.rearm(ms(120));
        assert!(s.object().unwrap().is_attached());
        assert_eq!(s.velocity(), None);

        // The gesture is still in flight; the first post-rearm sample only primes.
        assert_eq!(s.drag_changed(drag(0.0, 0.0, 1.01, 140)), None);
        assert_eq!(s.drag_changed(drag(0.0, 0.0, 1.02, 160)), None);
        assert!(s.object().unwrap().is_attached());
    }

    #[test]
    fn drag_end_then_new_gesture_does_not_difference_across_gap() {
        let mut s = live_session();
        s.drag_changed(drag(0.0, 0.0, 0.0, 0));
        s.drag_ended();
        // Far away, a moment later: would be a huge velocity if differenced.
        assert_eq!(s.drag_changed(drag(5.0, 0.0, 0.0, 10)), None);
        assert!(s.object().unwrap().is_attached());
    }

    #[test]
    fn hand_updates_require_authorization() {
        let mut s = ThrowSession::new(ThrowConfig::default()).unwrap();
        let u = HandUpdate::added(HandPoseSample::at(HandId::LEFT, Vec3::ZERO, ms(0)));
        assert_eq!(s.apply_hand_update(&u), None);
        s.tracking_started(ms(0));
        assert_eq!(s.apply_hand_update(&u), Some(ApplyOutcome::Inserted));
        assert_eq!(s.authorization(), AuthorizationState::Authorized);
        assert_eq!(s.status(), Some(&AppEvent::TrackingStarted));
    }

    #[test]
    fn failure_denies_and_reports_once() {
        let mut s = ThrowSession::new(ThrowConfig::default()).unwrap();
        s.tracking_started(ms(0));
        s.tracking_failed(&TrackingError::Stream("provider stopped".into()), ms(10));
        assert_eq!(s.authorization(), AuthorizationState::Denied);
        assert_eq!(
            s.status(),
            Some(&AppEvent::TrackingFailed("provider stopped".into()))
        );
        assert_eq!(
            s.status().map(AppEvent::message).as_deref(),
            Some("Hand Tracking Failed: provider stopped")
        );
        // Not re-reported, and tracking can't come back by itself.
        s.tracking_failed(&TrackingError::Stream("again".into()), ms(20));
        s.tracking_started(ms(30));
        assert_eq!(s.authorization(), AuthorizationState::Denied);
        let u = HandUpdate::added(HandPoseSample::at(HandId::LEFT, Vec3::ZERO, ms(40)));
        assert_eq!(s.apply_hand_update(&u), None);
    }

    #[test]
    fn visible_hands_capped_at_two() {
        let mut s = live_session();
        for id in 0..3 {
            let u = HandUpdate::added(HandPoseSample::at(HandId(id), Vec3::X * id as f32, ms(0)));
            s.apply_hand_update(&u);
        }
        let slots = s.visible_hands();
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|h| h.is_visible()));
    }

    #[test]
    fn attached_object_follows_hand_each_tick() {
        let mut s = live_session();
        let u = HandUpdate::added(HandPoseSample::at(HandId::RIGHT, Vec3::new(0.0, 1.0, -0.5), ms(0)));
        s.apply_hand_update(&u);
        s.tick(ms(16));
        let p = s.object().unwrap().world_position();
        assert_relative_eq!(p.y, 1.1, epsilon = 1e-6);
        assert_relative_eq!(p.z, -0.5, epsilon = 1e-6);
    }

    #[test]
    fn tap_flashes_and_collision_message_wins() {
        let mut s = live_session();
        s.tick(ms(3000)); // let TrackingStarted clear
        s.tap(ms(3000));
        assert!(s.tap_flash());
        assert!(s.is_colliding());
        assert_eq!(s.status(), Some(&AppEvent::CollisionDetected));

        let cleared = s.tick(ms(3500));
        assert!(cleared.contains(&FeedbackKind::TapFlash));
        assert!(cleared.contains(&FeedbackKind::CollisionFlash));
        assert!(!s.is_colliding());
        assert!(s.status().is_some());
        s.tick(ms(5000));
        assert!(s.status().is_none());
    }

    #[test]
    fn collision_restart_extends_flash() {
        let mut s = live_session();
        s.collision(ms(0));
        s.collision(ms(300));
        s.tick(ms(600));
        assert!(s.is_colliding());
        s.tick(ms(800));
        assert!(!s.is_colliding());
    }

    #[test]
    fn teardown_makes_session_inert() {
        let mut s = live_session();
        s.tap(ms(0));
        s.teardown();
        assert!(s.is_torn_down());
        assert!(s.tick(ms(10_000)).is_empty());
        assert!(!s.is_colliding());
        assert_eq!(s.status(), None);
        assert_eq!(s.rearm(ms(10_000)), None);
        assert_eq!(s.drag_changed(drag(0.0, 0.0, 0.0, 20_000)), None);
        assert!(s.object().is_none());
    }

    #[test]
    fn trail_appears_after_release() {
        let mut s = live_session();
        s.drag_changed(drag(0.0, 0.0, 0.0, 0));
        s.drag_changed(drag(0.0, 0.0, 1.0, 100));
        s.tick(ms(100));
        s.tick(ms(150));
        s.tick(ms(200));
        assert_eq!(s.object().unwrap().trail_markers().len(), 3);
        s.rearm(ms(210));
        assert!(s.object().unwrap().trail_markers().is_empty());
    }
}
