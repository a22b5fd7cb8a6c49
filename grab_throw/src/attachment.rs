//! Attached / Free lifecycle of the manipulated object.
//!
//! ```text
//!            rearm (always allowed)
//!   ┌──────────────────────────────────────┐
//!   ▼                                      │
//! Attached ──release (policy trigger)──▶ Free
//!   kinematic, grip profile             dynamic, stick profile,
//!   parented to a hand                  parented to the world anchor,
//!                                       trailing markers running
//! ```
//!
//! Free → Attached only happens through [`ObjectAttachmentStateMachine::rearm`],
//! which replaces the object with a new one.

use std::fmt;
use std::time::Duration;

use glam::{Mat4, Vec3};
use hand_pose::{HandId, HandPoseTracker};
use tracing::{debug, info};

use crate::config::ThrowConfig;
use crate::trail::{TrailEffect, TrailMarker};

// ════════════════════════════════════════════════════════════════════════════
// Physics / render descriptors handed to the rendering layer
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsProfile {
    pub static_friction:  f32,
    pub dynamic_friction: f32,
    pub restitution:      f32,
}

impl PhysicsProfile {
    /// Held in the hand.
    pub const GRIP: PhysicsProfile = PhysicsProfile {
        static_friction:  0.8,
        dynamic_friction: 0.6,
        restitution:      0.1,
    };

    /// After release: sticks where it lands instead of bouncing.
    pub const STICK: PhysicsProfile = PhysicsProfile {
        static_friction:  1.0,
        dynamic_friction: 0.9,
        restitution:      0.01,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicsMode {
    /// Pose driven by the parent transform.
    Kinematic,
    /// Pose driven by the simulation.
    Dynamic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionMode {
    /// Hit-testing for input targeting only.
    TargetingOnly,
    /// Collides with the environment.
    Environment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisualMaterial {
    Armed,
    Released,
}

impl VisualMaterial {
    /// ARGB display colour.
    pub fn color(self) -> u32 {
        match self {
            VisualMaterial::Armed    => 0xFF33CC55,
            VisualMaterial::Released => 0xFFE04040,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AttachmentState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttachmentState {
    Attached { hand_id: HandId, local_offset: Vec3 },
    Free { physics: PhysicsProfile },
}

impl AttachmentState {
    pub fn is_attached(&self) -> bool { matches!(self, AttachmentState::Attached { .. }) }

    /// Held objects grip; free ones carry the profile chosen on release.
    pub fn physics_profile(&self) -> PhysicsProfile {
        match self {
            AttachmentState::Attached { .. } => PhysicsProfile::GRIP,
            AttachmentState::Free { physics } => *physics,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ManipulatedObject
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct ManipulatedObject {
    id:               ObjectId,
    state:            AttachmentState,
    /// Parent frame: the hand while attached, the world anchor once free.
    parent:           Mat4,
    /// Position in the parent frame.
    local_position:   Vec3,
    physics_mode:     PhysicsMode,
    collision:        CollisionMode,
    material:         VisualMaterial,
    linear_velocity:  Vec3,
    trail:            Option<TrailEffect>,
}

impl ManipulatedObject {
    pub fn id(&self)               -> ObjectId        { self.id }
    pub fn state(&self)            -> AttachmentState { self.state }
    pub fn physics_mode(&self)     -> PhysicsMode     { self.physics_mode }
    pub fn physics_profile(&self)  -> PhysicsProfile  { self.state.physics_profile() }
    pub fn collision(&self)        -> CollisionMode   { self.collision }
    pub fn material(&self)         -> VisualMaterial  { self.material }
    pub fn linear_velocity(&self)  -> Vec3            { self.linear_velocity }
    pub fn local_position(&self)   -> Vec3            { self.local_position }
    pub fn is_attached(&self)      -> bool            { self.state.is_attached() }

    pub fn world_position(&self) -> Vec3 {
        self.parent.transform_point3(self.local_position)
    }

    pub fn trail_markers(&self) -> &[TrailMarker] {
        self.trail.as_ref().map(|t| t.markers()).unwrap_or(&[])
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Transitions
// ════════════════════════════════════════════════════════════════════════════

/// Published to the rendering layer, which swaps meshes, materials and
/// physics components accordingly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttachmentTransition {
    /// A fresh object was created attached to `hand_id`.
    Armed { object: ObjectId, hand_id: HandId },
    /// The previous object was discarded by a re-arm.
    Discarded { object: ObjectId },
    /// Attached → Free.
    Released {
        object:          ObjectId,
        world_position:  Vec3,
        launch_velocity: Vec3,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReleaseOutcome {
    Released { object: ObjectId, launch_velocity: Vec3 },
    NoObject,
    AlreadyFree,
}

// ════════════════════════════════════════════════════════════════════════════
// ObjectAttachmentStateMachine
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ObjectAttachmentStateMachine {
    object:            Option<ManipulatedObject>,
    next_id:           u64,
    world_anchor:      Mat4,
    attach_hand:       HandId,
    attach_offset:     Vec3,
    launch_multiplier: f32,
    trail_interval:    Duration,
    trail_lifespan:    Duration,
    transitions:       Vec<AttachmentTransition>,
}

impl ObjectAttachmentStateMachine {
    pub fn new(config: &ThrowConfig) -> Self {
        ObjectAttachmentStateMachine {
            object:            None,
            next_id:           1,
            world_anchor:      Mat4::IDENTITY,
            attach_hand:       config.attach_hand(),
            attach_offset:     config.attach_offset(),
            launch_multiplier: config.launch_multiplier,
            trail_interval:    config.trail_interval(),
            trail_lifespan:    config.trail_lifespan(),
            transitions:       Vec::new(),
        }
    }

    /// Frame that released objects are reparented into.
    pub fn with_world_anchor(mut self, anchor: Mat4) -> Self {
        self.world_anchor = anchor;
        self
    }

    /// Discard any current object (and its trail) and create a new one
    /// attached at the default offset.  `hand_pose` is the hand's current
    /// transform if it is being tracked.
    pub fn rearm(&mut self, hand_pose: Option<Mat4>) -> ObjectId {
        if let Some(mut old) = self.object.take() {
            if let Some(trail) = old.trail.as_mut() {
                trail.clear();
            }
            self.transitions.push(AttachmentTransition::Discarded { object: old.id });
        }

        let id = ObjectId(self.next_id);
        self.next_id += 1;

        self.object = Some(ManipulatedObject {
            id,
            state: AttachmentState::Attached {
                hand_id:      self.attach_hand,
                local_offset: self.attach_offset,
            },
            parent:          hand_pose.unwrap_or(Mat4::IDENTITY),
            local_position:  self.attach_offset,
            physics_mode:    PhysicsMode::Kinematic,
            collision:       CollisionMode::TargetingOnly,
            material:        VisualMaterial::Armed,
            linear_velocity: Vec3::ZERO,
            trail:           None,
        });
        self.transitions.push(AttachmentTransition::Armed { object: id, hand_id: self.attach_hand });
        info!(object = %id, hand = %self.attach_hand, "object armed");
        id
    }

    /// Keep an attached object's parent frame in step with its hand.
    pub fn follow(&mut self, hands: &HandPoseTracker) {
        let Some(obj) = self.object.as_mut() else { return };
        if let AttachmentState::Attached { hand_id, .. } = obj.state {
            if let Some(sample) = hands.get(hand_id) {
                obj.parent = sample.transform;
            }
        }
    }

    /// Attached → Free, launching with `velocity × launch_multiplier`.
    ///
    /// Releasing with no object or an object that is already free does
    /// nothing.
    pub fn release(&mut self, velocity: Option<Vec3>, now: Duration) -> ReleaseOutcome {
        let Some(obj) = self.object.as_mut() else {
            debug!("release ignored: no object");
            return ReleaseOutcome::NoObject;
        };
        if !obj.is_attached() {
            debug!(object = %obj.id, "release ignored: already free");
            return ReleaseOutcome::AlreadyFree;
        }

        // World position before touching the hierarchy, so the reparent
        // does not move the object.
        let world = obj.world_position();

        obj.parent = self.world_anchor;
        obj.local_position = self.world_anchor.inverse().transform_point3(world);

        obj.state        = AttachmentState::Free { physics: PhysicsProfile::STICK };
        obj.physics_mode = PhysicsMode::Dynamic;
        obj.collision    = CollisionMode::Environment;
        obj.material     = VisualMaterial::Released;

        let launch = velocity.unwrap_or(Vec3::ZERO) * self.launch_multiplier;
        obj.linear_velocity = launch;

        obj.trail = Some(TrailEffect::start(now, self.trail_interval, self.trail_lifespan));

        let id = obj.id;
        self.transitions.push(AttachmentTransition::Released {
            object:          id,
            world_position:  world,
            launch_velocity: launch,
        });
        info!(object = %id, speed = launch.length(), "object released");
        ReleaseOutcome::Released { object: id, launch_velocity: launch }
    }

    /// Advance the trailing effect of a free object.
    pub fn tick(&mut self, now: Duration) {
        if let Some(obj) = self.object.as_mut() {
            let pos = obj.world_position();
            if let Some(trail) = obj.trail.as_mut() {
                trail.tick(now, pos);
            }
        }
    }

    /// Write back the simulated pose of a free object.  Ignored while
    /// attached, where the hand drives the pose.
    pub fn sync_simulated(&mut self, world_position: Vec3, linear_velocity: Vec3) {
        if let Some(obj) = self.object.as_mut() {
            if !obj.is_attached() {
                obj.local_position  = obj.parent.inverse().transform_point3(world_position);
                obj.linear_velocity = linear_velocity;
            }
        }
    }

    /// Drop the object and stop its trail.
    pub fn teardown(&mut self) {
        if let Some(mut obj) = self.object.take() {
            if let Some(trail) = obj.trail.as_mut() {
                trail.clear();
            }
            self.transitions.push(AttachmentTransition::Discarded { object: obj.id });
        }
    }

    pub fn object(&self) -> Option<&ManipulatedObject> { self.object.as_ref() }

    pub fn is_attached(&self) -> bool {
        self.object.as_ref().is_some_and(|o| o.is_attached())
    }

    /// Transitions since the last call, oldest first.
    pub fn drain_transitions(&mut self) -> Vec<AttachmentTransition> {
        std::mem::take(&mut self.transitions)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
