//! # grab_throw
//!
//! Turns hand-pose updates and drag-gesture samples into attach / release
//! decisions for one hand-held object, with throw velocity, a trailing
//! effect and debounced feedback.
//!
//! ## Per-tick flow
//!
//! ```text
//! hand updates ─▶ HandPoseTracker ──────────────┐
//!                                               ▼
//! drag samples ─▶ GestureVelocityEstimator ─▶ ReleaseDecisionPolicy
//!                                               │ trigger
//!                                               ▼
//!                                 ObjectAttachmentStateMachine ─▶ transitions
//!                                               │
//! taps / collisions / status ─▶ EventDebouncer ─┴─▶ observables
//! ```
//!
//! [`ThrowSession`] owns all of these and is driven from one update loop.
//!
//! ## Release policy
//!
//! | Condition | Result |
//! |---|---|
//! | speed > threshold, attached, not yet fired this lifecycle | release |
//! | object already free | nothing |
//! | fired already (latched) | nothing until re-arm |
//! | within `release_cooldown_ms` of re-arm | nothing |

pub mod attachment;
pub mod config;
pub mod debounce;
pub mod error;
pub mod feedback;
pub mod policy;
pub mod session;
pub mod trail;
pub mod velocity;

pub use attachment::{
    AttachmentState, AttachmentTransition, CollisionMode, ManipulatedObject,
    ObjectAttachmentStateMachine, ObjectId, PhysicsMode, PhysicsProfile, ReleaseOutcome,
    VisualMaterial,
};
pub use config::ThrowConfig;
pub use debounce::{EventDebouncer, FeedbackTimer};
pub use error::{ConfigError, TrackingError};
pub use feedback::{AppEvent, AuthorizationState, FeedbackKind};
pub use policy::ReleaseDecisionPolicy;
pub use session::ThrowSession;
pub use trail::{TrailEffect, TrailMarker};
pub use velocity::{DragSample, GestureVelocityEstimator, Observation};
