//! Tuning values for the grab / throw lifecycle.
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! release_threshold = 3.0
//! trail_interval_ms = 40
//! ```

use std::time::Duration;

use glam::Vec3;
use hand_pose::HandId;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThrowConfig {
    /// Speed (units/s) that must be exceeded to release the held object.
    pub release_threshold:   f32,
    /// Estimated hand velocity is scaled by this on release.
    pub launch_multiplier:   f32,
    /// Triggers are suppressed for this long after a re-arm.  0 disables.
    pub release_cooldown_ms: u64,
    /// Hand the object is armed on.
    pub attach_hand:         u64,
    /// Object offset in the hand's local frame.
    pub attach_offset:       [f32; 3],
    pub trail_interval_ms:   u64,
    pub trail_lifespan_ms:   u64,
    pub tap_flash_ms:        u64,
    pub collision_flash_ms:  u64,
    pub status_message_ms:   u64,
    /// Hand indicator slots reported per tick.
    pub visible_hands:       usize,
}

impl Default for ThrowConfig {
    fn default() -> Self {
        ThrowConfig {
            release_threshold:   2.5,
            launch_multiplier:   1.5,
            release_cooldown_ms: 0,
            attach_hand:         HandId::RIGHT.0,
            attach_offset:       [0.0, 0.1, 0.0],
            trail_interval_ms:   50,
            trail_lifespan_ms:   400,
            tap_flash_ms:        500,
            collision_flash_ms:  500,
            status_message_ms:   2000,
            visible_hands:       2,
        }
    }
}

impl ThrowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("release_threshold", self.release_threshold as f64)?;
        positive("launch_multiplier", self.launch_multiplier as f64)?;
        if !self.attach_offset.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::NotFinite { field: "attach_offset" });
        }
        positive("trail_interval_ms",  self.trail_interval_ms as f64)?;
        positive("trail_lifespan_ms",  self.trail_lifespan_ms as f64)?;
        positive("tap_flash_ms",       self.tap_flash_ms as f64)?;
        positive("collision_flash_ms", self.collision_flash_ms as f64)?;
        positive("status_message_ms",  self.status_message_ms as f64)?;
        if self.visible_hands == 0 {
            return Err(ConfigError::NoVisibleHands);
        }
        Ok(())
    }

    pub fn attach_hand(&self)     -> HandId   { HandId(self.attach_hand) }
    pub fn attach_offset(&self)   -> Vec3     { Vec3::from_array(self.attach_offset) }
    pub fn release_cooldown(&self) -> Duration { Duration::from_millis(self.release_cooldown_ms) }
    pub fn trail_interval(&self)  -> Duration { Duration::from_millis(self.trail_interval_ms) }
    pub fn trail_lifespan(&self)  -> Duration { Duration::from_millis(self.trail_lifespan_ms) }
    pub fn tap_flash(&self)       -> Duration { Duration::from_millis(self.tap_flash_ms) }
    pub fn collision_flash(&self) -> Duration { Duration::from_millis(self.collision_flash_ms) }
    pub fn status_message(&self)  -> Duration { Duration::from_millis(self.status_message_ms) }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}
