//! Error types.
//!
//! Only failures that end a tracking session or reject a configuration are
//! errors.  Releasing with no object, releasing an object that is already
//! free and removing an unknown hand are reported as plain outcomes.

use thiserror::Error;

/// Terminal failures of a hand-tracking session.  Neither is retried; the
/// embedding application has to restart the experience.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    /// The tracking provider was unavailable at startup.
    #[error("session unavailable: {0}")]
    SessionInitialization(String),

    /// The update stream terminated with an error.
    #[error("tracking stream failed: {0}")]
    Stream(String),
}

impl TrackingError {
    /// The provider's description, without the category prefix.
    pub fn reason(&self) -> &str {
        match self {
            TrackingError::SessionInitialization(r) | TrackingError::Stream(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be positive (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("`{field}` must be finite")]
    NotFinite { field: &'static str },

    #[error("`visible_hands` must be at least 1")]
    NoVisibleHands,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strips_category() {
        let e = TrackingError::Stream("provider went away".into());
        assert_eq!(e.reason(), "provider went away");
        assert_eq!(e.to_string(), "tracking stream failed: provider went away");
    }
}
