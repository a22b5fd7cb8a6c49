//! Named feedback events and the observables they drive.

use std::fmt;

/// Events shown to the user for a fixed time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppEvent {
    TrackingStarted,
    TrackingFailed(String),
    TapDetected,
    CollisionDetected,
}

impl AppEvent {
    pub fn message(&self) -> String {
        match self {
            AppEvent::TrackingStarted        => "Hand Tracking Initialized".to_string(),
            AppEvent::TrackingFailed(reason) => format!("Hand Tracking Failed: {}", reason),
            AppEvent::TapDetected            => "Tap Detected!".to_string(),
            AppEvent::CollisionDetected      => "Collision Detected!".to_string(),
        }
    }

    /// ARGB display colour.
    pub fn color(&self) -> u32 {
        match self {
            AppEvent::TrackingStarted   => 0xFF33CC55, // green
            AppEvent::TrackingFailed(_) => 0xFFE04040, // red
            AppEvent::TapDetected       => 0xFF4080FF, // blue
            AppEvent::CollisionDetected => 0xFFFF9020, // orange
        }
    }
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Debounce channels.  Each has at most one live timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedbackKind {
    TapFlash,
    CollisionFlash,
    StatusMessage,
}

/// Whether the session may consume hand updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AuthorizationState {
    #[default]
    NotDetermined,
    Authorized,
    Denied,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_carries_reason() {
        let e = AppEvent::TrackingFailed("no provider".into());
        assert_eq!(e.message(), "Hand Tracking Failed: no provider");
        assert_eq!(e.to_string(), e.message());
    }

    #[test]
    fn each_event_has_a_distinct_colour() {
        let colours = [
            AppEvent::TrackingStarted.color(),
            AppEvent::TrackingFailed(String::new()).color(),
            AppEvent::TapDetected.color(),
            AppEvent::CollisionDetected.color(),
        ];
        for (i, a) in colours.iter().enumerate() {
            for b in &colours[i + 1..] {
                assert_ne!(a, b);
            }
            assert_eq!(a >> 24, 0xFF);
        }
    }
}
