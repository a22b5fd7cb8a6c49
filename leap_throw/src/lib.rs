//! # leap_throw
//!
//! Grab-and-throw with tracked hands: an object rides on the right hand,
//! a fast drag flings it, it falls, sticks where it lands and leaves a
//! fading trail.  Tapping the target flashes it and plays a chord over MIDI.
//!
//! ## Gesture → Action mapping
//!
//! | Input | Action |
//! |---|---|
//! | Drag faster than the release threshold | Release the held object with the drag velocity × launch multiplier |
//! | Tap on the target | Tap flash, collision flash, C-major chord |
//! | Object reaches the floor | Collision flash + status |
//! | Re-arm | Fresh object attached to the right hand |
//!
//! ## Feature flags
//!
//! * (default) **Simulation mode**: keyboard and mouse drive the hands.
//! * `leap` **Hardware mode**: polls a real LeapMotion controller via LeapC.
//!
//! ### Simulation controls
//!
//! | Key | Effect |
//! |---|---|
//! | Arrows | Move the right hand in X / Y |
//! | `PgUp` / `PgDn` | Move the right hand away / toward the viewer |
//! | `H` | Show / hide the left hand |
//! | Mouse drag | Drag gesture (fast drags throw) |
//! | `N` | Re-arm |
//! | `Space` | Tap the target |
//! | `F` | Simulate a tracking stream failure |
//! | `Q` / `Esc` | Quit |

pub mod app;
pub mod chord;
pub mod source;
pub mod visualizer;
