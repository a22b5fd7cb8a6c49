//! Top-level application state machine.
//!
//! [`Experience`] owns the open/close lifecycle: opening builds a
//! [`ThrowSession`], arms an object and spawns the hand source; closing stops
//! the source and tears the session down.  [`AppState`] adds the
//! collaborators around it (stand-in ballistics for thrown objects and the
//! tap chord) and is driven once per frame by [`run`].

use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Context;
use glam::Vec3;
use grab_throw::{AttachmentTransition, AuthorizationState, ConfigError, ThrowConfig, ThrowSession};
use serde::Deserialize;
use tracing::{debug, info};

use crate::chord::{tap_chord, ChordPlayer};
use crate::source::{spawn_hand_source, HandSource, SimInput, SourceHandle, SourceMessage};
use crate::visualizer::{FrameInput, SceneView, Visualizer};

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.  Loadable from TOML; missing keys
/// keep their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub throw:          ThrowConfig,
    /// Send the tap chord to the first MIDI output port.
    pub midi:           bool,
    /// 0.0 – 1.0.
    pub chord_velocity: f32,
    pub chord_hold_ms:  u64,
    /// Downward acceleration applied to thrown objects (units/s²).
    pub gravity:        f32,
    pub floor_y:        f32,
    /// Make the simulated provider refuse to start.
    pub fail_session:   bool,
    /// Height of the LeapMotion device above the floor (metres).
    pub device_height:  f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            throw:          ThrowConfig::default(),
            midi:           true,
            chord_velocity: 0.7,
            chord_hold_ms:  400,
            gravity:        9.81,
            floor_y:        0.0,
            fail_session:   false,
            device_height:  0.9,
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(text).context("parsing config")?;
        cfg.throw.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("loading {}", path.display()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Experience
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperienceState { Closed, InTransition, Open }

pub struct Experience {
    config:  ThrowConfig,
    epoch:   Instant,
    state:   ExperienceState,
    session: Option<ThrowSession>,
    source:  Option<SourceHandle>,
}

impl Experience {
    pub fn new(config: ThrowConfig, epoch: Instant) -> Self {
        Experience {
            config,
            epoch,
            state:   ExperienceState::Closed,
            session: None,
            source:  None,
        }
    }

    /// Build a session, arm an object and start `source`.  Ignored unless
    /// closed.
    pub fn open<S: HandSource>(&mut self, source: S) -> Result<(), ConfigError> {
        if self.state != ExperienceState::Closed {
            debug!(state = ?self.state, "open ignored");
            return Ok(());
        }
        self.state = ExperienceState::InTransition;

        let mut session = match ThrowSession::new(self.config.clone()) {
            Ok(s)  => s,
            Err(e) => {
                self.state = ExperienceState::Closed;
                return Err(e);
            }
        };
        session.rearm(self.now());

        self.source  = Some(spawn_hand_source(source, self.epoch));
        self.session = Some(session);
        self.state   = ExperienceState::Open;
        info!("experience opened");
        Ok(())
    }

    /// Stop the source, then tear the session down.
    pub fn close(&mut self) {
        if self.state == ExperienceState::Closed {
            return;
        }
        self.state = ExperienceState::InTransition;
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        if let Some(mut session) = self.session.take() {
            session.teardown();
        }
        self.state = ExperienceState::Closed;
        info!("experience closed");
    }

    /// Apply everything the source delivered since the last call, in arrival
    /// order.  Returns the number of messages applied.
    pub fn pump(&mut self, now: Duration) -> usize {
        let (Some(source), Some(session)) = (self.source.as_ref(), self.session.as_mut()) else {
            return 0;
        };
        let messages = source.drain();
        for message in &messages {
            match message {
                SourceMessage::Started    => session.tracking_started(now),
                SourceMessage::Update(u)  => { session.apply_hand_update(u); }
                SourceMessage::Failed(e)  => session.tracking_failed(e, now),
            }
        }
        messages.len()
    }

    /// Block until the source thread returns on its own.
    pub fn wait_for_source(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.join();
        }
    }

    /// Time since the session epoch.
    pub fn now(&self) -> Duration { self.epoch.elapsed() }

    pub fn state(&self)   -> ExperienceState       { self.state }
    pub fn session(&self) -> Option<&ThrowSession> { self.session.as_ref() }
    pub fn session_mut(&mut self) -> Option<&mut ThrowSession> { self.session.as_mut() }
}

impl Drop for Experience {
    fn drop(&mut self) { self.close(); }
}

// ════════════════════════════════════════════════════════════════════════════
// Ballistic: stand-in rigid-body simulation for a free object
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BallisticStep {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Hit the floor this step.  The object sticks where it lands.
    pub landed:   bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ballistic {
    gravity: f32,
    floor_y: f32,
    flight:  Option<(Vec3, Vec3)>,
}

impl Ballistic {
    pub fn new(gravity: f32, floor_y: f32) -> Self {
        Ballistic { gravity, floor_y, flight: None }
    }

    pub fn launch(&mut self, position: Vec3, velocity: Vec3) {
        self.flight = Some((position, velocity));
    }

    pub fn cancel(&mut self) { self.flight = None; }

    pub fn is_flying(&self) -> bool { self.flight.is_some() }
    pub fn floor_y(&self)   -> f32  { self.floor_y }

    /// Semi-implicit Euler.  `None` when nothing is in flight.
    pub fn step(&mut self, dt: Duration) -> Option<BallisticStep> {
        let (mut position, mut velocity) = self.flight?;
        let dt = dt.as_secs_f32();
        velocity.y -= self.gravity * dt;
        position += velocity * dt;

        if position.y <= self.floor_y {
            position.y  = self.floor_y;
            self.flight = None;
            return Some(BallisticStep { position, velocity: Vec3::ZERO, landed: true });
        }
        self.flight = Some((position, velocity));
        Some(BallisticStep { position, velocity, landed: false })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    experience:     Experience,
    ballistic:      Ballistic,
    chord:          ChordPlayer,
    chord_velocity: f32,
}

impl AppState {
    pub fn new(cfg: &AppConfig, epoch: Instant) -> Self {
        AppState {
            experience:     Experience::new(cfg.throw.clone(), epoch),
            ballistic:      Ballistic::new(cfg.gravity, cfg.floor_y),
            chord:          ChordPlayer::spawn(cfg.midi, Duration::from_millis(cfg.chord_hold_ms)),
            chord_velocity: cfg.chord_velocity,
        }
    }

    pub fn open<S: HandSource>(&mut self, source: S) -> Result<(), ConfigError> {
        self.ballistic.cancel();
        self.experience.open(source)
    }

    pub fn close(&mut self) {
        self.ballistic.cancel();
        self.experience.close();
    }

    pub fn now(&self) -> Duration { self.experience.now() }

    // ── process one frame of window input ────────────────────────────────

    pub fn handle_input(&mut self, input: &FrameInput, now: Duration) {
        let Some(session) = self.experience.session_mut() else { return };

        if let Some(sample) = input.drag {
            session.drag_changed(sample);
        }
        if input.drag_ended {
            session.drag_ended();
        }
        if input.rearm {
            session.rearm(now);
        }
        if input.tap {
            session.tap(now);
            self.chord.play(&tap_chord(), self.chord_velocity);
        }
    }

    // ── per-frame tick ────────────────────────────────────────────────────

    /// Hand updates first, then attachment transitions into the ballistics,
    /// then one physics step, then the session's own timers.
    pub fn tick(&mut self, now: Duration, dt: Duration) {
        self.experience.pump(now);
        let Some(session) = self.experience.session_mut() else { return };

        for transition in session.drain_transitions() {
            match transition {
                AttachmentTransition::Released { world_position, launch_velocity, .. } => {
                    self.ballistic.launch(world_position, launch_velocity);
                }
                AttachmentTransition::Armed { .. } | AttachmentTransition::Discarded { .. } => {
                    self.ballistic.cancel();
                }
            }
        }

        if let Some(step) = self.ballistic.step(dt) {
            session.sync_simulated(step.position, step.velocity);
            if step.landed {
                debug!(position = ?step.position, "object landed");
                session.collision(now);
            }
        }

        session.tick(now);
    }

    // ── render ────────────────────────────────────────────────────────────

    pub fn render(&self, vis: &mut Visualizer, now: Duration) {
        let session = self.experience.session();
        let hands   = session.map(|s| s.visible_hands()).unwrap_or_default();
        vis.render(&SceneView {
            now,
            experience:    self.experience.state(),
            authorization: session.map_or(AuthorizationState::NotDetermined, |s| s.authorization()),
            hands:         &hands,
            object:        session.and_then(|s| s.object()),
            tap_flash:     session.is_some_and(|s| s.tap_flash()),
            colliding:     session.is_some_and(|s| s.is_colliding()),
            status:        session.and_then(|s| s.status()),
            speed:         session.and_then(|s| s.velocity()).map(Vec3::length),
            floor_y:       self.ballistic.floor_y(),
        });
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// Creates the visualizer and the hand source (simulation by default,
/// hardware with `--features leap`) and drives the update/render loop at
/// ~60 fps until the window closes or `Q` is pressed.
pub fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let epoch = Instant::now();

    // ── Visualizer (owns the window and the sim input sender) ────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let mut vis = Visualizer::new(sim_tx).context("opening visualizer window")?;

    // ── App state + hand source ──────────────────────────────────────────
    let mut app = AppState::new(&cfg, epoch);

    #[cfg(feature = "leap")]
    {
        drop(sim_rx);
        app.open(crate::source::LeapHandSource { device_height: cfg.device_height })?;
    }
    #[cfg(not(feature = "leap"))]
    app.open(crate::source::SimHandSource { rx: sim_rx, fail_session: cfg.fail_session })?;

    // ── Main loop ─────────────────────────────────────────────────────────
    let mut last = app.now();
    while vis.is_open() {
        let now   = app.now();
        let input = vis.poll_input(now);
        if input.quit { break; }

        app.handle_input(&input, now);
        app.tick(now, now.saturating_sub(last));
        app.render(&mut vis, now);
        last = now;
    }

    app.close();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
