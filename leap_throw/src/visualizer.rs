//! Software-rendered front view of the throw scene using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  auth / experience                             speed u/s     │
//! │                                                              │
//! │        (left)          [target]          (right)             │
//! │                           ●  ·  ·  ·  trail                  │
//! │  ─────────────────────────── floor ───────────────────────── │
//! │  status line (coloured by event)         COLLISION DETECTED! │
//! │  key legend                                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The view looks down -Z.  X and Y map linearly onto the scene area and
//! depth only scales disc radii.

use std::sync::mpsc::Sender;
use std::time::Duration;

use glam::Vec3;
use grab_throw::{AppEvent, AuthorizationState, DragSample, ManipulatedObject};
use hand_pose::{HandId, HandSlot};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::app::ExperienceState;
use crate::source::SimInput;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 960;
pub const WIN_H:     usize = 600;
const STATUS_Y:      usize = WIN_H - 44;
const SCENE_H:       usize = STATUS_Y;
const SCENE_X_MIN:   f32   = -1.6;
const SCENE_X_MAX:   f32   = 1.6;
const SCENE_Y_MIN:   f32   = -0.1;
const SCENE_Y_MAX:   f32   = 2.0;
const BG_COLOR:      u32   = 0xFF141824;
const FLOOR_COLOR:   u32   = 0xFF3A4256;
const TEXT_BG:       u32   = 0xFF0F1A30;
const LEGEND_COLOR:  u32   = 0xFF888888;
const TRAIL_COLOR:   u32   = 0xFFFF9020;
const TARGET_IDLE:   u32   = 0xFF808080;
const TARGET_FLASH:  u32   = 0xFFFFE040;
const HAND_COLORS:   [u32; 2] = [0xFF4080FF, 0xFF33CC55];

/// Where the tap target sits in the scene.
pub const TAP_TARGET: Vec3 = Vec3::new(0.0, 1.2, -0.5);
/// Mouse drags are unprojected onto this plane.
pub const DRAG_PLANE_Z: f32 = -0.5;
/// Simulated hand step per key repeat (metres).
const NUDGE_STEP: f32 = 0.02;

const OBJECT_RADIUS: f32 = 0.05;
const HAND_RADIUS:   f32 = 0.04;
const TRAIL_RADIUS:  f32 = 0.02;

// ════════════════════════════════════════════════════════════════════════════
// Per-frame input / view
// ════════════════════════════════════════════════════════════════════════════

/// What the window produced this frame, besides simulated hand input which
/// goes straight to the sim source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameInput {
    pub quit:       bool,
    pub rearm:      bool,
    pub tap:        bool,
    pub drag:       Option<DragSample>,
    pub drag_ended: bool,
}

/// Snapshot of everything drawn in one frame.
pub struct SceneView<'a> {
    pub now:           Duration,
    pub experience:    ExperienceState,
    pub authorization: AuthorizationState,
    pub hands:         &'a [HandSlot],
    pub object:        Option<&'a ManipulatedObject>,
    pub tap_flash:     bool,
    pub colliding:     bool,
    pub status:        Option<&'a AppEvent>,
    pub speed:         Option<f32>,
    pub floor_y:       f32,
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:     Window,
    buf:        Vec<u32>,
    sim_tx:     Sender<SimInput>,
    last_mouse: Option<(f32, f32)>,
    dragging:   bool,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            "Leap Throw - grab, fling, tap",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
            last_mouse: None,
            dragging:   false,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll keyboard and mouse.  Hand movement is forwarded to the sim source;
    /// everything else comes back in the [`FrameInput`].
    pub fn poll_input(&mut self, now: Duration) -> FrameInput {
        let mut input = FrameInput::default();
        if !self.window.is_open() {
            input.quit = true;
            return input;
        }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        input.quit  = one_shot(Key::Q) || one_shot(Key::Escape);
        input.rearm = one_shot(Key::N);
        input.tap   = one_shot(Key::Space);

        let mut sim = Vec::new();
        if one_shot(Key::H) {
            sim.push(SimInput::Toggle(HandId::LEFT));
        }
        if one_shot(Key::F) {
            sim.push(SimInput::Fail("simulated stream loss".to_string()));
        }
        let nudges = [
            (Key::Left,     Vec3::NEG_X),
            (Key::Right,    Vec3::X),
            (Key::Up,       Vec3::Y),
            (Key::Down,     Vec3::NEG_Y),
            (Key::PageUp,   Vec3::NEG_Z),
            (Key::PageDown, Vec3::Z),
        ];
        for (key, dir) in nudges {
            if held(key) {
                sim.push(SimInput::Nudge(HandId::RIGHT, dir * NUDGE_STEP));
            }
        }
        for s in sim {
            // The hardware source has no receiver; dropping is fine.
            let _ = self.sim_tx.send(s);
        }

        // ── mouse drag ────────────────────────────────────────────────────
        let down = self.window.get_mouse_down(MouseButton::Left);
        let pos  = self.window.get_mouse_pos(MouseMode::Clamp);
        match (down, pos) {
            (true, Some(p)) => {
                if !self.dragging || self.last_mouse != Some(p) {
                    input.drag = Some(DragSample::new(unproject(p.0, p.1), now));
                }
                self.dragging   = true;
                self.last_mouse = Some(p);
            }
            (false, _) | (true, None) => {
                if self.dragging {
                    input.drag_ended = true;
                }
                self.dragging   = false;
                self.last_mouse = None;
            }
        }

        input
    }

    /// Render one frame.
    pub fn render(&mut self, view: &SceneView<'_>) {
        self.buf.fill(BG_COLOR);

        // ── Floor ─────────────────────────────────────────────────────────
        let (_, floor_px) = project(Vec3::new(0.0, view.floor_y, DRAG_PLANE_Z));
        if floor_px >= 0 {
            let fy = floor_px as usize;
            self.fill_rect(0, fy, WIN_W, 2, FLOOR_COLOR);
        }

        // ── Tap target ────────────────────────────────────────────────────
        let target = if view.tap_flash { TARGET_FLASH } else { TARGET_IDLE };
        self.draw_square(TAP_TARGET, 0.06, target);

        // ── Hands ─────────────────────────────────────────────────────────
        for (slot, color) in view.hands.iter().zip(HAND_COLORS) {
            if let HandSlot::Visible(sample) = slot {
                self.draw_disc(sample.world_position, HAND_RADIUS, color);
            }
        }

        // ── Object + trail ────────────────────────────────────────────────
        if let Some(object) = view.object {
            for marker in object.trail_markers() {
                let a = marker.opacity(view.now);
                if a > 0.0 {
                    self.blend_disc(marker.position, TRAIL_RADIUS, TRAIL_COLOR, a);
                }
            }
            self.draw_disc(object.world_position(), OBJECT_RADIUS, object.material().color());
        }

        // ── Header ────────────────────────────────────────────────────────
        let header = format!(
            "{}  /  {}",
            experience_label(view.experience),
            authorization_label(view.authorization),
        );
        self.draw_label(&header, 10, 10, 0xFFDDDDDD);
        if let Some(speed) = view.speed {
            let s = format!("speed {:.2} u/s", speed);
            self.draw_label(&s, WIN_W - 4 * s.len() - 10, 10, 0xFFDDDDDD);
        }

        // ── Status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        if let Some(event) = view.status {
            self.draw_label(&event.message(), 10, STATUS_Y + 8, event.color());
        }
        if view.colliding {
            let msg = AppEvent::CollisionDetected.message();
            self.draw_label(&msg, WIN_W - 4 * msg.len() - 10, STATUS_Y + 8, TRAIL_COLOR);
        }

        // ── Key legend ────────────────────────────────────────────────────
        self.draw_label(
            "arrows/PgUp/PgDn=move right  H=left hand  drag=throw  N=arm  Space=tap  F=fail  Q=quit",
            10, WIN_H - 14, LEGEND_COLOR,
        );

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn draw_disc(&mut self, center: Vec3, radius: f32, color: u32) {
        self.disc(center, radius, |_| color);
    }

    fn blend_disc(&mut self, center: Vec3, radius: f32, color: u32, alpha: f32) {
        self.disc(center, radius, |under| blend(under, color, alpha));
    }

    fn disc(&mut self, center: Vec3, radius: f32, shade: impl Fn(u32) -> u32) {
        let (cx, cy) = project(center);
        let r = pixel_radius(radius, center.z);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                if let Some(i) = index(cx + dx, cy + dy) {
                    self.buf[i] = shade(self.buf[i]);
                }
            }
        }
    }

    fn draw_square(&mut self, center: Vec3, half: f32, color: u32) {
        let (cx, cy) = project(center);
        let r = pixel_radius(half, center.z);
        for dy in -r..=r {
            for dx in -r..=r {
                if let Some(i) = index(cx + dx, cy + dy) {
                    self.buf[i] = color;
                }
            }
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(WIN_H) {
            for col in x..(x + w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    /// 3×5 bitmap text, 4 px advance.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            let bits = glyph(ch);
            for row in 0..5usize {
                for col in 0..3usize {
                    let bit = 14 - (row * 3 + col);
                    if bits & (1 << bit) != 0 {
                        self.set_pixel(cx + col, y + row, color);
                    }
                }
            }
            cx += 4;
            if cx + 4 > WIN_W { break; }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Projection
// ════════════════════════════════════════════════════════════════════════════

/// Scene point to window pixel (may be off-screen).
pub fn project(p: Vec3) -> (isize, isize) {
    let u = (p.x - SCENE_X_MIN) / (SCENE_X_MAX - SCENE_X_MIN);
    let v = (SCENE_Y_MAX - p.y) / (SCENE_Y_MAX - SCENE_Y_MIN);
    ((u * WIN_W as f32).round() as isize, (v * SCENE_H as f32).round() as isize)
}

/// Window pixel to a scene point on the drag plane.
pub fn unproject(x: f32, y: f32) -> Vec3 {
    let u = x / WIN_W as f32;
    let v = y / SCENE_H as f32;
    Vec3::new(
        SCENE_X_MIN + u * (SCENE_X_MAX - SCENE_X_MIN),
        SCENE_Y_MAX - v * (SCENE_Y_MAX - SCENE_Y_MIN),
        DRAG_PLANE_Z,
    )
}

/// Nearer things draw bigger; clamped so nothing vanishes or floods.
fn pixel_radius(radius: f32, z: f32) -> isize {
    let px_per_unit = WIN_W as f32 / (SCENE_X_MAX - SCENE_X_MIN);
    let depth = (-z).max(0.1);
    let scale = (-DRAG_PLANE_Z / depth).clamp(0.4, 3.0);
    ((radius * px_per_unit * scale).round() as isize).max(1)
}

fn index(x: isize, y: isize) -> Option<usize> {
    if x < 0 || y < 0 || x as usize >= WIN_W || y as usize >= SCENE_H {
        return None;
    }
    Some(y as usize * WIN_W + x as usize)
}

fn experience_label(state: ExperienceState) -> &'static str {
    match state {
        ExperienceState::Closed       => "closed",
        ExperienceState::InTransition => "opening",
        ExperienceState::Open         => "open",
    }
}

fn authorization_label(state: AuthorizationState) -> &'static str {
    match state {
        AuthorizationState::NotDetermined => "tracking: waiting",
        AuthorizationState::Authorized    => "tracking: authorized",
        AuthorizationState::Denied        => "tracking: denied",
    }
}

/// Alpha-blend `top` over `under`.  Both ARGB; result is opaque.
fn blend(under: u32, top: u32, alpha: f32) -> u32 {
    let t = alpha.clamp(0.0, 1.0);
    let mix = |shift: u32| {
        let a = ((under >> shift) & 0xFF) as f32;
        let b = ((top >> shift) & 0xFF) as f32;
        ((a + (b - a) * t).round() as u32) << shift
    };
    0xFF000000 | mix(16) | mix(8) | mix(0)
}

// ────────────────────────────────────────────────────────────────────────────
// 3×5 font: 15 bits, row-major, top-left pixel is bit 14
// ────────────────────────────────────────────────────────────────────────────

fn glyph(c: char) -> u16 {
    match c.to_ascii_uppercase() {
        'A'  => 0b111101111101101,
        'B'  => 0b110101110101110,
        'C'  => 0b111100100100111,
        'D'  => 0b110101101101110,
        'E'  => 0b111100110100111,
        'F'  => 0b111100110100100,
        'G'  => 0b111100101101111,
        'H'  => 0b101101111101101,
        'I'  => 0b111010010010111,
        'J'  => 0b001001001101111,
        'K'  => 0b101110100110101,
        'L'  => 0b100100100100111,
        'M'  => 0b101111111101101,
        'N'  => 0b110101101101101,
        'O'  => 0b111101101101111,
        'P'  => 0b111101111100100,
        'Q'  => 0b111101101111001,
        'R'  => 0b110101110101101,
        'S'  => 0b111100111001111,
        'T'  => 0b111010010010010,
        'U'  => 0b101101101101111,
        'V'  => 0b101101101101010,
        'W'  => 0b101101111111101,
        'X'  => 0b101101010101101,
        'Y'  => 0b101101010010010,
        'Z'  => 0b111001010100111,
        '0'  => 0b111101101101111,
        '1'  => 0b010110010010111,
        '2'  => 0b111001111100111,
        '3'  => 0b111001011001111,
        '4'  => 0b101101111001001,
        '5'  => 0b111100111001111,
        '6'  => 0b111100111101111,
        '7'  => 0b111001010010010,
        '8'  => 0b111101111101111,
        '9'  => 0b111101111001111,
        '!'  => 0b010010010000010,
        ':'  => 0b000010000010000,
        '.'  => 0b000000000000010,
        '/'  => 0b001001010100100,
        '='  => 0b000111000111000,
        '-'  => 0b000000111000000,
        '('  => 0b010100100100010,
        ')'  => 0b010001001001010,
        '+'  => 0b000010111010000,
        '#'  => 0b101111101111101,
        ','  => 0b000000000010100,
        '%'  => 0b101001010100101,
        ' '  => 0,
        _    => 0b000000010000000,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
