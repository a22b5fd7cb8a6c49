//! Tap chord playback over MIDI.
//!
//! Chords are sent to a background thread so the update loop never waits on
//! the MIDI port.  With no port available a null output is used.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

// ════════════════════════════════════════════════════════════════════════════
// Notes
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PitchClass { C, Cs, D, Ds, E, F, Fs, G, Gs, A, As, B }

/// MIDI note number; C4 = 60.
pub fn midi_note(pitch: PitchClass, octave: i8) -> u8 {
    let n = 12 * (octave as i16 + 1) + pitch as i16;
    n.clamp(0, 127) as u8
}

/// Velocity 0.0–1.0 → MIDI 0–127.
pub fn midi_velocity(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 127.0).round() as u8
}

/// The chord played when the target is tapped.
pub fn tap_chord() -> [u8; 3] {
    [
        midi_note(PitchClass::C, 4),
        midi_note(PitchClass::E, 4),
        midi_note(PitchClass::G, 4),
    ]
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut: abstraction over midir / null
// ════════════════════════════════════════════════════════════════════════════

trait MidiOut: Send {
    fn note_on(&mut self,  channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
}

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let _ = self.conn.send(&[0x90 | (channel & 0x0F), note, velocity]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        let _ = self.conn.send(&[0x80 | (channel & 0x0F), note, 0]);
    }
}

struct NullOut;
impl MidiOut for NullOut {
    fn note_on(&mut self, _ch: u8, _n: u8, _v: u8) {}
    fn note_off(&mut self, _ch: u8, _n: u8)        {}
}

fn open_midi_output() -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("leap_throw") {
        Ok(m)  => m,
        Err(e) => {
            warn!(error = %e, "MIDI init failed, chords muted");
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    let Some(port) = ports.first() else {
        warn!("no MIDI output ports, chords muted");
        return Box::new(NullOut);
    };
    let name = midi_out.port_name(port).unwrap_or_else(|_| "unknown".to_string());

    match midi_out.connect(port, "leap-throw-chord") {
        Ok(conn) => {
            info!(port = %name, "MIDI output connected");
            Box::new(MidirOut { conn })
        }
        Err(e) => {
            warn!(port = %name, error = %e, "MIDI connect failed, chords muted");
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ChordPlayer
// ════════════════════════════════════════════════════════════════════════════

enum ChordCommand {
    Play { notes: Vec<u8>, velocity: u8 },
    Quit,
}

/// Handle to the chord thread.
pub struct ChordPlayer {
    cmd_tx: Sender<ChordCommand>,
}

impl ChordPlayer {
    /// `enabled = false` never touches the MIDI system.
    pub fn spawn(enabled: bool, hold: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        thread::spawn(move || {
            let out: Box<dyn MidiOut> = if enabled { open_midi_output() } else { Box::new(NullOut) };
            chord_thread(out, hold, cmd_rx);
        });
        ChordPlayer { cmd_tx }
    }

    pub fn play(&self, notes: &[u8], velocity: f32) {
        let _ = self.cmd_tx.send(ChordCommand::Play {
            notes:    notes.to_vec(),
            velocity: midi_velocity(velocity),
        });
    }
}

impl Drop for ChordPlayer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(ChordCommand::Quit);
    }
}

fn chord_thread(mut out: Box<dyn MidiOut>, hold: Duration, cmd_rx: Receiver<ChordCommand>) {
    const CHANNEL: u8 = 0;
    for cmd in cmd_rx {
        match cmd {
            ChordCommand::Play { notes, velocity } => {
                for &n in &notes { out.note_on(CHANNEL, n, velocity); }
                thread::sleep(hold);
                for &n in &notes { out.note_off(CHANNEL, n); }
            }
            ChordCommand::Quit => return,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
