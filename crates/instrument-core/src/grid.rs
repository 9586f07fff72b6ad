//! Mapping between grid cells, MIDI notes and field space.

use crate::constants::*;
use crate::error::{CoreError, CoreResult};
use glam::Vec3;

/// A cell on the 12x3 playing surface. Row 0 is the top (highest) octave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Cell {
    pub col: usize,
    pub row: usize,
}

impl Cell {
    pub fn new(col: usize, row: usize) -> CoreResult<Self> {
        if col >= GRID_COLS || row >= GRID_ROWS {
            return Err(CoreError::CellOutOfRange { col, row });
        }
        Ok(Self { col, row })
    }

    /// Drum pads land on the middle row, one column per pad.
    pub fn for_drum(index: usize) -> Self {
        Self {
            col: index % GRID_COLS,
            row: 1,
        }
    }

    /// Nearest cell for an arbitrary MIDI note (snapped to a natural first).
    pub fn from_midi(midi: i32) -> Self {
        let m = snap_to_natural(midi);
        let octave = (m - BASE_MIDI).div_euclid(12);
        let row = (2 - octave).clamp(0, GRID_ROWS as i32 - 1) as usize;
        let col = match m.rem_euclid(12) {
            0 => 0,
            2 => 2,
            4 => 3,
            5 => 4,
            7 => 5,
            9 => 7,
            11 => 8,
            _ => 0,
        };
        Self { col, row }
    }

    pub fn midi(self) -> i32 {
        BASE_MIDI + (2 - self.row as i32) * 12 + COL_TO_SEMITONE[self.col % GRID_COLS]
    }

    /// Attractor position for this cell; the grid spans x in [-1.5, 1.5] and
    /// y in [-0.6, 0.6] on the z = 0 plane.
    pub fn position(self) -> Vec3 {
        let x = ((self.col as f32 + 0.5) / GRID_COLS as f32) * CELL_SPAN_X - CELL_SPAN_X * 0.5;
        let y = CELL_TOP_Y - ((self.row as f32 + 0.5) / GRID_ROWS as f32) * CELL_SPAN_Y;
        Vec3::new(x, y, 0.0)
    }
}

/// Snap to the nearest white-key pitch class in the same octave.
/// Equidistant notes resolve upward.
pub fn snap_to_natural(midi: i32) -> i32 {
    let octave = midi.div_euclid(12);
    let pc = midi.rem_euclid(12);
    let mut best = NATURAL_SEMITONES[0];
    for &n in NATURAL_SEMITONES.iter().skip(1) {
        if (pc - n).abs() <= (pc - best).abs() {
            best = n;
        }
    }
    octave * 12 + best
}

/// Convert MIDI note number to frequency in Hz (A4 = 440 Hz).
#[inline]
pub fn midi_to_hz(midi: f32) -> f32 {
    440.0 * (2.0_f32).powf((midi - 69.0) / 12.0)
}

/// Notes whose pitch class rings until released.
pub fn is_sustain_note(midi: i32) -> bool {
    SUSTAIN_CLASSES.contains(&midi.rem_euclid(12))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrumKind {
    Kick,
    Snare,
    Bass808,
    Clap,
    HatClosed,
    HatOpen,
    Rim,
    Snap,
    TomLow,
    TomMid,
    Ride,
}

impl DrumKind {
    pub const ALL: [DrumKind; 11] = [
        DrumKind::Kick,
        DrumKind::Snare,
        DrumKind::Bass808,
        DrumKind::Clap,
        DrumKind::HatClosed,
        DrumKind::HatOpen,
        DrumKind::Rim,
        DrumKind::Snap,
        DrumKind::TomLow,
        DrumKind::TomMid,
        DrumKind::Ride,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|d| *d == self).unwrap_or(0)
    }

    pub fn name(self) -> &'static str {
        match self {
            DrumKind::Kick => "kick",
            DrumKind::Snare => "snare",
            DrumKind::Bass808 => "808",
            DrumKind::Clap => "clap",
            DrumKind::HatClosed => "hat-closed",
            DrumKind::HatOpen => "hat-open",
            DrumKind::Rim => "rim",
            DrumKind::Snap => "snap",
            DrumKind::TomLow => "tom-low",
            DrumKind::TomMid => "tom-mid",
            DrumKind::Ride => "ride",
        }
    }
}
