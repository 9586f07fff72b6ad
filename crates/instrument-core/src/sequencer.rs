//! Self-playing note sources, advanced from the frame tick instead of timers.

use crate::config::SequencerParams;
use rand::prelude::*;

pub const ARP_PATTERNS: [&[i32]; 6] = [
    &[0, 4, 7, 12, 7, 4],             // major up-down
    &[0, 3, 7, 12, 7, 3],             // minor up-down
    &[0, 4, 7, 11, 12, 11, 7, 4],     // maj7 cascade
    &[0, 7, 12, 0, 5, 12],            // fifths
    &[0, 3, 7, 10, 14, 10, 7, 3],     // min7 wave
    &[0, 2, 4, 7, 9, 12, 9, 7, 4, 2], // pentatonic run
];

pub const AMBIENT_SCALES: [&[i32]; 4] = [
    &[0, 2, 4, 7, 9],
    &[0, 3, 5, 7, 10],
    &[0, 2, 3, 5, 7, 8, 10],
    &[0, 2, 4, 5, 7, 9, 11],
];

/// A note produced by a sequencer.
///
/// Fields:
/// - `visual`: whether the note should also move the attractor and targets
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SequencedNote {
    pub midi: i32,
    pub velocity: f32,
    pub sustained: bool,
    pub visual: bool,
}

/// Sixteenth-note arpeggio over the lowest held note.
pub struct Arpeggiator {
    enabled: bool,
    pattern: &'static [i32],
    index: usize,
    step_sec: f32,
    accum: f32,
    rng: StdRng,
}

impl Arpeggiator {
    pub fn new(bpm: f32, seed: u64) -> Self {
        Self {
            enabled: false,
            pattern: ARP_PATTERNS[0],
            index: 0,
            step_sec: 60.0 / bpm.max(1.0) / 2.0,
            accum: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn pattern(&self) -> &'static [i32] {
        self.pattern
    }

    pub fn step_sec(&self) -> f32 {
        self.step_sec
    }

    /// Flip on/off; turning on picks a fresh pattern. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        if self.enabled {
            self.pattern = ARP_PATTERNS[self.rng.gen_range(0..ARP_PATTERNS.len())];
            self.accum = 0.0;
            log::info!("[arp] on, pattern {:?}", self.pattern);
        } else {
            log::info!("[arp] off");
        }
        self.enabled
    }

    pub fn tick(&mut self, dt: f32, lowest_held: Option<i32>, out: &mut Vec<SequencedNote>) {
        if !self.enabled {
            return;
        }
        self.accum += dt.max(0.0);
        while self.accum >= self.step_sec {
            self.accum -= self.step_sec;
            let Some(root) = lowest_held else {
                continue;
            };
            let midi = root + self.pattern[self.index % self.pattern.len()];
            self.index = self.index.wrapping_add(1);
            out.push(SequencedNote {
                midi,
                velocity: 0.35 + self.rng.gen::<f32>() * 0.15,
                sustained: false,
                visual: true,
            });
        }
    }
}

/// Soft generative notes that fade in after a long stretch without input.
pub struct AmbientPlayer {
    params: SequencerParams,
    auto_start: bool,
    active: bool,
    quiet_sec: f32,
    scale: &'static [i32],
    root: i32,
    played: u32,
    countdown: f32,
    rng: StdRng,
}

impl AmbientPlayer {
    pub fn new(params: SequencerParams, seed: u64) -> Self {
        Self {
            params,
            auto_start: true,
            active: false,
            quiet_sec: 0.0,
            scale: AMBIENT_SCALES[0],
            root: 60,
            played: 0,
            countdown: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_auto_start(&mut self, on: bool) {
        self.auto_start = on;
    }

    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.played = 0;
        self.countdown = 0.0;
        self.scale = AMBIENT_SCALES[self.rng.gen_range(0..AMBIENT_SCALES.len())];
        self.root = 48 + self.rng.gen_range(0..24);
        log::info!("[ambient] on, root {} scale {:?}", self.root, self.scale);
    }

    pub fn stop(&mut self) {
        if self.active {
            log::info!("[ambient] off");
        }
        self.active = false;
    }

    pub fn toggle(&mut self) -> bool {
        if self.active {
            self.stop();
        } else {
            self.start();
        }
        self.active
    }

    /// Any user input: stop playing and restart the quiet timer.
    pub fn user_action(&mut self) {
        self.quiet_sec = 0.0;
        self.stop();
    }

    pub fn tick(&mut self, dt: f32, out: &mut Vec<SequencedNote>) {
        let dt = dt.max(0.0);
        if !self.active {
            self.quiet_sec += dt;
            if self.auto_start && self.quiet_sec >= self.params.ambient_idle_sec {
                self.start();
            } else {
                return;
            }
        }
        self.countdown -= dt;
        if self.countdown > 0.0 {
            return;
        }
        self.play_step(out);
        let span = (self.params.ambient_max_step_sec - self.params.ambient_min_step_sec).max(0.0);
        self.countdown = self.params.ambient_min_step_sec + self.rng.gen::<f32>() * span;
    }

    fn play_step(&mut self, out: &mut Vec<SequencedNote>) {
        self.played += 1;
        let fade_in = (self.played as f32 / 6.0).min(1.0);
        let velocity = (0.055 + self.rng.gen::<f32>() * 0.06) * fade_in;
        let degree_idx = self.rng.gen_range(0..self.scale.len());
        let octave = self.rng.gen_range(0..2) * 12;
        let midi = self.root + self.scale[degree_idx] + octave;
        out.push(SequencedNote {
            midi,
            velocity,
            sustained: self.rng.gen::<f32>() > 0.55,
            visual: true,
        });
        if self.rng.gen::<f32>() > 0.82 {
            let harmony = self.scale[(degree_idx + 2) % self.scale.len()];
            out.push(SequencedNote {
                midi: self.root + harmony + octave,
                velocity: velocity * 0.7,
                sustained: false,
                visual: false,
            });
        }
    }
}
