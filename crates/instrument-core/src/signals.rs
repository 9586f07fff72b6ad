//! Conditioning for continuous inputs before they reach the compositor.

use crate::constants::MIC_GATE;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Spectrum levels of the audio output, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioLevels {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub energy: f32,
}

impl AudioLevels {
    /// Split magnitude bins (each `0..=1`, low to high frequency) into three
    /// bands: the lowest 15% of bins, up to 50%, and the rest.
    pub fn from_spectrum(bins: &[f32]) -> Self {
        let n = bins.len();
        let bass_end = n * 15 / 100;
        let mid_end = n / 2;
        let mean = |s: &[f32]| {
            if s.is_empty() {
                0.0
            } else {
                (s.iter().sum::<f32>() / s.len() as f32).clamp(0.0, 1.0)
            }
        };
        Self::from_bands(
            mean(&bins[..bass_end]),
            mean(&bins[bass_end..mid_end]),
            mean(&bins[mid_end..]),
        )
    }

    pub fn from_bands(bass: f32, mid: f32, treble: f32) -> Self {
        Self {
            bass,
            mid,
            treble,
            energy: bass * 0.5 + mid * 0.3 + treble * 0.2,
        }
    }
}

/// Microphone loudness: RMS, noise gate, one-pole smoothing.
#[derive(Clone, Debug)]
pub struct MicMeter {
    gate: f32,
    smoothing: f32,
    level: f32,
}

impl MicMeter {
    pub fn new(gate: f32, smoothing: f32) -> Self {
        Self {
            gate,
            smoothing,
            level: 0.0,
        }
    }

    /// Feed one block of samples in `[-1, 1]`; returns the smoothed level.
    pub fn push_samples(&mut self, samples: &[f32]) -> f32 {
        self.push_rms(rms(samples))
    }

    /// Feed an already computed RMS value.
    pub fn push_rms(&mut self, raw: f32) -> f32 {
        let gated = if raw < self.gate { 0.0 } else { raw.min(1.0) };
        self.level += (gated - self.level) * self.smoothing;
        self.level
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

impl Default for MicMeter {
    fn default() -> Self {
        Self::new(MIC_GATE, 0.11)
    }
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Pointer speed in pixels per move, decaying while the pointer is still.
#[derive(Clone, Debug, Default)]
pub struct PointerTracker {
    last: Option<(f32, f32)>,
    velocity: f32,
}

impl PointerTracker {
    pub fn moved(&mut self, x: f32, y: f32) {
        if let Some((lx, ly)) = self.last {
            let (dx, dy) = (x - lx, y - ly);
            self.velocity = (dx * dx + dy * dy).sqrt();
        }
        self.last = Some((x, y));
    }

    pub fn left(&mut self) {
        self.last = None;
    }

    pub fn tick(&mut self) {
        self.velocity *= 0.9;
    }

    /// `0..=1`, saturating at 50 px per move.
    pub fn intensity(&self) -> f32 {
        (self.velocity / 50.0).min(1.0)
    }
}

/// Single-slot `f32` mailbox between threads. Writers overwrite, readers
/// never block and always see the most recent value.
#[derive(Clone, Debug, Default)]
pub struct SharedLevel {
    bits: Arc<AtomicU32>,
}

impl SharedLevel {
    pub fn new(value: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}
