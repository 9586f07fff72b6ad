use crate::config::AttractorParams;
use crate::constants::REFERENCE_DT;
use crate::grid::Cell;
use glam::Vec3;

/// The single point force acting on the field.
///
/// Every trigger overwrites it; there is no queue of pending attractors.
#[derive(Clone, Debug)]
pub struct Attractor {
    pub position: Vec3,
    pub strength: f32,
    pub tag: Cell,
    params: AttractorParams,
}

impl Attractor {
    pub fn new(params: AttractorParams) -> Self {
        Self {
            position: Vec3::ZERO,
            strength: 0.0,
            tag: Cell { col: 0, row: 1 },
            params,
        }
    }

    pub fn params(&self) -> &AttractorParams {
        &self.params
    }

    /// Replace position, strength and tag. Last writer wins.
    pub fn trigger(&mut self, position: Vec3, strength: f32, tag: Cell) {
        self.position = position;
        self.strength = strength.max(0.0);
        self.tag = tag;
    }

    /// Exponential decay toward zero, scaled so that one reference frame
    /// multiplies strength by `retention`.
    pub fn decay(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let frames = dt / REFERENCE_DT;
        self.strength = (self.strength * self.params.retention.powf(frames)).max(0.0);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.strength > self.params.active_threshold
    }
}

impl Default for Attractor {
    fn default() -> Self {
        Self::new(AttractorParams::default())
    }
}
