//! Double-buffered particle field advected by curl noise and the attractor.
//!
//! The per-particle update lives in two pure functions, [`velocity_step`] and
//! [`position_step`]. The CPU backend runs them directly; the WGSL kernel in
//! `shaders/field_step.wgsl` is a line-for-line port and reads the same
//! [`FieldUniforms`] block.

use crate::attractor::Attractor;
use crate::config::FieldParams;
use crate::constants::{FALLBACK_POINTS, REFERENCE_DT, SPAWN_FRACTION, SPAWN_SPEED};
use crate::error::{CoreError, CoreResult};
use crate::grid::Cell;
use glam::Vec3;
use rand::prelude::*;

/// Inputs for one simulation tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepUniforms {
    pub attractor: Vec3,
    pub strength: f32,
    pub tag: Cell,
    pub flow_time: f32,
    pub dt: f32,
}

impl StepUniforms {
    pub fn from_attractor(attractor: &Attractor, dt: f32, flow_time: f32) -> Self {
        Self {
            attractor: attractor.position,
            strength: attractor.strength,
            tag: attractor.tag,
            flow_time,
            dt,
        }
    }

    /// Number of reference frames this tick represents.
    #[inline]
    pub fn frame_scale(&self, params: &FieldParams) -> f32 {
        (self.dt / REFERENCE_DT).clamp(0.0, params.max_dt_scale)
    }
}

/// GPU mirror of [`StepUniforms`] + [`FieldParams`], packed as vec4s.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FieldUniforms {
    /// xyz = attractor position, w = strength
    pub attractor: [f32; 4],
    /// x = flow time, y = column, z = row, w = frame scale
    pub flow: [f32; 4],
    /// x = box half, y = max speed, z = damping, w = curl gain
    pub bounds: [f32; 4],
    /// x = force scale, y = position scale, z = particle count, w = grid width
    pub forces: [f32; 4],
}

impl FieldUniforms {
    pub fn new(u: &StepUniforms, params: &FieldParams) -> Self {
        let count = params.width * params.width;
        Self {
            attractor: [u.attractor.x, u.attractor.y, u.attractor.z, u.strength],
            flow: [
                u.flow_time,
                u.tag.col as f32,
                u.tag.row as f32,
                u.frame_scale(params),
            ],
            bounds: [
                params.box_half,
                params.max_speed,
                params.damping,
                params.curl_gain,
            ],
            forces: [
                params.force_scale,
                params.position_scale,
                count as f32,
                params.width as f32,
            ],
        }
    }
}

/// Ambient drift: smooth, periodic and cheap to evaluate on the GPU.
/// The active column shifts the phase and the row biases vertical drift.
pub fn curl(pos: Vec3, flow_time: f32, tag: Cell) -> Vec3 {
    let t = flow_time * 0.5;
    let phase = tag.col as f32 * 0.5;
    let row_bias = (tag.row as f32 - 1.0) * 0.01;
    Vec3::new(
        (pos.y * 1.6 + t).sin() * 0.006 + (pos.z * 2.0 + t * 0.8).cos() * 0.004,
        (pos.z * 1.6 + t * 1.1 + phase).sin() * 0.006
            + (pos.x * 2.0 + t * 0.7).cos() * 0.004
            + row_bias,
        (pos.x * 1.6 + t * 0.9 - phase * 0.3).sin() * 0.006 + (pos.y * 2.0 + t * 0.6).cos() * 0.004,
    )
}

/// Softened inverse-square pull toward the attractor.
pub fn attractor_force(pos: Vec3, attractor: Vec3, strength: f32, force_scale: f32) -> Vec3 {
    let to = attractor - pos;
    let d = to.length() + 0.02;
    let falloff = 1.0 / (d * d + 0.15);
    to.normalize_or_zero() * strength * falloff * force_scale
}

pub fn velocity_step(pos: Vec3, vel: Vec3, u: &StepUniforms, params: &FieldParams) -> Vec3 {
    let k = u.frame_scale(params);
    let drift = curl(pos, u.flow_time, u.tag) * params.curl_gain;
    let force = attractor_force(pos, u.attractor, u.strength, params.force_scale);
    let v = vel * params.damping.powf(k) + (drift + force) * k;
    v.clamp(Vec3::splat(-params.max_speed), Vec3::splat(params.max_speed))
}

/// Integrates with the velocity from the *previous* tick (front buffer).
pub fn position_step(pos: Vec3, vel_old: Vec3, u: &StepUniforms, params: &FieldParams) -> Vec3 {
    let k = u.frame_scale(params);
    let p = pos + vel_old * params.position_scale * k;
    p.clamp(Vec3::splat(-params.box_half), Vec3::splat(params.box_half))
}

/// Two ping-ponged position/velocity buffer pairs over a `width * width` grid.
#[derive(Clone, Debug)]
pub struct GridField {
    width: u32,
    positions: [Vec<Vec3>; 2],
    velocities: [Vec<Vec3>; 2],
    front: usize,
}

impl GridField {
    /// Random cloud inside 90% of the box with small random velocities.
    pub fn seeded(width: u32, box_half: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = (width * width) as usize;
        let spread = box_half * SPAWN_FRACTION;
        let mut pos = Vec::with_capacity(n);
        let mut vel = Vec::with_capacity(n);
        for _ in 0..n {
            pos.push(Vec3::new(
                rng.gen_range(-spread..=spread),
                rng.gen_range(-spread..=spread),
                rng.gen_range(-spread..=spread),
            ));
            vel.push(Vec3::new(
                rng.gen_range(-SPAWN_SPEED..=SPAWN_SPEED),
                rng.gen_range(-SPAWN_SPEED..=SPAWN_SPEED),
                rng.gen_range(-SPAWN_SPEED..=SPAWN_SPEED),
            ));
        }
        Self::from_state(width, pos, vel)
    }

    /// Build from explicit state. Missing entries are zero-filled.
    pub fn from_state(width: u32, mut positions: Vec<Vec3>, mut velocities: Vec<Vec3>) -> Self {
        let n = (width * width) as usize;
        positions.resize(n, Vec3::ZERO);
        velocities.resize(n, Vec3::ZERO);
        Self {
            width,
            positions: [positions.clone(), positions],
            velocities: [velocities.clone(), velocities],
            front: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.positions[self.front].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions[self.front]
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities[self.front]
    }

    /// Read the front buffers, write the back buffers, then swap.
    pub fn step(&mut self, u: &StepUniforms, params: &FieldParams) {
        let front = self.front;
        let (pos_front, pos_back) = split_pair(&mut self.positions, front);
        let (vel_front, vel_back) = split_pair(&mut self.velocities, front);
        for i in 0..pos_front.len() {
            let p = pos_front[i];
            let v = vel_front[i];
            vel_back[i] = velocity_step(p, v, u, params);
            pos_back[i] = position_step(p, v, u, params);
        }
        self.front = 1 - front;
    }

    /// Front buffers as vec4 rows (w = 1 for positions, 0 for velocities),
    /// the layout the GPU storage buffers use.
    pub fn to_vec4s(&self) -> (Vec<[f32; 4]>, Vec<[f32; 4]>) {
        let p = self
            .positions()
            .iter()
            .map(|v| [v.x, v.y, v.z, 1.0])
            .collect();
        let v = self
            .velocities()
            .iter()
            .map(|v| [v.x, v.y, v.z, 0.0])
            .collect();
        (p, v)
    }
}

fn split_pair(pair: &mut [Vec<Vec3>; 2], front: usize) -> (&[Vec3], &mut [Vec3]) {
    let (a, b) = pair.split_at_mut(1);
    if front == 0 {
        (a[0].as_slice(), b[0].as_mut_slice())
    } else {
        (b[0].as_slice(), a[0].as_mut_slice())
    }
}

/// Capability boundary for whatever runs the per-particle update.
pub trait SimulationBackend {
    fn label(&self) -> &str;
    /// Whether a `width * width` grid can be simulated at all.
    fn supports_grid(&self, width: u32) -> bool;
    /// Upload initial state. Called once before the first step.
    fn seed(&mut self, field: &GridField) -> CoreResult<()>;
    /// Advance exactly one tick and swap buffers.
    fn step(&mut self, uniforms: &StepUniforms, params: &FieldParams) -> CoreResult<()>;
}

/// Reference backend; also what the tests drive.
#[derive(Debug, Default)]
pub struct CpuBackend {
    max_particles: Option<usize>,
    field: Option<GridField>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that refuses grids above `max_particles`.
    pub fn with_limit(max_particles: usize) -> Self {
        Self {
            max_particles: Some(max_particles),
            field: None,
        }
    }

    pub fn field(&self) -> Option<&GridField> {
        self.field.as_ref()
    }
}

impl SimulationBackend for CpuBackend {
    fn label(&self) -> &str {
        "cpu"
    }

    fn supports_grid(&self, width: u32) -> bool {
        let n = (width as usize).saturating_mul(width as usize);
        n > 0 && self.max_particles.map_or(true, |max| n <= max)
    }

    fn seed(&mut self, field: &GridField) -> CoreResult<()> {
        self.field = Some(field.clone());
        Ok(())
    }

    fn step(&mut self, uniforms: &StepUniforms, params: &FieldParams) -> CoreResult<()> {
        match self.field.as_mut() {
            Some(f) => {
                f.step(uniforms, params);
                Ok(())
            }
            None => Err(CoreError::BackendFailure("cpu field not seeded".into())),
        }
    }
}

pub struct FieldSimulation<B> {
    backend: B,
    params: FieldParams,
    seed: u64,
    steps: u64,
}

impl<B: SimulationBackend> FieldSimulation<B> {
    /// Seed a fresh grid into `backend`. Fails with `CapabilityUnavailable`
    /// when the backend cannot hold the configured grid.
    pub fn new(mut backend: B, params: FieldParams, seed: u64) -> CoreResult<Self> {
        if !backend.supports_grid(params.width) {
            return Err(CoreError::CapabilityUnavailable(format!(
                "{} cannot simulate a {}x{} grid",
                backend.label(),
                params.width,
                params.width
            )));
        }
        let field = GridField::seeded(params.width, params.box_half, seed);
        backend.seed(&field)?;
        Ok(Self {
            backend,
            params,
            seed,
            steps: 0,
        })
    }

    /// Like [`FieldSimulation::new`] but starting from caller-provided state.
    /// The seed is 0; it only matters if the simulation later degrades.
    pub fn with_field(mut backend: B, params: FieldParams, field: &GridField) -> CoreResult<Self> {
        if !backend.supports_grid(field.width()) {
            return Err(CoreError::CapabilityUnavailable(format!(
                "{} cannot simulate a {}x{} grid",
                backend.label(),
                field.width(),
                field.width()
            )));
        }
        backend.seed(field)?;
        Ok(Self {
            backend,
            params: FieldParams {
                width: field.width(),
                ..params
            },
            seed: 0,
            steps: 0,
        })
    }

    pub fn step(&mut self, dt: f32, attractor: &Attractor, flow_time: f32) -> CoreResult<()> {
        let u = StepUniforms::from_attractor(attractor, dt, flow_time);
        self.step_uniforms(&u)
    }

    pub fn step_uniforms(&mut self, uniforms: &StepUniforms) -> CoreResult<()> {
        self.backend.step(uniforms, &self.params)?;
        self.steps += 1;
        Ok(())
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

/// Static point cloud shown when no compute path is available.
#[derive(Clone, Debug)]
pub struct FallbackCloud {
    points: Vec<Vec3>,
}

impl FallbackCloud {
    pub fn new(count: usize, box_half: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let spread = box_half * SPAWN_FRACTION;
        let points = (0..count)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-spread..=spread),
                    rng.gen_range(-spread..=spread),
                    rng.gen_range(-spread..=spread),
                )
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

/// Either a live simulation or the degraded static cloud.
pub enum FieldMode<B> {
    Simulated(FieldSimulation<B>),
    Fallback(FallbackCloud),
}

impl<B: SimulationBackend> FieldMode<B> {
    /// Try the backend; on any failure log it and fall back to the cloud.
    pub fn negotiate(backend: B, params: FieldParams, seed: u64) -> Self {
        let label = backend.label().to_string();
        let box_half = params.box_half;
        match FieldSimulation::new(backend, params, seed) {
            Ok(sim) => {
                log::info!("[field] simulating on {label}");
                FieldMode::Simulated(sim)
            }
            Err(e) => {
                log::warn!("[field] {e}; using static fallback cloud");
                FieldMode::Fallback(FallbackCloud::new(FALLBACK_POINTS, box_half, seed))
            }
        }
    }

    /// Advance the live simulation. A backend error degrades to the fallback
    /// cloud for the rest of the session and is returned for reporting.
    pub fn step(&mut self, uniforms: &StepUniforms) -> Option<CoreError> {
        let FieldMode::Simulated(sim) = self else {
            return None;
        };
        match sim.step_uniforms(uniforms) {
            Ok(()) => None,
            Err(e) => {
                log::warn!("[field] step failed: {e}; switching to fallback cloud");
                let (box_half, seed) = (sim.params().box_half, sim.seed());
                *self = FieldMode::Fallback(FallbackCloud::new(FALLBACK_POINTS, box_half, seed));
                Some(e)
            }
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, FieldMode::Simulated(_))
    }

    pub fn simulation(&self) -> Option<&FieldSimulation<B>> {
        match self {
            FieldMode::Simulated(sim) => Some(sim),
            FieldMode::Fallback(_) => None,
        }
    }
}
