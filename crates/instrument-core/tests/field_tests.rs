// Host-side integration tests for the particle field and its backends.

use glam::Vec3;
use instrument_core::*;
use rand::prelude::*;

fn small_params(width: u32) -> FieldParams {
    FieldParams {
        width,
        ..FieldParams::default()
    }
}

#[test]
fn positions_and_velocities_stay_bounded_for_any_dt_sequence() {
    let params = small_params(16);
    let mut sim = FieldSimulation::new(CpuBackend::new(), params.clone(), 7).expect("cpu sim");
    let mut rng = StdRng::seed_from_u64(99);
    let corners = [
        Vec3::splat(1.2),
        Vec3::new(-1.2, 1.2, -1.2),
        Vec3::ZERO,
        Vec3::new(0.5, -1.2, 1.2),
    ];
    for i in 0..400 {
        let dt = if i % 97 == 0 {
            5.0 // long stall
        } else {
            rng.gen_range(0.0005..0.2)
        };
        let u = StepUniforms {
            attractor: corners[i % corners.len()],
            strength: rng.gen_range(0.0..3.0),
            tag: Cell {
                col: i % GRID_COLS,
                row: i % GRID_ROWS,
            },
            flow_time: i as f32 * 0.1,
            dt,
        };
        sim.step_uniforms(&u).expect("step");
        let field = sim.backend().field().expect("seeded");
        for (p, v) in field.positions().iter().zip(field.velocities()) {
            assert!(
                p.abs().max_element() <= params.box_half + 1e-6,
                "position {p:?} escaped the box at step {i}"
            );
            assert!(
                v.abs().max_element() <= params.max_speed + 1e-6,
                "velocity {v:?} exceeded the bound at step {i}"
            );
        }
    }
    assert_eq!(sim.steps(), 400);
}

#[test]
fn particle_converges_toward_attractor_without_curl() {
    let params = FieldParams {
        curl_gain: 0.0,
        ..small_params(1)
    };
    let start = Vec3::new(0.6, 0.4, -0.3);
    let field = GridField::from_state(1, vec![start], vec![Vec3::ZERO]);
    let mut sim = FieldSimulation::with_field(CpuBackend::new(), params, &field).expect("sim");
    let u = StepUniforms {
        attractor: Vec3::ZERO,
        strength: 1.2,
        tag: Cell { col: 3, row: 1 },
        flow_time: 0.0,
        dt: 1.0 / 60.0,
    };
    let mut prev = start.length();
    for step in 0..1000 {
        sim.step_uniforms(&u).expect("step");
        let d = sim.backend().field().expect("field").positions()[0].length();
        assert!(
            d <= prev + 3e-3,
            "distance grew from {prev} to {d} at step {step}"
        );
        prev = d;
    }
    assert!(prev < 0.02, "particle did not reach the attractor: {prev}");
}

#[test]
fn position_integrates_previous_velocity() {
    let params = small_params(1);
    let start = Vec3::new(0.3, 0.0, 0.0);
    let field = GridField::from_state(1, vec![start], vec![Vec3::ZERO]);
    let mut sim = FieldSimulation::with_field(CpuBackend::new(), params, &field).expect("sim");
    let mut attractor = Attractor::default();
    attractor.trigger(Vec3::ZERO, 1.2, Cell { col: 0, row: 1 });
    sim.step(1.0 / 60.0, &attractor, 0.0).expect("step");
    let f = sim.backend().field().expect("field");
    assert_eq!(f.positions()[0], start, "first step must use the old (zero) velocity");
    assert!(f.velocities()[0].x < 0.0, "velocity should point at the attractor");
    sim.step(1.0 / 60.0, &attractor, 0.0).expect("step");
    let f = sim.backend().field().expect("field");
    assert!(f.positions()[0].x < start.x);
}

#[test]
fn zero_dt_leaves_state_unchanged() {
    let params = small_params(4);
    let mut sim = FieldSimulation::new(CpuBackend::new(), params, 3).expect("sim");
    let before = sim.backend().field().expect("field").positions().to_vec();
    let u = StepUniforms {
        attractor: Vec3::ONE,
        strength: 2.0,
        dt: 0.0,
        ..StepUniforms::default()
    };
    sim.step_uniforms(&u).expect("step");
    assert_eq!(sim.backend().field().expect("field").positions(), &before[..]);
}

#[test]
fn same_seed_and_inputs_are_deterministic() {
    let run = || {
        let mut sim = FieldSimulation::new(CpuBackend::new(), small_params(8), 42).expect("sim");
        let mut attractor = Attractor::default();
        attractor.trigger(Cell { col: 5, row: 0 }.position(), 1.2, Cell { col: 5, row: 0 });
        for i in 0..50 {
            sim.step(1.0 / 60.0, &attractor, i as f32 / 60.0).expect("step");
            attractor.decay(1.0 / 60.0);
        }
        sim.backend().field().expect("field").positions().to_vec()
    };
    assert_eq!(run(), run());
}

#[test]
fn seeded_cloud_starts_inside_spawn_volume() {
    let field = GridField::seeded(32, BOX_HALF, 11);
    assert_eq!(field.len(), 32 * 32);
    let limit = BOX_HALF * 0.9 + 1e-6;
    for p in field.positions() {
        assert!(p.abs().max_element() <= limit);
    }
    for v in field.velocities() {
        assert!(v.abs().max_element() <= 0.01 + 1e-6);
    }
}

#[test]
fn unsupported_grid_negotiates_fallback_cloud() {
    let mode = FieldMode::negotiate(CpuBackend::with_limit(100), small_params(16), 5);
    assert!(!mode.is_simulated());
    match mode {
        FieldMode::Fallback(cloud) => {
            assert_eq!(cloud.points().len(), FALLBACK_POINTS);
            for p in cloud.points() {
                assert!(p.abs().max_element() <= BOX_HALF * 0.9 + 1e-6);
            }
        }
        FieldMode::Simulated(_) => panic!("expected fallback"),
    }
    let err = FieldSimulation::new(CpuBackend::with_limit(100), small_params(16), 5)
        .err()
        .expect("capability error");
    assert!(matches!(err, CoreError::CapabilityUnavailable(_)));
}

struct FlakyBackend {
    fail_after: u32,
    steps: u32,
}

impl SimulationBackend for FlakyBackend {
    fn label(&self) -> &str {
        "flaky"
    }
    fn supports_grid(&self, _width: u32) -> bool {
        true
    }
    fn seed(&mut self, _field: &GridField) -> CoreResult<()> {
        Ok(())
    }
    fn step(&mut self, _u: &StepUniforms, _p: &FieldParams) -> CoreResult<()> {
        self.steps += 1;
        if self.steps > self.fail_after {
            Err(CoreError::TransientRenderFailure("device lost".into()))
        } else {
            Ok(())
        }
    }
}

#[test]
fn runtime_step_failure_degrades_to_fallback() {
    let backend = FlakyBackend {
        fail_after: 2,
        steps: 0,
    };
    let mut mode = FieldMode::negotiate(backend, small_params(4), 1);
    assert!(mode.is_simulated());
    let u = StepUniforms {
        dt: 1.0 / 60.0,
        ..StepUniforms::default()
    };
    assert!(mode.step(&u).is_none());
    assert!(mode.step(&u).is_none());
    let err = mode.step(&u).expect("third step fails");
    assert!(matches!(err, CoreError::TransientRenderFailure(_)));
    assert!(!mode.is_simulated());
    // the degraded cloud keeps the session seed
    let expected = FallbackCloud::new(FALLBACK_POINTS, small_params(4).box_half, 1);
    match &mode {
        FieldMode::Fallback(cloud) => assert_eq!(cloud.points(), expected.points()),
        FieldMode::Simulated(_) => panic!("expected fallback"),
    }
    // further steps are harmless no-ops
    assert!(mode.step(&u).is_none());
}

#[test]
fn gpu_uniform_block_is_vec4_aligned() {
    assert_eq!(std::mem::size_of::<FieldUniforms>(), 64);
    let params = FieldParams::default();
    let u = StepUniforms {
        attractor: Vec3::new(0.1, 0.2, 0.3),
        strength: 1.5,
        tag: Cell { col: 4, row: 2 },
        flow_time: 9.0,
        dt: 1.0 / 30.0,
    };
    let g = FieldUniforms::new(&u, &params);
    assert_eq!(g.attractor, [0.1, 0.2, 0.3, 1.5]);
    assert_eq!(g.flow[1], 4.0);
    assert_eq!(g.flow[2], 2.0);
    assert!((g.flow[3] - 2.0).abs() < 1e-5);
    assert_eq!(g.forces[2], (params.width * params.width) as f32);
}

#[test]
fn curl_is_bounded_and_row_biased() {
    let mut max = 0.0f32;
    for i in 0..200 {
        let p = Vec3::new((i as f32 * 0.37).sin(), (i as f32 * 0.11).cos(), i as f32 * 0.01 - 1.0);
        let c = curl(p, i as f32 * 0.05, Cell { col: i % 12, row: 1 });
        max = max.max(c.abs().max_element());
    }
    assert!(max <= 0.0101, "curl magnitude {max}");
    let top = curl(Vec3::ZERO, 0.0, Cell { col: 0, row: 0 });
    let bottom = curl(Vec3::ZERO, 0.0, Cell { col: 0, row: 2 });
    assert!((bottom.y - top.y - 0.02).abs() < 1e-6);
}
