// Host-side integration tests for the idle swell state machine.

use instrument_core::*;

const DT: f32 = 1.0 / 60.0;

fn run_idle(engine: &mut IdleEngine, seconds: f32) {
    let ticks = (seconds / DT).ceil() as usize;
    for _ in 0..ticks {
        engine.update(DT, 0, false);
    }
}

#[test]
fn rest_becomes_build_after_rest_period() {
    let mut idle = IdleEngine::default();
    run_idle(&mut idle, IDLE_REST_SEC - 0.1);
    assert_eq!(idle.phase(), IdlePhase::Rest);
    assert_eq!(idle.intensity(), 0.0);
    run_idle(&mut idle, 0.2);
    assert_eq!(idle.phase(), IdlePhase::Build);
}

#[test]
fn full_cycle_build_hold_decay_rest() {
    let mut idle = IdleEngine::default();
    run_idle(&mut idle, IDLE_REST_SEC + 0.05);
    assert_eq!(idle.phase(), IdlePhase::Build);

    let mut ticks = 0;
    while idle.phase() == IdlePhase::Build {
        idle.update(DT, 0, false);
        ticks += 1;
        assert!(idle.intensity() <= IDLE_CAP + 1e-6);
        assert!(ticks < 100, "build never finished");
    }
    assert_eq!(idle.phase(), IdlePhase::Hold);
    assert!((idle.intensity() - IDLE_CAP).abs() < 1e-6);

    run_idle(&mut idle, IDLE_HOLD_SEC + 0.05);
    assert_eq!(idle.phase(), IdlePhase::Decay);

    let mut prev = idle.intensity();
    while idle.phase() == IdlePhase::Decay {
        idle.update(DT, 0, false);
        assert!(idle.intensity() <= prev);
        prev = idle.intensity();
    }
    assert_eq!(idle.phase(), IdlePhase::Rest);
    assert_eq!(idle.intensity(), 0.0);
}

#[test]
fn activity_during_build_or_hold_returns_to_rest_and_fades() {
    for held_phase in [IdlePhase::Build, IdlePhase::Hold] {
        let mut idle = IdleEngine::default();
        run_idle(&mut idle, IDLE_REST_SEC + 0.05);
        while idle.phase() != held_phase {
            idle.update(DT, 0, false);
        }
        // make sure there is something to fade
        idle.update(DT, 0, false);
        let before = idle.intensity();
        assert!(before > 0.0);

        idle.update(DT, 1, false);
        assert_eq!(idle.phase(), IdlePhase::Rest);
        assert!(idle.intensity() < before);

        let mut prev = idle.intensity();
        for _ in 0..30 {
            idle.update(DT, 0, true);
            assert_eq!(idle.phase(), IdlePhase::Rest);
            assert!(idle.intensity() <= prev);
            prev = idle.intensity();
        }
        assert!(prev < before * 0.1);
    }
}

#[test]
fn interrupt_restarts_the_rest_timer() {
    let mut idle = IdleEngine::default();
    run_idle(&mut idle, IDLE_REST_SEC - 0.2);
    idle.interrupt();
    run_idle(&mut idle, IDLE_REST_SEC - 0.2);
    assert_eq!(idle.phase(), IdlePhase::Rest, "timer must restart after activity");
    run_idle(&mut idle, 0.3);
    assert_eq!(idle.phase(), IdlePhase::Build);
}
