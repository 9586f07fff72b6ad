// Host-side integration tests for smoothing, chord blending and composition.

use instrument_core::*;

fn fusion() -> ParameterFusion {
    ParameterFusion::new(SmoothingRates::default(), FusionParams::default())
}

#[test]
fn smoothing_step_is_bounded_by_rate_times_gap() {
    let rates = SmoothingRates::default();
    let mut f = fusion();
    f.apply_profile(&KEY_PROFILES[8], 0.88);
    f.set_rotation_target(0.3);
    for _ in 0..40 {
        let before = *f.current();
        let target = *f.target();
        f.smooth();
        let after = *f.current();
        let checks = [
            ("folds", before.folds, after.folds, target.folds, rates.folds),
            ("mix", before.mix, after.mix, target.mix, rates.mix),
            ("rotation", before.rotation, after.rotation, target.rotation, rates.rotation),
            ("bloom", before.bloom, after.bloom, target.bloom, rates.bloom),
            ("glitch", before.glitch, after.glitch, target.glitch, rates.glitch),
            ("contrast", before.contrast, after.contrast, target.contrast, rates.contrast),
        ];
        for (name, b, a, t, r) in checks {
            let gap = (t - b).abs();
            assert!(
                (a - b).abs() <= r * gap + 1e-6,
                "{name} stepped {} for gap {gap} at rate {r}",
                (a - b).abs()
            );
            assert!((t - a).abs() <= gap + 1e-6, "{name} moved away from its target");
        }
    }
}

#[test]
fn rates_differ_so_parameters_do_not_move_in_lockstep() {
    let r = SmoothingRates::default();
    assert!(r.rotation > r.folds);
    assert!(r.mirror > r.folds);
    assert!(r.bloom < r.folds);
    assert!(r.bloom < r.spiral);
}

#[test]
fn single_trigger_converges_partially_not_instantly() {
    let mut f = fusion();
    f.apply_profile(&KEY_PROFILES[3], 0.88);
    assert_eq!(f.target().folds, 24.0);
    assert_eq!(f.current().folds, 6.0, "targets must not leak into current");
    for _ in 0..30 {
        f.smooth();
    }
    let folds = f.current().folds;
    assert!(folds > 6.0 && folds < 24.0, "folds {folds}");
}

#[test]
fn chord_of_identical_profiles_equals_the_profile() {
    let p = KEY_PROFILES[5];
    let blend = blend_profiles([&p, &p, &p]).expect("blend");
    let pairs = [
        (blend.folds, p.folds),
        (blend.hue, p.hue),
        (blend.bloom, p.bloom),
        (blend.chromatic, p.chromatic),
        (blend.spiral, p.spiral),
        (blend.flow, p.flow),
        (blend.wave, p.wave),
        (blend.contrast, p.contrast),
        (blend.mirror_x, p.mirror_x),
        (blend.mirror_y, p.mirror_y),
    ];
    for (got, want) in pairs {
        assert!((got - want).abs() < 1e-5, "{got} != {want}");
    }
}

#[test]
fn chord_mirror_takes_max_and_other_fields_the_mean() {
    let a = KeyProfile {
        mirror_x: 0.0,
        mirror_y: 1.0,
        folds: 4.0,
        hue: 0.2,
        ..KeyProfile::default()
    };
    let b = KeyProfile {
        mirror_x: 1.0,
        mirror_y: 0.0,
        folds: 8.0,
        hue: 0.6,
        ..KeyProfile::default()
    };
    let blend = blend_profiles([&a, &b]).expect("blend");
    assert_eq!(blend.mirror_x, 1.0);
    assert_eq!(blend.mirror_y, 1.0);
    assert!((blend.folds - 6.0).abs() < 1e-6);
    assert!((blend.hue - 0.4).abs() < 1e-6);
    assert!(blend_profiles(std::iter::empty()).is_none());
}

#[test]
fn chord_boost_grows_with_notes_and_is_capped() {
    let params = FusionParams::default();
    assert_eq!(chord_boost(1, &params), 1.0);
    let mut prev = 1.0;
    for n in 2..12 {
        let b = chord_boost(n, &params);
        assert!(b >= prev);
        assert!(b <= params.chord_boost_max);
        prev = b;
    }
    assert_eq!(chord_boost(20, &params), params.chord_boost_max);

    let blend = blend_profiles([&KEY_PROFILES[1], &KEY_PROFILES[4], &KEY_PROFILES[9]]).expect("blend");
    let chord = chord_targets(&blend, 3, &params);
    let boost = 1.3;
    assert!((chord.profile.glitch - blend.glitch * boost).abs() < 1e-5);
    assert!((chord.profile.warp - blend.warp * boost).abs() < 1e-5);
    assert!(chord.profile.contrast <= params.contrast_max);
    assert_eq!(chord.profile.folds, blend.folds, "folds are not boosted");
    assert!((chord.mix - 0.96).abs() < 1e-6);

    let big = chord_targets(&blend, 9, &params);
    assert_eq!(big.mix, 1.0);
}

#[test]
fn apply_chord_needs_two_profiles() {
    let mut f = fusion();
    let before = *f.target();
    assert!(!f.apply_chord([&KEY_PROFILES[2]]));
    assert_eq!(*f.target(), before);
    assert!(f.apply_chord([&KEY_PROFILES[2], &KEY_PROFILES[7]]));
    assert_eq!(f.target().mirror_x, 1.0);
    assert!((f.target().folds - 5.0).abs() < 1e-6);
}

#[test]
fn relax_decays_motion_targets_and_floors_mix() {
    let mut f = fusion();
    f.apply_profile(&KEY_PROFILES[6], 0.88);
    let glitch = f.target().glitch;
    f.relax();
    assert!((f.target().glitch - glitch * 0.995).abs() < 1e-6);
    assert_eq!(f.target().folds, KEY_PROFILES[6].folds, "folds do not relax");
    for _ in 0..5000 {
        f.relax();
    }
    assert!((f.target().mix - 0.1).abs() < 1e-6);
    assert!(f.target().glitch < 1e-3);
}

#[test]
fn compose_adds_signals_as_offsets() {
    let f = fusion();
    let quiet = f.compose(&ComposeInputs {
        held: 1,
        mic_visual_scale: MIC_VISUAL_SCALE,
        ..ComposeInputs::default()
    });
    let c = f.current();
    assert!((quiet.bloom - c.bloom).abs() < 1e-6);
    assert!((quiet.glitch - c.glitch).abs() < 1e-6);
    assert_eq!(quiet.texture_mix, 0.0);

    let loud = ComposeInputs {
        held: 1,
        audio: AudioLevels::from_bands(0.8, 0.5, 0.4),
        mic: 0.5,
        mic_visual_scale: MIC_VISUAL_SCALE,
        touch: 1.0,
        double_flash: 1.0,
        gesture: GestureInputs {
            knob1: 1.0,
            knob2: 1.0,
            swipe_active: true,
        },
        ..ComposeInputs::default()
    };
    let out = f.compose(&loud);
    assert!((loud.bass_hit() - 1.0).abs() < 1e-6);
    assert!(out.bloom > quiet.bloom + 2.0);
    // glitch: flash 0.5 + bass 0.4 + swipe 0.7
    assert!((out.glitch - (c.glitch + 1.6)).abs() < 1e-5);
    assert!((out.contrast - (c.contrast + 0.7)).abs() < 1e-5);
    assert!((loud.field_strength(1.0) - (1.0 + 0.8 + 0.5 * 0.325)).abs() < 1e-5);
}

#[test]
fn render_params_upload_as_whole_vec4s() {
    assert_eq!(std::mem::size_of::<RenderParams>() % 16, 0);
}
