//! Per-column visual presets and chord blending.

use crate::config::FusionParams;

/// Visual preset associated with one grid column.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct KeyProfile {
    pub folds: f32,
    pub hue: f32,
    pub bloom: f32,
    pub chromatic: f32,
    pub spiral: f32,
    pub flow: f32,
    pub pulse: f32,
    pub shear: f32,
    pub wave: f32,
    pub glitch: f32,
    pub mirror_x: f32,
    pub mirror_y: f32,
    pub warp: f32,
    pub contrast: f32,
}

#[allow(clippy::too_many_arguments)]
const fn kp(
    folds: f32,
    hue: f32,
    bloom: f32,
    chromatic: f32,
    spiral: f32,
    flow: f32,
    pulse: f32,
    shear: f32,
    wave: f32,
    glitch: f32,
    mirror_x: f32,
    mirror_y: f32,
    warp: f32,
    contrast: f32,
) -> KeyProfile {
    KeyProfile {
        folds,
        hue,
        bloom,
        chromatic,
        spiral,
        flow,
        pulse,
        shear,
        wave,
        glitch,
        mirror_x,
        mirror_y,
        warp,
        contrast,
    }
}

// folds, hue, bloom, ca, spiral, flow, pulse, shear, wave, glitch, mx, my, warp, contrast
pub const KEY_PROFILES: [KeyProfile; 12] = [
    kp(8.0, 0.0, 2.8, 0.012, 0.0, 0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.85),
    kp(0.0, 0.52, 0.9, 0.002, 0.0, 0.0, 0.0, 0.8, 0.0, 2.2, 0.0, 0.0, 0.2, 2.1),
    kp(4.0, 0.32, 2.2, 0.007, 1.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.15),
    kp(24.0, 0.04, 3.2, 0.016, 0.0, 0.0, 0.7, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.9),
    kp(0.0, 0.86, 0.7, 0.003, 0.0, 0.0, 0.0, 0.0, 0.6, 0.0, 1.0, 1.0, 1.6, 2.25),
    kp(12.0, 0.48, 2.4, 0.01, 0.5, 0.4, 0.0, 0.0, 0.3, 0.0, 0.0, 0.0, 0.0, 1.35),
    kp(0.0, 0.1, 1.2, 0.004, 0.0, 0.6, 0.4, 0.2, 0.0, 2.0, 0.0, 0.0, 0.8, 2.0),
    kp(6.0, 0.7, 2.6, 0.009, 0.0, 0.0, 0.5, 0.6, 0.0, 0.0, 1.0, 0.0, 0.0, 1.25),
    kp(28.0, 0.92, 3.4, 0.018, 0.3, 0.3, 0.2, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 1.65),
    kp(0.0, 0.4, 0.6, 0.002, 0.0, 0.8, 0.0, 0.4, 0.0, 1.0, 1.0, 1.0, 0.0, 2.4),
    kp(10.0, 0.58, 2.5, 0.011, 0.0, 0.0, 0.9, 0.0, 0.4, 0.0, 0.0, 0.0, 1.8, 1.5),
    kp(0.0, 0.18, 1.8, 0.006, 1.5, 0.2, 0.0, 0.3, 0.6, 0.7, 1.0, 0.0, 0.0, 1.95),
];

#[inline]
pub fn profile_for_column(col: usize) -> &'static KeyProfile {
    &KEY_PROFILES[col % KEY_PROFILES.len()]
}

/// Unweighted mean of every field except the mirrors, which take the max.
/// Returns `None` for an empty set.
pub fn blend_profiles<'a, I>(profiles: I) -> Option<KeyProfile>
where
    I: IntoIterator<Item = &'a KeyProfile>,
{
    let mut sum = KeyProfile::default();
    let mut n = 0usize;
    for p in profiles {
        sum.folds += p.folds;
        sum.hue += p.hue;
        sum.bloom += p.bloom;
        sum.chromatic += p.chromatic;
        sum.spiral += p.spiral;
        sum.flow += p.flow;
        sum.pulse += p.pulse;
        sum.shear += p.shear;
        sum.wave += p.wave;
        sum.glitch += p.glitch;
        sum.warp += p.warp;
        sum.contrast += p.contrast;
        sum.mirror_x = sum.mirror_x.max(p.mirror_x);
        sum.mirror_y = sum.mirror_y.max(p.mirror_y);
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let inv = 1.0 / n as f32;
    Some(KeyProfile {
        folds: sum.folds * inv,
        hue: sum.hue * inv,
        bloom: sum.bloom * inv,
        chromatic: sum.chromatic * inv,
        spiral: sum.spiral * inv,
        flow: sum.flow * inv,
        pulse: sum.pulse * inv,
        shear: sum.shear * inv,
        wave: sum.wave * inv,
        glitch: sum.glitch * inv,
        mirror_x: sum.mirror_x,
        mirror_y: sum.mirror_y,
        warp: sum.warp * inv,
        contrast: sum.contrast * inv,
    })
}

/// Multiplier for `held` simultaneous notes; 1 for a single note.
pub fn chord_boost(held: usize, params: &FusionParams) -> f32 {
    let extra = held.saturating_sub(1) as f32;
    (1.0 + extra * params.chord_boost_step).min(params.chord_boost_max)
}

/// Targets for a held chord: the blended profile with motion scalars,
/// bloom and chromatic aberration boosted and contrast capped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChordTargets {
    pub profile: KeyProfile,
    pub mix: f32,
}

pub fn chord_targets(blend: &KeyProfile, held: usize, params: &FusionParams) -> ChordTargets {
    let boost = chord_boost(held, params);
    let extra = held.saturating_sub(1) as f32;
    ChordTargets {
        profile: KeyProfile {
            bloom: blend.bloom * boost,
            chromatic: blend.chromatic * boost,
            spiral: blend.spiral * boost,
            flow: blend.flow * boost,
            pulse: blend.pulse * boost,
            shear: blend.shear * boost,
            wave: blend.wave * boost,
            glitch: blend.glitch * boost,
            warp: blend.warp * boost,
            contrast: (blend.contrast * boost).min(params.contrast_max),
            ..*blend
        },
        mix: (params.note_mix + extra * params.chord_mix_step).min(1.0),
    }
}
