//! Target/current parameter bank and the additive composition of live
//! signals into the final render parameters.

use crate::config::{FusionParams, SmoothingRates};
use crate::profile::{blend_profiles, chord_targets, KeyProfile};
use crate::signals::AudioLevels;

/// One value per visual parameter. Used for both the target and the
/// smoothed current bank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualParams {
    pub folds: f32,
    pub mix: f32,
    pub rotation: f32,
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

impl Default for VisualParams {
    fn default() -> Self {
        Self {
            folds: 6.0,
            mix: 0.15,
            rotation: 0.0,
            hue: 0.55,
            bloom: 1.6,
            chromatic: 0.005,
            spiral: 0.0,
            flow: 0.0,
            pulse: 0.0,
            shear: 0.0,
            wave: 0.0,
            glitch: 0.0,
            mirror_x: 0.0,
            mirror_y: 0.0,
            warp: 0.0,
            contrast: 1.0,
        }
    }
}

impl VisualParams {
    /// Copy every profile field in; `mix` and `rotation` are left alone.
    pub fn set_profile(&mut self, p: &KeyProfile) {
        self.folds = p.folds;
        self.hue = p.hue;
        self.bloom = p.bloom;
        self.chromatic = p.chromatic;
        self.spiral = p.spiral;
        self.flow = p.flow;
        self.pulse = p.pulse;
        self.shear = p.shear;
        self.wave = p.wave;
        self.glitch = p.glitch;
        self.mirror_x = p.mirror_x;
        self.mirror_y = p.mirror_y;
        self.warp = p.warp;
        self.contrast = p.contrast;
    }

    /// `(value, target, rate)` triples for every field, in declaration order.
    fn lanes<'a>(
        &'a mut self,
        target: &'a VisualParams,
        r: &SmoothingRates,
    ) -> [(&'a mut f32, f32, f32); 16] {
        [
            (&mut self.folds, target.folds, r.folds),
            (&mut self.mix, target.mix, r.mix),
            (&mut self.rotation, target.rotation, r.rotation),
            (&mut self.hue, target.hue, r.hue),
            (&mut self.bloom, target.bloom, r.bloom),
            (&mut self.chromatic, target.chromatic, r.chromatic),
            (&mut self.spiral, target.spiral, r.spiral),
            (&mut self.flow, target.flow, r.flow),
            (&mut self.pulse, target.pulse, r.pulse),
            (&mut self.shear, target.shear, r.shear),
            (&mut self.wave, target.wave, r.wave),
            (&mut self.glitch, target.glitch, r.glitch),
            (&mut self.mirror_x, target.mirror_x, r.mirror),
            (&mut self.mirror_y, target.mirror_y, r.mirror),
            (&mut self.warp, target.warp, r.warp),
            (&mut self.contrast, target.contrast, r.contrast),
        ]
    }
}

/// Owns the target and current parameter banks.
///
/// Triggers write targets; [`ParameterFusion::smooth`] moves `current` a
/// fixed fraction of the remaining distance each tick, so a step in the
/// target never appears as a step in the output.
#[derive(Clone, Debug)]
pub struct ParameterFusion {
    target: VisualParams,
    current: VisualParams,
    rates: SmoothingRates,
    params: FusionParams,
}

impl ParameterFusion {
    pub fn new(rates: SmoothingRates, params: FusionParams) -> Self {
        Self {
            target: VisualParams::default(),
            current: VisualParams::default(),
            rates,
            params,
        }
    }

    pub fn target(&self) -> &VisualParams {
        &self.target
    }

    pub fn current(&self) -> &VisualParams {
        &self.current
    }

    pub fn target_mut(&mut self) -> &mut VisualParams {
        &mut self.target
    }

    pub fn rates(&self) -> &SmoothingRates {
        &self.rates
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Single trigger: take the profile wholesale and open the kaleidoscope.
    pub fn apply_profile(&mut self, profile: &KeyProfile, mix: f32) {
        self.target.set_profile(profile);
        self.target.mix = mix;
    }

    /// Re-target from the held chord. With fewer than two profiles this is
    /// a no-op and returns `false`.
    pub fn apply_chord<'a, I>(&mut self, profiles: I) -> bool
    where
        I: IntoIterator<Item = &'a KeyProfile>,
    {
        let held: Vec<&KeyProfile> = profiles.into_iter().collect();
        if held.len() < 2 {
            return false;
        }
        let Some(blend) = blend_profiles(held.iter().copied()) else {
            return false;
        };
        let chord = chord_targets(&blend, held.len(), &self.params);
        self.target.set_profile(&chord.profile);
        self.target.mix = chord.mix;
        true
    }

    pub fn set_rotation_target(&mut self, rotation: f32) {
        self.target.rotation = rotation;
    }

    pub fn set_mix_target(&mut self, mix: f32) {
        self.target.mix = mix.clamp(0.0, 1.0);
    }

    /// One smoothing tick.
    pub fn smooth(&mut self) {
        let target = self.target;
        for (value, goal, rate) in self.current.lanes(&target, &self.rates) {
            *value += (goal - *value) * rate.clamp(0.0, 1.0);
        }
    }

    /// Let an untouched instrument drift back toward a calm state.
    pub fn relax(&mut self) {
        let p = &self.params;
        let t = &mut self.target;
        t.mix = (t.mix * p.relax_mix_retention).max(p.relax_mix_floor);
        for v in [
            &mut t.glitch,
            &mut t.spiral,
            &mut t.flow,
            &mut t.pulse,
            &mut t.shear,
            &mut t.wave,
            &mut t.warp,
        ] {
            *v *= p.relax_motion_retention;
        }
    }

    /// Add live signals on top of the smoothed bank.
    pub fn compose(&self, inputs: &ComposeInputs) -> RenderParams {
        let c = &self.current;
        let mic_visual = inputs.mic_visual();
        let audio_boost = inputs.audio.energy * 0.6 + mic_visual * 0.9;
        let bass_hit = inputs.bass_hit();
        let touch = inputs.touch;
        let flash = inputs.double_flash;
        let g = &inputs.gesture;
        let (g_warp, g_bloom, g_spiral) = (g.knob1 * 0.4, g.knob2 * 0.5, g.knob2 * 0.25);
        let g_glitch = if g.swipe_active { 0.7 } else { 0.0 };
        let focus_breath = if inputs.held == 0 {
            0.04 * (inputs.now * 0.1).sin()
        } else {
            0.0
        };
        let idle_breath = inputs.idle * (0.06 * (inputs.now * 0.15).sin() + 0.04);
        let a = &inputs.audio;

        RenderParams {
            time: inputs.now,
            folds: c.folds,
            rotation: c.rotation,
            mix: c.mix,
            hue: c.hue,
            chromatic: c.chromatic
                + touch * 0.005
                + flash * 0.008
                + bass_hit * 0.006
                + mic_visual * 0.006,
            bloom: c.bloom
                + flash * 1.5
                + touch * 0.5
                + audio_boost
                + mic_visual * 0.85
                + focus_breath
                + idle_breath
                + g_bloom,
            spiral: c.spiral + touch * 0.2 + a.treble * 0.3 + g_spiral,
            flow: c.flow + touch * 0.12,
            pulse: c.pulse + a.mid * 0.15,
            shear: c.shear + touch * 0.1,
            wave: c.wave + a.treble * 0.2,
            glitch: c.glitch + flash * 0.5 + bass_hit * 0.4 + g_glitch,
            mirror_x: c.mirror_x,
            mirror_y: c.mirror_y,
            warp: c.warp + touch * 0.15 + a.mid * 0.2 + mic_visual * 0.28 + g_warp,
            contrast: c.contrast + flash * 0.4 + bass_hit * 0.3,
            texture_mix: inputs.idle,
            sparkle: inputs.sparkle,
            pad: inputs.pad,
            burst_age: inputs.burst_age,
            _pad: [0.0; 3],
        }
    }
}

/// Gesture terms as the compositor sees them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GestureInputs {
    pub knob1: f32,
    pub knob2: f32,
    pub swipe_active: bool,
}

/// Everything [`ParameterFusion::compose`] adds on top of the smoothed bank.
///
/// Fields:
/// - `mic`: gated, smoothed microphone level
/// - `touch`: pointer intensity in `[0, 1]`
/// - `double_flash`/`sparkle`: fading one-shot envelopes in `[0, 1]`
/// - `idle`: idle intensity
/// - `held`: number of held notes
/// - `burst_age`: seconds since the last trigger
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ComposeInputs {
    pub now: f32,
    pub audio: AudioLevels,
    pub mic: f32,
    pub mic_visual_scale: f32,
    pub touch: f32,
    pub double_flash: f32,
    pub sparkle: f32,
    pub pad: f32,
    pub idle: f32,
    pub held: usize,
    pub gesture: GestureInputs,
    pub burst_age: f32,
}

impl ComposeInputs {
    #[inline]
    pub fn mic_visual(&self) -> f32 {
        self.mic * self.mic_visual_scale
    }

    /// Bass above 0.4 as a 0..1.5 hit amount.
    #[inline]
    pub fn bass_hit(&self) -> f32 {
        if self.audio.bass > 0.4 {
            (self.audio.bass - 0.4) * 2.5
        } else {
            0.0
        }
    }

    /// Attractor strength as the field sees it.
    pub fn field_strength(&self, base: f32) -> f32 {
        base + self.bass_hit() * 0.8 + self.mic_visual() * 0.5
    }
}

/// Final per-frame parameters for the image stage. Laid out for direct
/// upload as a uniform block.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderParams {
    pub time: f32,
    pub folds: f32,
    pub rotation: f32,
    pub mix: f32,
    pub hue: f32,
    pub chromatic: f32,
    pub bloom: f32,
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
    pub texture_mix: f32,
    pub sparkle: f32,
    pub pad: f32,
    pub burst_age: f32,
    pub _pad: [f32; 3],
}
