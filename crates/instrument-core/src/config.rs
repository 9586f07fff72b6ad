//! Tunable parameters for every core component.
//!
//! The values in the `Default` impls are the instrument's stock feel. None of
//! them is an invariant; front-ends may override any field before building an
//! [`crate::Instrument`].

use crate::constants::*;

/// Field simulation constants.
///
/// Fields:
/// - `width`: particles per side; the grid holds `width * width` particles
/// - `box_half`: positions are clamped to `[-box_half, box_half]` per axis
/// - `max_speed`: velocities are clamped to `[-max_speed, max_speed]` per axis
/// - `damping`: velocity retention per reference frame
/// - `curl_gain`: multiplier on the curl-noise term (0 disables the flow field)
/// - `force_scale`: multiplier on the attractor force
/// - `position_scale`: velocity to position integration factor per reference frame
#[derive(Clone, Debug)]
pub struct FieldParams {
    pub width: u32,
    pub box_half: f32,
    pub max_speed: f32,
    pub damping: f32,
    pub curl_gain: f32,
    pub force_scale: f32,
    pub position_scale: f32,
    pub max_dt_scale: f32,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            width: FIELD_WIDTH,
            box_half: BOX_HALF,
            max_speed: MAX_SPEED,
            damping: 0.97,
            curl_gain: 1.0,
            force_scale: 0.14,
            position_scale: 0.02,
            max_dt_scale: 4.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AttractorParams {
    pub retention: f32,
    pub active_threshold: f32,
    pub cell_strength: f32,
    pub drum_strength: f32,
    pub burst_strength: f32,
}

impl Default for AttractorParams {
    fn default() -> Self {
        Self {
            retention: ATTRACTOR_RETENTION,
            active_threshold: ATTRACTOR_ACTIVE,
            cell_strength: CELL_STRENGTH,
            drum_strength: DRUM_STRENGTH,
            burst_strength: BURST_STRENGTH,
        }
    }
}

/// Per-tick smoothing rates in `(0, 1]`. Larger converges faster.
#[derive(Clone, Debug)]
pub struct SmoothingRates {
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
    pub mirror: f32,
    pub warp: f32,
    pub contrast: f32,
}

impl Default for SmoothingRates {
    fn default() -> Self {
        Self {
            folds: 0.095,
            mix: 0.08,
            rotation: 0.13,
            hue: 0.1,
            bloom: 0.07,
            chromatic: 0.1,
            spiral: 0.11,
            flow: 0.11,
            pulse: 0.11,
            shear: 0.11,
            wave: 0.11,
            glitch: 0.12,
            mirror: 0.13,
            warp: 0.11,
            contrast: 0.11,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdleParams {
    pub rest_sec: f32,
    pub build_rate: f32,
    pub cap: f32,
    pub hold_sec: f32,
    pub decay_rate: f32,
    pub interrupt_retention: f32,
}

impl Default for IdleParams {
    fn default() -> Self {
        Self {
            rest_sec: IDLE_REST_SEC,
            build_rate: IDLE_BUILD_RATE,
            cap: IDLE_CAP,
            hold_sec: IDLE_HOLD_SEC,
            decay_rate: IDLE_DECAY_RATE,
            interrupt_retention: IDLE_INTERRUPT_RETENTION,
        }
    }
}

/// Column-energy tracker settings for one body region.
///
/// Fields:
/// - `row_start`/`row_end`: vertical band analysed, as fractions of the frame height
/// - `kernel`: symmetric smoothing kernel applied across bins; must have odd
///   length, the centre tap sits at `len / 2`
/// - `motion_weight`: weight of the temporal difference relative to spatial contrast
#[derive(Clone, Debug)]
pub struct RegionParams {
    pub row_start: f32,
    pub row_end: f32,
    pub kernel: Vec<f32>,
    pub motion_weight: f32,
}

#[derive(Clone, Debug)]
pub struct TrackerParams {
    pub bins: usize,
    pub stride: usize,
    pub interval_sec: f64,
    pub centroid_radius: usize,
    pub head: RegionParams,
    pub hand: RegionParams,
    /// Per-bin energy below which the head estimate is treated as noise.
    pub head_floor_per_bin: f32,
    pub head_base_rate: f32,
    pub head_conf_rate: f32,
    pub low_confidence: f32,
    pub low_confidence_rate: f32,
    pub hand_position_rate: f32,
    pub hand_motion_rate: f32,
    pub hand_motion_per_bin: f32,
    pub swipe_velocity: f32,
    pub swipe_sec: f32,
    /// Largest elapsed time used for swipe velocity; longer gaps are not swipes.
    pub swipe_max_gap_sec: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            bins: TRACK_BINS,
            stride: 2,
            interval_sec: TRACK_INTERVAL_SEC,
            centroid_radius: 3,
            head: RegionParams {
                row_start: 0.05,
                row_end: 0.85,
                kernel: vec![0.5, 1.0, 2.0, 1.0, 0.5],
                motion_weight: 3.0,
            },
            hand: RegionParams {
                row_start: 0.5,
                row_end: 1.0,
                kernel: vec![1.0, 2.0, 1.0],
                motion_weight: 2.0,
            },
            head_floor_per_bin: 100.0,
            head_base_rate: 0.35,
            head_conf_rate: 0.4,
            low_confidence: 0.1,
            low_confidence_rate: 0.05,
            hand_position_rate: 0.25,
            hand_motion_rate: 0.2,
            hand_motion_per_bin: 50.0,
            swipe_velocity: FAST_SWIPE_VEL,
            swipe_sec: SWIPE_SEC,
            swipe_max_gap_sec: 0.25,
        }
    }
}

/// Chord blending and relaxation.
///
/// `chord_boost_max` caps the chord boost itself so large chords cannot run
/// away; raise it to `f32::INFINITY` for an uncapped `1 + (n - 1) * step`
/// ramp. Contrast is capped separately by `contrast_max`.
#[derive(Clone, Debug)]
pub struct FusionParams {
    pub note_mix: f32,
    pub drum_mix: f32,
    pub chord_mix_step: f32,
    pub chord_boost_step: f32,
    pub chord_boost_max: f32,
    pub contrast_max: f32,
    pub relax_mix_floor: f32,
    pub relax_mix_retention: f32,
    pub relax_motion_retention: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            note_mix: NOTE_MIX_TARGET,
            drum_mix: DRUM_MIX_TARGET,
            chord_mix_step: CHORD_MIX_STEP,
            chord_boost_step: CHORD_BOOST_STEP,
            chord_boost_max: CHORD_BOOST_MAX,
            contrast_max: CHORD_CONTRAST_MAX,
            relax_mix_floor: 0.1,
            relax_mix_retention: 0.998,
            relax_motion_retention: 0.995,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SequencerParams {
    pub arp_bpm: f32,
    pub ambient_idle_sec: f32,
    pub ambient_min_step_sec: f32,
    pub ambient_max_step_sec: f32,
}

impl Default for SequencerParams {
    fn default() -> Self {
        Self {
            arp_bpm: ARP_BPM,
            ambient_idle_sec: AMBIENT_IDLE_SEC,
            ambient_min_step_sec: 0.6,
            ambient_max_step_sec: 1.8,
        }
    }
}

/// Everything an [`crate::Instrument`] needs, grouped per component.
#[derive(Clone, Debug, Default)]
pub struct InstrumentConfig {
    pub field: FieldParams,
    pub attractor: AttractorParams,
    pub smoothing: SmoothingRates,
    pub idle: IdleParams,
    pub tracker: TrackerParams,
    pub fusion: FusionParams,
    pub sequencer: SequencerParams,
    pub seed: u64,
}
