//! Model-free head and hand estimation from raw RGBA frames.
//!
//! Each frame is split into vertical column bins. A bin's energy is its
//! spatial contrast plus weighted temporal change against the previous frame;
//! the peak of the smoothed energy profile locates the subject. Estimates are
//! returned in the mirrored (selfie) view coordinate, 0 = left of the screen.

use crate::config::{RegionParams, TrackerParams};

/// Borrowed RGBA8 frame, row-major, no padding.
#[derive(Clone, Copy, Debug)]
pub struct FrameRef<'a> {
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
}

impl<'a> FrameRef<'a> {
    pub fn new(width: u32, height: u32, rgba: &'a [u8]) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    fn is_well_formed(&self, bins: usize) -> bool {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(4));
        bins > 0
            && expected == Some(self.rgba.len())
            && self.width as usize >= bins
            && self.height >= 2
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FastSwipe {
    /// -1 = toward the left of the view, +1 = toward the right, 0 = none yet.
    pub direction: i8,
    pub timestamp: f64,
}

impl FastSwipe {
    pub fn is_active(&self, now_sec: f64, window_sec: f32) -> bool {
        self.direction != 0 && now_sec - self.timestamp < window_sec as f64
    }
}

impl Default for FastSwipe {
    fn default() -> Self {
        Self {
            direction: 0,
            timestamp: f64::NEG_INFINITY,
        }
    }
}

/// Snapshot of everything the tracker knows. All scalars are in `[0, 1]`.
///
/// Fields:
/// - `head_x`: smoothed horizontal head position
/// - `head_confidence`: 0.1 when the frame is too flat to trust, up to 1
/// - `hand_knob1`: smoothed horizontal hand position (lower half of frame)
/// - `hand_knob2`: smoothed amount of hand motion
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureState {
    pub head_x: f32,
    pub head_confidence: f32,
    pub hand_knob1: f32,
    pub hand_knob2: f32,
    pub fast_swipe: FastSwipe,
}

impl Default for GestureState {
    fn default() -> Self {
        Self {
            head_x: 0.5,
            head_confidence: 0.0,
            hand_knob1: 0.5,
            hand_knob2: 0.0,
            fast_swipe: FastSwipe::default(),
        }
    }
}

struct PrevFrame {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

pub struct MotionTracker {
    params: TrackerParams,
    prev: Option<PrevFrame>,
    last_analysis: Option<f64>,
    prev_hand_raw: Option<(f32, f64)>,
    state: GestureState,
}

impl MotionTracker {
    pub fn new(params: TrackerParams) -> Self {
        for (name, region) in [("head", &params.head), ("hand", &params.hand)] {
            if region.kernel.len() % 2 == 0 {
                log::warn!(
                    "[motion] {name} kernel has even length {}; estimates shift by half a bin",
                    region.kernel.len()
                );
            }
        }
        if params.bins == 0 {
            log::warn!("[motion] zero column bins; every frame will be dropped");
        }
        Self {
            params,
            prev: None,
            last_analysis: None,
            prev_hand_raw: None,
            state: GestureState::default(),
        }
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    /// Last published snapshot.
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Forget history and return to the neutral gesture (device lost).
    pub fn reset(&mut self) {
        self.prev = None;
        self.last_analysis = None;
        self.prev_hand_raw = None;
        self.state = GestureState::default();
    }

    /// Analyse `frame` unless the previous analysis was less than the
    /// configured interval ago. Returns `None` when throttled or when the
    /// buffer does not match its declared size.
    pub fn process(&mut self, frame: FrameRef<'_>, now_sec: f64) -> Option<GestureState> {
        if let Some(last) = self.last_analysis {
            if now_sec - last < self.params.interval_sec {
                return None;
            }
        }
        if !frame.is_well_formed(self.params.bins) {
            log::debug!(
                "[motion] dropping malformed frame {}x{} ({} bytes)",
                frame.width,
                frame.height,
                frame.rgba.len()
            );
            return None;
        }
        self.last_analysis = Some(now_sec);

        let prev = match &self.prev {
            Some(p) if p.width == frame.width && p.height == frame.height => Some(p.rgba.as_slice()),
            _ => None,
        };

        let p = &self.params;
        let head = column_energy(frame, prev, &p.head, p.bins, p.stride);
        let hand = column_energy(frame, prev, &p.hand, p.bins, p.stride);

        // head
        let smoothed = smooth_bins(&head.energy, &p.head.kernel);
        let raw_head = 1.0 - peak_centroid(&smoothed, p.centroid_radius);
        let total: f32 = head.energy.iter().sum();
        let floor = p.bins as f32 * p.head_floor_per_bin;
        let (conf, rate) = if total > floor {
            let conf = (total / (floor * 5.0)).min(1.0);
            (conf, p.head_base_rate + conf * p.head_conf_rate)
        } else {
            (p.low_confidence, p.low_confidence_rate)
        };
        self.state.head_x += (raw_head - self.state.head_x) * rate;
        self.state.head_x = self.state.head_x.clamp(0.0, 1.0);
        self.state.head_confidence = conf;

        // hand
        let smoothed = smooth_bins(&hand.energy, &p.hand.kernel);
        let raw_hand = 1.0 - peak_centroid(&smoothed, p.centroid_radius);
        if let Some((prev_raw, prev_t)) = self.prev_hand_raw {
            let dt = now_sec - prev_t;
            if dt > 0.0 && dt <= p.swipe_max_gap_sec {
                let vel = (raw_hand - prev_raw) / dt as f32;
                if vel.abs() >= p.swipe_velocity {
                    self.state.fast_swipe = FastSwipe {
                        direction: if vel > 0.0 { 1 } else { -1 },
                        timestamp: now_sec,
                    };
                }
            }
        }
        self.prev_hand_raw = Some((raw_hand, now_sec));
        self.state.hand_knob1 += (raw_hand - self.state.hand_knob1) * p.hand_position_rate;
        self.state.hand_knob1 = self.state.hand_knob1.clamp(0.0, 1.0);
        let motion = (hand.motion / (p.bins as f32 * p.hand_motion_per_bin)).min(1.0);
        self.state.hand_knob2 += (motion - self.state.hand_knob2) * p.hand_motion_rate;

        match &mut self.prev {
            Some(pf) if pf.width == frame.width && pf.height == frame.height => {
                pf.rgba.copy_from_slice(frame.rgba);
            }
            _ => {
                self.prev = Some(PrevFrame {
                    width: frame.width,
                    height: frame.height,
                    rgba: frame.rgba.to_vec(),
                });
            }
        }
        Some(self.state)
    }
}

struct BinEnergy {
    energy: Vec<f32>,
    /// Weighted temporal component alone, summed over all bins.
    motion: f32,
}

#[inline]
fn rgb_diff(a: &[u8], i: usize, b: &[u8], j: usize) -> f32 {
    (a[i] as f32 - b[j] as f32).abs()
        + (a[i + 1] as f32 - b[j + 1] as f32).abs()
        + (a[i + 2] as f32 - b[j + 2] as f32).abs()
}

fn column_energy(
    frame: FrameRef<'_>,
    prev: Option<&[u8]>,
    region: &RegionParams,
    bins: usize,
    stride: usize,
) -> BinEnergy {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let data = frame.rgba;
    let stride = stride.max(1);
    let col_w = w / bins;
    let y_start = (h as f32 * region.row_start).floor() as usize;
    let y_end = ((h as f32 * region.row_end).floor() as usize).min(h);
    let mut energy = vec![0.0f32; bins];
    let mut motion = 0.0f32;
    for (c, e) in energy.iter_mut().enumerate() {
        let x0 = c * col_w;
        let x1 = (x0 + col_w).min(w);
        let mut acc = 0.0f32;
        for y in (y_start..y_end).step_by(stride) {
            for x in (x0..x1).step_by(stride) {
                let i = (y * w + x) * 4;
                if x + stride < x1 && y + stride < y_end {
                    let right = (y * w + x + stride) * 4;
                    let below = ((y + stride) * w + x) * 4;
                    acc += rgb_diff(data, i, data, right);
                    acc += rgb_diff(data, i, data, below);
                }
                if let Some(prev) = prev {
                    let m = rgb_diff(data, i, prev, i) * region.motion_weight;
                    acc += m;
                    motion += m;
                }
            }
        }
        *e = acc;
    }
    BinEnergy { energy, motion }
}

/// Convolve with a symmetric kernel centred on each bin; out-of-range taps
/// are dropped.
fn smooth_bins(energy: &[f32], kernel: &[f32]) -> Vec<f32> {
    let half = kernel.len() as isize / 2;
    let n = energy.len() as isize;
    (0..n)
        .map(|c| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    let idx = c + k as isize - half;
                    (0..n).contains(&idx).then(|| energy[idx as usize] * w)
                })
                .sum()
        })
        .collect()
}

/// Weighted centroid of bin centres within `radius` of the peak, normalised
/// to `[0, 1]`. An all-zero profile yields the centre.
fn peak_centroid(smoothed: &[f32], radius: usize) -> f32 {
    let n = smoothed.len();
    if n == 0 {
        return 0.5;
    }
    let mut peak = n / 2;
    let mut peak_val = 0.0f32;
    for (c, &v) in smoothed.iter().enumerate() {
        if v > peak_val {
            peak_val = v;
            peak = c;
        }
    }
    let lo = peak.saturating_sub(radius);
    let hi = (peak + radius).min(n - 1);
    let mut w_sum = 0.0f32;
    let mut w_total = 0.0f32;
    for (c, &v) in smoothed.iter().enumerate().take(hi + 1).skip(lo) {
        w_sum += v * (c as f32 + 0.5);
        w_total += v;
    }
    if w_total > 0.0 {
        (w_sum / w_total / n as f32).clamp(0.0, 1.0)
    } else {
        0.5
    }
}
