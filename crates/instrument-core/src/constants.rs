// Shared tuning constants for the instrument core and its front-ends.

// Playing surface
pub const GRID_COLS: usize = 12;
pub const GRID_ROWS: usize = 3;
pub const BASE_MIDI: i32 = 48; // C3, bottom row
pub const COL_TO_SEMITONE: [i32; GRID_COLS] = [0, 0, 2, 4, 5, 7, 7, 9, 11, 11, 0, 0];
pub const NATURAL_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

// Cell -> world mapping
pub const CELL_SPAN_X: f32 = 3.0; // total width covered by the 12 columns
pub const CELL_TOP_Y: f32 = 0.6;
pub const CELL_SPAN_Y: f32 = 1.2;

// Field
pub const FIELD_WIDTH: u32 = 128; // particles per side, N*N total
pub const BOX_HALF: f32 = 1.22; // position bound per axis
pub const MAX_SPEED: f32 = 0.07; // velocity bound per axis
pub const SPAWN_FRACTION: f32 = 0.9; // initial cloud fills 90% of the box
pub const SPAWN_SPEED: f32 = 0.01;
pub const REFERENCE_DT: f32 = 1.0 / 60.0; // per-frame constants are tuned at 60 Hz
pub const FALLBACK_POINTS: usize = 4000;

// Attractor
pub const CELL_STRENGTH: f32 = 1.2;
pub const DRUM_STRENGTH: f32 = 1.1;
pub const BURST_STRENGTH: f32 = 2.5; // double-tap
pub const ATTRACTOR_RETENTION: f32 = 0.92; // per reference frame
pub const ATTRACTOR_ACTIVE: f32 = 0.05;

// Triggers
pub const NOTE_MIX_TARGET: f32 = 0.88;
pub const DRUM_MIX_TARGET: f32 = 0.75;
pub const CHORD_MIX_STEP: f32 = 0.04;
pub const CHORD_BOOST_STEP: f32 = 0.15;
pub const CHORD_BOOST_MAX: f32 = 1.75;
pub const CHORD_CONTRAST_MAX: f32 = 2.5;
pub const SPARKLE_NOTES: [i32; 7] = [84, 86, 88, 89, 91, 93, 95];
pub const SPARKLE_VELOCITY: f32 = 0.18;
pub const SUSTAIN_CLASSES: [i32; 4] = [0, 2, 4, 5]; // pitch classes that ring on by default

// Flash durations (seconds)
pub const SPARKLE_SEC: f32 = 0.55;
pub const DOUBLE_TAP_SEC: f32 = 0.4;
pub const SWIPE_SEC: f32 = 0.45;

// Pad swell for big chords
pub const PAD_CHORD_SIZE: usize = 5;
pub const PAD_DECAY: f32 = 0.96; // per tick
pub const PAD_HOLD_FLOOR: f32 = 0.55;

// Idle
pub const IDLE_REST_SEC: f32 = 2.5;
pub const IDLE_BUILD_RATE: f32 = 0.018; // per tick
pub const IDLE_CAP: f32 = 0.38;
pub const IDLE_HOLD_SEC: f32 = 5.0;
pub const IDLE_DECAY_RATE: f32 = 0.022; // per tick
pub const IDLE_INTERRUPT_RETENTION: f32 = 0.92;

// Tracking
pub const TRACK_BINS: usize = 16;
pub const TRACK_INTERVAL_SEC: f64 = 0.033; // ~30 Hz
pub const FAST_SWIPE_VEL: f32 = 0.22; // normalized width per second

// Camera
pub const BASE_FOV_DEG: f32 = 52.0;
pub const ZOOM_MIN: f32 = 0.4;
pub const ZOOM_MAX: f32 = 2.5;
pub const ZOOM_STEP: f32 = 0.05;

// Audio
pub const MIC_GATE: f32 = 0.012;
pub const MIC_VISUAL_SCALE: f32 = 0.65;
pub const ARP_BPM: f32 = 140.0;
pub const AMBIENT_IDLE_SEC: f32 = 22.0;
