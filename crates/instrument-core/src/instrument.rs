//! The instrument as one explicit context object.
//!
//! Front-ends forward input through the trigger methods, call [`Instrument::tick`]
//! once per frame and hand the resulting [`FrameOutput`] to the field and the
//! renderer. Sound comes out as [`SoundEvent`]s.

use crate::attractor::Attractor;
use crate::config::InstrumentConfig;
use crate::constants::*;
use crate::error::CoreResult;
use crate::field::StepUniforms;
use crate::fusion::{ComposeInputs, GestureInputs, ParameterFusion, RenderParams};
use crate::grid::{is_sustain_note, Cell, DrumKind};
use crate::idle::{IdleEngine, IdlePhase};
use crate::motion::{FrameRef, GestureState, MotionTracker};
use crate::profile::profile_for_column;
use crate::sequencer::{AmbientPlayer, Arpeggiator, SequencedNote};
use crate::signals::{AudioLevels, MicMeter, PointerTracker};
use rand::prelude::*;
use smallvec::SmallVec;

/// Fire-and-forget command for the audio engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SoundEvent {
    NoteOn {
        midi: i32,
        velocity: f32,
        sustained: bool,
    },
    NoteOff {
        midi: i32,
    },
    Drum {
        kind: DrumKind,
    },
    /// Release every sustained voice.
    StopAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    Cell { col: usize, row: usize },
    Note { midi: i32 },
    Drum { index: usize },
}

/// How a trigger should behave. Replaces ad-hoc option bags.
///
/// Fields:
/// - `sustained`: `None` derives it (pedal or sustaining pitch class for notes, never for cells)
/// - `hold`: keep the trigger in the held set until released (chords, idle)
/// - `user`: counts as user activity (stops ambient play)
/// - `sound`: emit a sound event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerSpec {
    pub source: TriggerSource,
    pub velocity: f32,
    pub sustained: Option<bool>,
    pub hold: bool,
    pub user: bool,
    pub sound: bool,
}

impl TriggerSpec {
    fn new(source: TriggerSource, hold: bool) -> Self {
        Self {
            source,
            velocity: 0.8,
            sustained: None,
            hold,
            user: true,
            sound: true,
        }
    }

    pub fn cell(col: usize, row: usize) -> Self {
        Self::new(TriggerSource::Cell { col, row }, true)
    }

    pub fn note(midi: i32) -> Self {
        Self::new(TriggerSource::Note { midi }, true)
    }

    pub fn drum(index: usize) -> Self {
        Self::new(TriggerSource::Drum { index }, false)
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity.clamp(0.0, 1.0);
        self
    }

    pub fn sustained(mut self, on: bool) -> Self {
        self.sustained = Some(on);
        self
    }

    pub fn held(mut self, on: bool) -> Self {
        self.hold = on;
        self
    }

    /// Machine-generated (arpeggiator, ambient): not user activity, not held.
    pub fn automated(mut self) -> Self {
        self.user = false;
        self.hold = false;
        self
    }

    pub fn silent(mut self) -> Self {
        self.sound = false;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeldNote {
    pub cell: Cell,
    pub midi: i32,
    pub sustained: bool,
}

/// Where the viewer looks from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub yaw: f32,
    pub offset_x: f32,
    pub fov_deg: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            offset_x: 0.0,
            fov_deg: BASE_FOV_DEG,
        }
    }
}

/// Everything produced by one tick.
#[derive(Clone, Copy, Debug)]
pub struct FrameOutput {
    pub render: RenderParams,
    pub step: StepUniforms,
    pub camera: CameraPose,
    pub idle_phase: IdlePhase,
}

pub struct Instrument {
    config: InstrumentConfig,
    attractor: Attractor,
    fusion: ParameterFusion,
    idle: IdleEngine,
    tracker: MotionTracker,
    tracking_available: bool,
    gesture: GestureState,
    arp: Arpeggiator,
    ambient: AmbientPlayer,
    mic: MicMeter,
    mic_raw: f32,
    audio: AudioLevels,
    pointer: PointerTracker,
    held: SmallVec<[HeldNote; 8]>,
    chord_dirty: bool,
    pedal: bool,
    pedal_deferred: SmallVec<[i32; 8]>,
    pending: Vec<SoundEvent>,
    sequenced: Vec<SequencedNote>,
    now: f64,
    freeze_until: f64,
    sparkle_at: f64,
    double_tap_at: f64,
    burst_at: f64,
    pad: f32,
    zoom: f32,
    camera: CameraPose,
    rng: StdRng,
}

impl Instrument {
    pub fn new(config: InstrumentConfig) -> Self {
        let seed = config.seed;
        Self {
            attractor: Attractor::new(config.attractor.clone()),
            fusion: ParameterFusion::new(config.smoothing.clone(), config.fusion.clone()),
            idle: IdleEngine::new(config.idle.clone()),
            tracker: MotionTracker::new(config.tracker.clone()),
            tracking_available: false,
            gesture: GestureState::default(),
            arp: Arpeggiator::new(config.sequencer.arp_bpm, seed ^ 0xA5A5_0001),
            ambient: AmbientPlayer::new(config.sequencer.clone(), seed ^ 0xA5A5_0002),
            mic: MicMeter::default(),
            mic_raw: 0.0,
            audio: AudioLevels::default(),
            pointer: PointerTracker::default(),
            held: SmallVec::new(),
            chord_dirty: false,
            pedal: false,
            pedal_deferred: SmallVec::new(),
            pending: Vec::new(),
            sequenced: Vec::new(),
            now: 0.0,
            freeze_until: f64::NEG_INFINITY,
            sparkle_at: f64::NEG_INFINITY,
            double_tap_at: f64::NEG_INFINITY,
            burst_at: f64::NEG_INFINITY,
            pad: 0.0,
            zoom: 1.0,
            camera: CameraPose::default(),
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn attractor(&self) -> &Attractor {
        &self.attractor
    }

    pub fn fusion(&self) -> &ParameterFusion {
        &self.fusion
    }

    pub fn idle(&self) -> &IdleEngine {
        &self.idle
    }

    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    pub fn held(&self) -> &[HeldNote] {
        &self.held
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pad_level(&self) -> f32 {
        self.pad
    }

    pub fn is_frozen(&self) -> bool {
        self.now < self.freeze_until
    }

    pub fn arpeggiator(&self) -> &Arpeggiator {
        &self.arp
    }

    pub fn ambient(&self) -> &AmbientPlayer {
        &self.ambient
    }

    // ---------------- triggers ----------------

    pub fn trigger(&mut self, spec: TriggerSpec) -> CoreResult<()> {
        let p = self.attractor.params().clone();
        let fp = self.fusion.params().clone();
        let (cell, strength, mix, note) = match spec.source {
            TriggerSource::Cell { col, row } => {
                let cell = Cell::new(col, row)?;
                (cell, p.cell_strength, fp.note_mix, Some(cell.midi()))
            }
            TriggerSource::Note { midi } => {
                let midi = midi.clamp(0, 127);
                (Cell::from_midi(midi), p.cell_strength, fp.note_mix, Some(midi))
            }
            TriggerSource::Drum { index } => {
                (Cell::for_drum(index), p.drum_strength, fp.drum_mix, None)
            }
        };

        if spec.user {
            self.ambient.user_action();
        }
        self.idle.interrupt();
        self.attractor.trigger(cell.position(), strength, cell);
        self.fusion.apply_profile(profile_for_column(cell.col), mix);
        self.burst_at = self.now;

        let sustained = match (spec.sustained, spec.source, note) {
            (Some(s), _, _) => s,
            (None, TriggerSource::Note { .. }, Some(m)) => self.pedal || is_sustain_note(m),
            _ => false,
        };
        if spec.sound {
            match (spec.source, note) {
                (TriggerSource::Drum { index }, _) => {
                    if let Some(kind) = DrumKind::from_index(index) {
                        self.pending.push(SoundEvent::Drum { kind });
                    }
                }
                (_, Some(midi)) => self.pending.push(SoundEvent::NoteOn {
                    midi,
                    velocity: spec.velocity,
                    sustained,
                }),
                _ => {}
            }
        }

        if spec.hold {
            if let Some(midi) = note {
                self.hold(HeldNote {
                    cell,
                    midi,
                    sustained,
                });
            }
        }
        Ok(())
    }

    pub fn trigger_cell(&mut self, col: usize, row: usize) -> CoreResult<()> {
        self.trigger(TriggerSpec::cell(col, row))
    }

    pub fn trigger_note(&mut self, midi: i32) -> CoreResult<()> {
        self.trigger(TriggerSpec::note(midi))
    }

    pub fn trigger_drum(&mut self, index: usize) -> CoreResult<()> {
        self.trigger(TriggerSpec::drum(index))
    }

    /// Each key is held at most once; a repeat press re-fires the visuals
    /// but leaves the chord untouched.
    fn hold(&mut self, note: HeldNote) {
        if self.held.iter().any(|h| h.midi == note.midi) {
            return;
        }
        self.pedal_deferred.retain(|m| *m != note.midi);
        self.held.push(note);
        self.chord_dirty = true;
        let n = self.held.len();
        if n >= 3 {
            self.sparkle_at = self.now;
            for _ in 0..2 {
                let midi = SPARKLE_NOTES[self.rng.gen_range(0..SPARKLE_NOTES.len())];
                self.pending.push(SoundEvent::NoteOn {
                    midi,
                    velocity: SPARKLE_VELOCITY,
                    sustained: false,
                });
            }
        }
        if n >= PAD_CHORD_SIZE {
            self.pad = 1.0;
        }
    }

    pub fn release_cell(&mut self, col: usize, row: usize) -> CoreResult<()> {
        let cell = Cell::new(col, row)?;
        if let Some(i) = self.held.iter().position(|h| h.cell == cell) {
            let note = self.held.remove(i);
            self.released(note);
        }
        Ok(())
    }

    pub fn release_note(&mut self, midi: i32) {
        if let Some(i) = self.held.iter().position(|h| h.midi == midi) {
            let note = self.held.remove(i);
            self.released(note);
        }
    }

    fn released(&mut self, note: HeldNote) {
        self.chord_dirty = true;
        if !note.sustained {
            return;
        }
        if self.pedal {
            self.pedal_deferred.push(note.midi);
        } else {
            self.pending.push(SoundEvent::NoteOff { midi: note.midi });
        }
    }

    /// Pedal down makes new notes ring and defers note-offs until it lifts.
    pub fn set_sustain_pedal(&mut self, down: bool) {
        if self.pedal && !down {
            for midi in std::mem::take(&mut self.pedal_deferred) {
                if !self.held.iter().any(|h| h.midi == midi) {
                    self.pending.push(SoundEvent::NoteOff { midi });
                }
            }
        }
        self.pedal = down;
    }

    pub fn stop_all_sustained(&mut self) {
        self.pedal_deferred.clear();
        for h in self.held.iter_mut() {
            h.sustained = false;
        }
        self.pending.push(SoundEvent::StopAll);
    }

    /// Burst on a random cell: maximum pull, open kaleidoscope, flash.
    pub fn double_tap(&mut self) {
        let col = self.rng.gen_range(0..GRID_COLS);
        let row = self.rng.gen_range(0..GRID_ROWS);
        if let Err(e) = self.trigger(TriggerSpec::cell(col, row).held(false)) {
            log::warn!("[instrument] double tap: {e}");
            return;
        }
        let burst = self.attractor.params().burst_strength;
        self.attractor.strength = burst;
        self.fusion.set_mix_target(1.0);
        self.sparkle_at = self.now;
        self.double_tap_at = self.now;
        self.pad = 1.0;
    }

    /// Hold attractor and targets for `seconds`.
    pub fn freeze(&mut self, seconds: f32) {
        self.freeze_until = self.now + seconds.max(0.0) as f64;
        log::info!("[instrument] freeze {seconds:.1}s");
    }

    pub fn toggle_arpeggiator(&mut self) -> bool {
        self.arp.toggle()
    }

    pub fn toggle_ambient(&mut self) -> bool {
        self.ambient.toggle()
    }

    /// Nudge zoom by whole steps; negative zooms out.
    pub fn adjust_zoom(&mut self, steps: f32) {
        self.zoom = (self.zoom + steps * ZOOM_STEP).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    // ---------------- continuous inputs ----------------

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer.moved(x, y);
    }

    pub fn pointer_left(&mut self) {
        self.pointer.left();
    }

    pub fn set_audio_levels(&mut self, levels: AudioLevels) {
        self.audio = levels;
    }

    /// Latest raw microphone RMS; gated and smoothed once per tick.
    pub fn set_microphone_rms(&mut self, rms: f32) {
        self.mic_raw = rms.max(0.0);
    }

    pub fn microphone_level(&self) -> f32 {
        self.mic.level()
    }

    pub fn set_tracking_available(&mut self, available: bool) {
        if !available {
            self.tracker.reset();
            self.gesture = GestureState::default();
        }
        self.tracking_available = available;
    }

    /// Analyse a camera frame at the instrument clock. Throttled internally.
    pub fn feed_camera_frame(&mut self, frame: FrameRef<'_>) -> Option<GestureState> {
        if !self.tracking_available {
            return None;
        }
        let state = self.tracker.process(frame, self.now)?;
        self.gesture = state;
        Some(state)
    }

    /// Move queued sound events (from triggers since the last call) to `out`.
    pub fn drain_events(&mut self, out: &mut Vec<SoundEvent>) {
        out.append(&mut self.pending);
    }

    // ---------------- frame ----------------

    pub fn tick(&mut self, dt: f32, out: &mut Vec<SoundEvent>) -> FrameOutput {
        let dt = dt.max(0.0);
        self.now += dt as f64;
        let now = self.now;
        let frozen = self.is_frozen();

        self.pointer.tick();
        self.pad *= PAD_DECAY;
        if self.held.len() >= PAD_CHORD_SIZE {
            self.pad = self.pad.max(PAD_HOLD_FLOOR);
        }

        self.idle
            .update(dt, self.held.len(), self.attractor.is_active());
        self.mic.push_rms(self.mic_raw);

        self.run_sequencers(dt);

        if self.chord_dirty {
            self.chord_dirty = false;
            let held = &self.held;
            self.fusion
                .apply_chord(held.iter().map(|h| profile_for_column(h.cell.col)));
        }

        let swipe_sec = self.config.tracker.swipe_sec;
        let swipe_active = self.gesture.fast_swipe.is_active(now, swipe_sec);
        if swipe_active {
            self.sparkle_at = now;
        }

        let t = now as f32;
        let breathe = 0.015 * (t * 0.15).sin();
        let key_push = if self.attractor.is_active() {
            0.04 * (t * 1.8).sin() * self.attractor.strength
        } else {
            0.0
        };
        let bias = (self.gesture.hand_knob1 - 0.5) * 0.06;
        let idle_kaleido = self.idle.intensity() * 0.025 * (t * 0.2).sin();
        self.fusion
            .set_rotation_target(breathe + key_push + bias + idle_kaleido);
        self.fusion.smooth();
        if !frozen && !self.attractor.is_active() && self.held.is_empty() {
            self.fusion.relax();
        }
        if !frozen {
            self.attractor.decay(dt);
        }

        self.update_camera();

        let inputs = ComposeInputs {
            now: t,
            audio: self.audio,
            mic: self.mic.level(),
            mic_visual_scale: MIC_VISUAL_SCALE,
            touch: self.pointer.intensity(),
            double_flash: fade(now, self.double_tap_at, DOUBLE_TAP_SEC),
            sparkle: fade(now, self.sparkle_at, SPARKLE_SEC),
            pad: self.pad,
            idle: self.idle.intensity(),
            held: self.held.len(),
            gesture: GestureInputs {
                knob1: self.gesture.hand_knob1,
                knob2: self.gesture.hand_knob2,
                swipe_active,
            },
            burst_age: (now - self.burst_at).min(1e3) as f32,
        };
        let render = self.fusion.compose(&inputs);
        let step = StepUniforms {
            attractor: self.attractor.position,
            strength: inputs.field_strength(self.attractor.strength),
            tag: self.attractor.tag,
            flow_time: t,
            dt,
        };

        out.append(&mut self.pending);
        FrameOutput {
            render,
            step,
            camera: self.camera,
            idle_phase: self.idle.phase(),
        }
    }

    fn run_sequencers(&mut self, dt: f32) {
        let mut notes = std::mem::take(&mut self.sequenced);
        notes.clear();
        self.ambient.tick(dt, &mut notes);
        let lowest = self.held.iter().map(|h| h.midi).min();
        self.arp.tick(dt, lowest, &mut notes);
        for n in &notes {
            self.pending.push(SoundEvent::NoteOn {
                midi: n.midi,
                velocity: n.velocity,
                sustained: n.sustained,
            });
            if n.visual {
                let spec = TriggerSpec::note(n.midi).automated().silent();
                if let Err(e) = self.trigger(spec) {
                    log::debug!("[instrument] sequenced note {}: {e}", n.midi);
                }
            }
        }
        self.sequenced = notes;
    }

    fn update_camera(&mut self) {
        let head = self.gesture.head_x - 0.5;
        let c = &mut self.camera;
        c.yaw += (head * 0.85 - c.yaw) * 0.1;
        if self.tracking_available {
            c.offset_x += (head * 0.6 - c.offset_x) * 0.09;
        }
        let fov = BASE_FOV_DEG / self.zoom;
        c.fov_deg += (fov - c.fov_deg) * 0.05;
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new(InstrumentConfig::default())
    }
}

/// Linear 1 -> 0 envelope over `duration` seconds after `since`.
#[inline]
fn fade(now: f64, since: f64, duration: f32) -> f32 {
    (1.0 - ((now - since) / duration as f64) as f32).clamp(0.0, 1.0)
}
