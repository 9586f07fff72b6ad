//! cpal output synth driven by `SoundEvent`s, plus microphone input metering.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use instrument_core::{midi_to_hz, rms, AudioLevels, DrumKind, SharedLevel, SoundEvent};
use rand::prelude::*;

const TAU: f32 = std::f32::consts::TAU;
const NOTE_SEC: f32 = 0.6;
const ATTACK_SEC: f32 = 0.01;
const RELEASE_SEC: f32 = 0.35;
const DRUM_GAIN: f32 = 0.5;
const MAX_VOICES: usize = 48;

#[derive(Clone, Copy, PartialEq, Eq)]
enum WaveKind {
    Sine,
    Saw,
    Triangle,
}

#[derive(Clone)]
struct NoteVoice {
    midi: i32,
    amplitude: f32,
    phase: f32,
    phase_inc: f32,
    samples_emitted: u32,
    attack_samples: u32,
    release_samples: u32,
    /// Sample at which release starts; `None` rings until a note-off.
    gate: Option<u32>,
    wave: WaveKind,
    left_gain: f32,
    right_gain: f32,
}

impl NoteVoice {
    fn envelope(&self) -> Option<f32> {
        let n = self.samples_emitted;
        let attack = if n < self.attack_samples {
            n as f32 / self.attack_samples.max(1) as f32
        } else {
            1.0
        };
        match self.gate {
            Some(g) if n >= g => {
                let r = 1.0 - (n - g) as f32 / self.release_samples.max(1) as f32;
                (r > 0.0).then_some(attack * r)
            }
            _ => Some(attack),
        }
    }

    fn release(&mut self) {
        if self.gate.is_none() {
            self.gate = Some(self.samples_emitted);
        }
    }
}

/// Pitch-swept sine body plus a filtered noise burst.
#[derive(Clone, Copy)]
struct DrumShape {
    start_hz: f32,
    end_hz: f32,
    sweep_sec: f32,
    tone: f32,
    noise: f32,
    /// one-pole highpass coefficient for the noise, 0 = unfiltered
    noise_hp: f32,
    decay_sec: f32,
    gain: f32,
}

fn drum_shape(kind: DrumKind) -> DrumShape {
    let s = |start_hz, end_hz, sweep_sec, tone, noise, noise_hp, decay_sec, gain| DrumShape {
        start_hz,
        end_hz,
        sweep_sec,
        tone,
        noise,
        noise_hp,
        decay_sec,
        gain,
    };
    match kind {
        DrumKind::Kick => s(150.0, 30.0, 0.25, 1.0, 0.08, 0.5, 0.28, 0.85),
        DrumKind::Snare => s(180.0, 80.0, 0.1, 0.5, 0.8, 0.7, 0.14, 0.6),
        DrumKind::Bass808 => s(65.0, 32.0, 0.5, 1.0, 0.0, 0.0, 0.55, 0.75),
        DrumKind::Clap => s(0.0, 0.0, 0.0, 0.0, 1.0, 0.8, 0.1, 0.5),
        DrumKind::HatClosed => s(0.0, 0.0, 0.0, 0.0, 1.0, 0.95, 0.04, 0.4),
        DrumKind::HatOpen => s(0.0, 0.0, 0.0, 0.0, 1.0, 0.93, 0.18, 0.35),
        DrumKind::Rim => s(900.0, 400.0, 0.03, 0.8, 0.3, 0.85, 0.04, 0.5),
        DrumKind::Snap => s(0.0, 0.0, 0.0, 0.0, 1.0, 0.85, 0.035, 0.55),
        DrumKind::TomLow => s(110.0, 70.0, 0.2, 1.0, 0.1, 0.5, 0.3, 0.6),
        DrumKind::TomMid => s(160.0, 100.0, 0.18, 1.0, 0.1, 0.5, 0.25, 0.55),
        DrumKind::Ride => s(0.0, 0.0, 0.0, 0.0, 1.0, 0.9, 0.6, 0.25),
    }
}

#[derive(Clone)]
struct DrumVoice {
    shape: DrumShape,
    phase: f32,
    t: f32,
    last_noise: f32,
    hp: f32,
}

impl DrumVoice {
    fn sample(&mut self, sample_rate: f32, rng: &mut StdRng) -> Option<f32> {
        let s = self.shape;
        if self.t >= s.decay_sec {
            return None;
        }
        let env = (1.0 - self.t / s.decay_sec).powi(2);
        let mut out = 0.0;
        if s.tone > 0.0 {
            let k = (self.t / s.sweep_sec.max(1e-4)).min(1.0);
            let hz = s.start_hz * (s.end_hz / s.start_hz).powf(k);
            out += self.phase.sin() * s.tone;
            self.phase = (self.phase + TAU * hz / sample_rate) % TAU;
        }
        if s.noise > 0.0 {
            let white: f32 = rng.gen_range(-1.0..1.0);
            self.hp = s.noise_hp * (self.hp + white - self.last_noise);
            self.last_noise = white;
            out += self.hp * s.noise;
        }
        self.t += 1.0 / sample_rate;
        Some(out * env * s.gain * DRUM_GAIN)
    }
}

/// Running three-band split of the output for the visual meter.
#[derive(Default)]
struct BandMeter {
    low: f32,
    high_lp: f32,
    acc: [f32; 3],
    count: u32,
}

impl BandMeter {
    fn push(&mut self, x: f32, sample_rate: f32) {
        let a_low = 1.0 - (-TAU * 200.0 / sample_rate).exp();
        let a_high = 1.0 - (-TAU * 3000.0 / sample_rate).exp();
        self.low += (x - self.low) * a_low;
        self.high_lp += (x - self.high_lp) * a_high;
        let bands = [self.low, self.high_lp - self.low, x - self.high_lp];
        for (acc, b) in self.acc.iter_mut().zip(bands) {
            *acc += b * b;
        }
        self.count += 1;
    }

    fn publish(&mut self, out: &[SharedLevel; 3]) {
        if self.count == 0 {
            return;
        }
        for (slot, acc) in out.iter().zip(self.acc.iter_mut()) {
            let level = (*acc / self.count as f32).sqrt();
            slot.store((level * 3.0).min(1.0));
            *acc = 0.0;
        }
        self.count = 0;
    }
}

struct SynthState {
    sample_rate: f32,
    volume: f32,
    notes: Vec<NoteVoice>,
    drums: Vec<DrumVoice>,
    meter: BandMeter,
    rng: StdRng,
}

impl SynthState {
    fn handle(&mut self, event: &SoundEvent) {
        let sr = self.sample_rate;
        match *event {
            SoundEvent::NoteOn {
                midi,
                velocity,
                sustained,
            } => {
                if self.notes.len() >= MAX_VOICES {
                    self.notes.remove(0);
                }
                // spread the keyboard across the stereo field
                let pan = ((midi - 66) as f32 / 30.0).clamp(-1.0, 1.0);
                let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
                let wave = if sustained {
                    WaveKind::Sine
                } else if midi >= 84 {
                    WaveKind::Triangle
                } else {
                    WaveKind::Saw
                };
                self.notes.push(NoteVoice {
                    midi,
                    amplitude: velocity.clamp(0.0, 1.0) * 0.3,
                    phase: 0.0,
                    phase_inc: TAU * midi_to_hz(midi as f32) / sr,
                    samples_emitted: 0,
                    attack_samples: (ATTACK_SEC * sr) as u32,
                    release_samples: (RELEASE_SEC * sr) as u32,
                    gate: (!sustained).then_some((NOTE_SEC * sr) as u32),
                    wave,
                    left_gain: angle.cos(),
                    right_gain: angle.sin(),
                });
            }
            SoundEvent::NoteOff { midi } => {
                for v in self.notes.iter_mut().filter(|v| v.midi == midi) {
                    v.release();
                }
            }
            SoundEvent::Drum { kind } => self.drums.push(DrumVoice {
                shape: drum_shape(kind),
                phase: 0.0,
                t: 0.0,
                last_noise: 0.0,
                hp: 0.0,
            }),
            SoundEvent::StopAll => {
                for v in self.notes.iter_mut() {
                    v.release();
                }
            }
        }
    }

    fn next_frame(&mut self) -> (f32, f32) {
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        self.notes.retain_mut(|v| {
            let Some(env) = v.envelope() else {
                return false;
            };
            let raw = render_wave_sample(v.phase, v.wave) * v.amplitude * env;
            left += raw * v.left_gain;
            right += raw * v.right_gain;
            v.phase = (v.phase + v.phase_inc) % TAU;
            v.samples_emitted += 1;
            true
        });
        let (sr, rng) = (self.sample_rate, &mut self.rng);
        self.drums.retain_mut(|d| match d.sample(sr, rng) {
            Some(x) => {
                left += x * 0.7;
                right += x * 0.7;
                true
            }
            None => false,
        });
        let l = (left * self.volume).tanh();
        let r = (right * self.volume).tanh();
        self.meter.push(0.5 * (l + r), sr);
        (l, r)
    }
}

fn render_wave_sample(phase: f32, wave: WaveKind) -> f32 {
    let t = phase / TAU;
    let saw = 2.0 * (t - t.floor()) - 1.0;
    match wave {
        WaveKind::Sine => phase.sin(),
        WaveKind::Saw => saw * 0.6,
        WaveKind::Triangle => 2.0 * saw.abs() - 1.0,
    }
}

fn lock(state: &Mutex<SynthState>) -> MutexGuard<'_, SynthState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Running output stream. Dropping it stops playback.
pub struct AudioOutput {
    state: Arc<Mutex<SynthState>>,
    bands: [SharedLevel; 3],
    _stream: cpal::Stream,
}

impl AudioOutput {
    pub fn start(volume: f32) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no audio output device"))?;
        let config = device
            .default_output_config()
            .context("output config")?;
        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let state = Arc::new(Mutex::new(SynthState {
            sample_rate,
            volume,
            notes: Vec::new(),
            drums: Vec::new(),
            meter: BandMeter::default(),
            rng: StdRng::from_entropy(),
        }));
        let bands: [SharedLevel; 3] = Default::default();

        let stream_config: cpal::StreamConfig = config.clone().into();
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_output::<f32>(&device, &stream_config, channels, &state, &bands)
            }
            cpal::SampleFormat::I16 => {
                build_output::<i16>(&device, &stream_config, channels, &state, &bands)
            }
            cpal::SampleFormat::U16 => {
                build_output::<u16>(&device, &stream_config, channels, &state, &bands)
            }
            other => return Err(anyhow!("unsupported output sample format {other:?}")),
        }
        .context("build output stream")?;
        stream.play().context("start output stream")?;
        log::info!("[audio] output at {sample_rate} Hz, {channels} ch");

        Ok(Self {
            state,
            bands,
            _stream: stream,
        })
    }

    pub fn handle(&self, events: &[SoundEvent]) {
        if events.is_empty() {
            return;
        }
        let mut guard = lock(&self.state);
        for ev in events {
            guard.handle(ev);
        }
    }

    pub fn set_volume(&self, volume: f32) {
        lock(&self.state).volume = volume;
    }

    pub fn levels(&self) -> AudioLevels {
        AudioLevels::from_bands(self.bands[0].load(), self.bands[1].load(), self.bands[2].load())
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    state: &Arc<Mutex<SynthState>>,
    bands: &[SharedLevel; 3],
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let state = Arc::clone(state);
    let bands = bands.clone();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut guard = lock(&state);
            for frame in data.chunks_mut(channels.max(1)) {
                let (l, r) = guard.next_frame();
                match frame {
                    [mono] => *mono = T::from_sample(0.5 * (l + r)),
                    [left, right, rest @ ..] => {
                        *left = T::from_sample(l);
                        *right = T::from_sample(r);
                        for s in rest {
                            *s = T::from_sample(0.0);
                        }
                    }
                    [] => {}
                }
            }
            guard.meter.publish(&bands);
        },
        |err| log::warn!("[audio] output stream error: {err}"),
        None,
    )
}

/// Default input device feeding a raw RMS level.
pub struct MicInput {
    _stream: cpal::Stream,
}

impl MicInput {
    pub fn start(level: SharedLevel) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("no microphone"))?;
        let config = device.default_input_config().context("input config")?;
        let stream_config: cpal::StreamConfig = config.clone().into();
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_input::<f32>(&device, &stream_config, level),
            cpal::SampleFormat::I16 => build_input::<i16>(&device, &stream_config, level),
            cpal::SampleFormat::U16 => build_input::<u16>(&device, &stream_config, level),
            other => return Err(anyhow!("unsupported input sample format {other:?}")),
        }
        .context("build input stream")?;
        stream.play().context("start input stream")?;
        log::info!("[audio] microphone on");
        Ok(Self { _stream: stream })
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    level: SharedLevel,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|s| s.to_sample::<f32>()));
            level.store(rms(&scratch));
        },
        |err| log::warn!("[audio] input stream error: {err}"),
        None,
    )
}
