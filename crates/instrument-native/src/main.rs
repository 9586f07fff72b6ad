mod audio;
mod compute;
mod gpu;
mod keymap;

use std::time::Instant;

use instrument_core::{
    CoreError, FrameOutput, Instrument, InstrumentConfig, SharedLevel, SoundEvent,
    DOUBLE_TAP_SEC, GRID_COLS, GRID_ROWS,
};
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use audio::{AudioOutput, MicInput};
use gpu::GpuState;
use keymap::{KeyAction, KeyState};

/// Grid cell under a pointer position; row 0 is the top third of the window.
fn cell_at(x: f64, y: f64, width: u32, height: u32) -> Option<(usize, usize)> {
    if width == 0 || height == 0 || x < 0.0 || y < 0.0 {
        return None;
    }
    let col = (x / width as f64 * GRID_COLS as f64) as usize;
    let row = (y / height as f64 * GRID_ROWS as f64) as usize;
    (col < GRID_COLS && row < GRID_ROWS).then_some((col, row))
}

struct App {
    instrument: Instrument,
    audio: Option<AudioOutput>,
    mic_level: SharedLevel,
    keys: KeyState,
    shift: bool,
    volume: f32,
    cursor: Option<(f64, f64)>,
    mouse_cell: Option<(usize, usize)>,
    last_click: Option<Instant>,
    last_frame: Instant,
    events: Vec<SoundEvent>,
}

impl App {
    fn new(seed: u64) -> Self {
        let config = InstrumentConfig {
            seed,
            ..InstrumentConfig::default()
        };
        let mut instrument = Instrument::new(config);

        // no camera source natively; gestures stay neutral
        let err = CoreError::DeviceUnavailable("no camera capture on this platform".into());
        log::info!("[tracking] {err}; head and hand tracking disabled");
        instrument.set_tracking_available(false);

        let volume = keymap::VOLUME_DEFAULT;
        let audio = match AudioOutput::start(volume) {
            Ok(a) => Some(a),
            Err(e) => {
                log::warn!("[audio] {e:#}; running silent");
                None
            }
        };
        let mic_level = SharedLevel::default();
        Self {
            instrument,
            audio,
            mic_level,
            keys: KeyState::default(),
            shift: false,
            volume,
            cursor: None,
            mouse_cell: None,
            last_click: None,
            last_frame: Instant::now(),
            events: Vec::new(),
        }
    }

    fn report(&self, what: &str, result: instrument_core::CoreResult<()>) {
        if let Err(e) = result {
            log::warn!("[input] {what}: {e}");
        }
    }

    fn on_key(&mut self, key: KeyCode, pressed: bool) {
        if !pressed {
            if key == KeyCode::Space {
                self.instrument.set_sustain_pedal(false);
            }
            if let Some(midi) = self.keys.release(key) {
                self.instrument.release_note(midi);
            }
            return;
        }
        if !self.keys.press(key) {
            return;
        }
        let Some(action) = keymap::action_for_key(key, self.shift) else {
            return;
        };
        match action {
            KeyAction::Note(midi) => {
                let r = self.instrument.trigger_note(midi);
                self.report("note", r);
                self.keys.started_note(key, midi);
            }
            KeyAction::Drum(i) => {
                let r = self.instrument.trigger_drum(i);
                self.report("drum", r);
            }
            KeyAction::Sustain => self.instrument.set_sustain_pedal(true),
            KeyAction::StopSustained => {
                self.instrument.stop_all_sustained();
                self.instrument.reset_zoom();
            }
            KeyAction::ToggleArp => {
                self.instrument.toggle_arpeggiator();
            }
            KeyAction::ToggleAmbient => {
                self.instrument.toggle_ambient();
            }
            KeyAction::Freeze => self.instrument.freeze(keymap::FREEZE_SEC),
            KeyAction::Volume(delta) => {
                self.volume = keymap::step_volume(self.volume, delta);
                if let Some(audio) = &self.audio {
                    audio.set_volume(self.volume);
                }
                log::info!("[audio] volume {:.2}", self.volume);
            }
        }
    }

    fn on_focus_lost(&mut self) {
        for midi in self.keys.clear() {
            self.instrument.release_note(midi);
        }
        self.instrument.set_sustain_pedal(false);
        self.release_mouse_cell();
    }

    fn release_mouse_cell(&mut self) {
        if let Some((col, row)) = self.mouse_cell.take() {
            let r = self.instrument.release_cell(col, row);
            self.report("release", r);
        }
    }

    fn on_cursor(&mut self, x: f64, y: f64, size: (u32, u32)) {
        self.cursor = Some((x, y));
        self.instrument.pointer_moved(x as f32, y as f32);
        if self.mouse_cell.is_none() {
            return;
        }
        // dragging across cells plays each one
        let cell = cell_at(x, y, size.0, size.1);
        if cell != self.mouse_cell {
            self.release_mouse_cell();
            if let Some((col, row)) = cell {
                let r = self.instrument.trigger_cell(col, row);
                self.report("cell", r);
                self.mouse_cell = Some((col, row));
            }
        }
    }

    fn on_cursor_left(&mut self) {
        self.cursor = None;
        self.instrument.pointer_left();
        self.release_mouse_cell();
    }

    fn on_mouse(&mut self, pressed: bool, size: (u32, u32)) {
        if !pressed {
            self.release_mouse_cell();
            return;
        }
        let now = Instant::now();
        let double = self
            .last_click
            .is_some_and(|t| now.duration_since(t).as_secs_f32() < DOUBLE_TAP_SEC);
        self.last_click = Some(now);
        if double {
            self.instrument.double_tap();
            self.last_click = None;
            return;
        }
        let Some((x, y)) = self.cursor else {
            return;
        };
        if let Some((col, row)) = cell_at(x, y, size.0, size.1) {
            let r = self.instrument.trigger_cell(col, row);
            self.report("cell", r);
            self.mouse_cell = Some((col, row));
        }
    }

    fn on_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(p) => (p.y / 40.0) as f32,
        };
        self.instrument.adjust_zoom(steps);
    }

    fn frame(&mut self) -> FrameOutput {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if let Some(audio) = &self.audio {
            self.instrument.set_audio_levels(audio.levels());
        }
        self.instrument.set_microphone_rms(self.mic_level.load());

        self.events.clear();
        let out = self.instrument.tick(dt, &mut self.events);
        if let Some(audio) = &self.audio {
            audio.handle(&self.events);
        }
        out
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let seed: u64 = rand::random();
    let mut app = App::new(seed);
    let _mic = match MicInput::start(app.mic_level.clone()) {
        Ok(m) => Some(m),
        Err(e) => {
            log::warn!("[audio] {e:#}; microphone disabled");
            None
        }
    };

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title("Reactive Instrument")
        .build(&event_loop)?;

    let mut state = pollster::block_on(GpuState::new(
        &window,
        app.instrument.config().field.clone(),
        seed,
    ))?;
    log::info!(
        "[gpu] particle field {}",
        if state.is_simulated() { "simulated" } else { "static" }
    );

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => {
            let size = state.window.inner_size();
            let size = (size.width, size.height);
            match event {
                WindowEvent::Resized(size) => state.resize(size),
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Focused(false) => app.on_focus_lost(),
                WindowEvent::ModifiersChanged(m) => app.shift = m.state().shift_key(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(key),
                            state: key_state,
                            ..
                        },
                    ..
                } => app.on_key(key, key_state == ElementState::Pressed),
                WindowEvent::CursorMoved { position, .. } => {
                    app.on_cursor(position.x, position.y, size)
                }
                WindowEvent::CursorLeft { .. } => app.on_cursor_left(),
                WindowEvent::MouseInput {
                    state: button_state,
                    button: MouseButton::Left,
                    ..
                } => app.on_mouse(button_state == ElementState::Pressed, size),
                WindowEvent::MouseWheel { delta, .. } => app.on_wheel(delta),
                _ => {}
            }
        }
        Event::AboutToWait => {
            let out = app.frame();
            state.step_field(&out.step);
            match state.render(&out) {
                Ok(_) => state.window.request_redraw(),
                Err(wgpu::SurfaceError::Lost) => state.resize(state.window.inner_size()),
                Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                Err(e) => {
                    let err = CoreError::TransientRenderFailure(e.to_string());
                    log::warn!("[gpu] {err}");
                }
            }
        }
        _ => {}
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_maps_to_grid_cells() {
        assert_eq!(cell_at(0.0, 0.0, 1200, 300), Some((0, 0)));
        assert_eq!(cell_at(1199.0, 299.0, 1200, 300), Some((11, 2)));
        assert_eq!(cell_at(350.0, 150.0, 1200, 300), Some((3, 1)));
        assert_eq!(cell_at(1200.0, 10.0, 1200, 300), None);
        assert_eq!(cell_at(-1.0, 10.0, 1200, 300), None);
        assert_eq!(cell_at(10.0, 10.0, 0, 300), None);
    }
}
