//! Computer keyboard layout for the desktop front-end.

use fnv::FnvHashSet;
use winit::keyboard::KeyCode;

pub const VOLUME_STEP: f32 = 0.08;
pub const VOLUME_MIN: f32 = 0.05;
pub const VOLUME_MAX: f32 = 1.0;
pub const VOLUME_DEFAULT: f32 = 0.4;
pub const FREEZE_SEC: f32 = 2.0;

/// What a key does when pressed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyAction {
    Note(i32),
    Drum(usize),
    Sustain,
    StopSustained,
    ToggleArp,
    ToggleAmbient,
    Freeze,
    Volume(f32),
}

/// Low octave Z..M (C3-B3), mid Q..P (C4-E5), brackets F5 and G5.
pub fn note_for_key(key: KeyCode) -> Option<i32> {
    let midi = match key {
        KeyCode::KeyZ => 48,
        KeyCode::KeyX => 50,
        KeyCode::KeyC => 52,
        KeyCode::KeyV => 53,
        KeyCode::KeyB => 55,
        KeyCode::KeyN => 57,
        KeyCode::KeyM => 59,
        KeyCode::KeyQ => 60,
        KeyCode::KeyW => 62,
        KeyCode::KeyE => 64,
        KeyCode::KeyR => 65,
        KeyCode::KeyT => 67,
        KeyCode::KeyY => 69,
        KeyCode::KeyU => 71,
        KeyCode::KeyI => 72,
        KeyCode::KeyO => 74,
        KeyCode::KeyP => 76,
        KeyCode::BracketLeft => 77,
        KeyCode::BracketRight => 79,
        _ => return None,
    };
    Some(midi)
}

/// Home row, in `DrumKind::ALL` order.
pub fn drum_for_key(key: KeyCode) -> Option<usize> {
    const ROW: [KeyCode; 11] = [
        KeyCode::KeyA,
        KeyCode::KeyS,
        KeyCode::KeyD,
        KeyCode::KeyF,
        KeyCode::KeyG,
        KeyCode::KeyH,
        KeyCode::KeyJ,
        KeyCode::KeyK,
        KeyCode::KeyL,
        KeyCode::Semicolon,
        KeyCode::Quote,
    ];
    ROW.iter().position(|k| *k == key)
}

pub fn action_for_key(key: KeyCode, shift: bool) -> Option<KeyAction> {
    if let Some(midi) = note_for_key(key) {
        let octave = if shift { 12 } else { 0 };
        return Some(KeyAction::Note(midi + octave));
    }
    if let Some(i) = drum_for_key(key) {
        return Some(KeyAction::Drum(i));
    }
    match key {
        KeyCode::Space => Some(KeyAction::Sustain),
        KeyCode::Escape => Some(KeyAction::StopSustained),
        KeyCode::Digit2 => Some(KeyAction::ToggleArp),
        KeyCode::Digit4 => Some(KeyAction::ToggleAmbient),
        KeyCode::Digit5 => Some(KeyAction::Freeze),
        KeyCode::Minus => Some(KeyAction::Volume(-VOLUME_STEP)),
        KeyCode::Equal => Some(KeyAction::Volume(VOLUME_STEP)),
        _ => None,
    }
}

pub fn step_volume(volume: f32, delta: f32) -> f32 {
    (volume + delta).clamp(VOLUME_MIN, VOLUME_MAX)
}

/// Keys currently down, with the note each one started so a release after a
/// shift change still stops the right pitch.
#[derive(Default)]
pub struct KeyState {
    down: FnvHashSet<KeyCode>,
    sounding: Vec<(KeyCode, i32)>,
}

impl KeyState {
    /// Returns false for auto-repeat of a key already down.
    pub fn press(&mut self, key: KeyCode) -> bool {
        self.down.insert(key)
    }

    pub fn release(&mut self, key: KeyCode) -> Option<i32> {
        self.down.remove(&key);
        let i = self.sounding.iter().position(|(k, _)| *k == key)?;
        Some(self.sounding.swap_remove(i).1)
    }

    pub fn started_note(&mut self, key: KeyCode, midi: i32) {
        self.sounding.push((key, midi));
    }

    pub fn clear(&mut self) -> Vec<i32> {
        self.down.clear();
        self.sounding.drain(..).map(|(_, m)| m).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_raises_notes_an_octave() {
        assert_eq!(action_for_key(KeyCode::KeyZ, false), Some(KeyAction::Note(48)));
        assert_eq!(action_for_key(KeyCode::KeyZ, true), Some(KeyAction::Note(60)));
        assert_eq!(action_for_key(KeyCode::BracketRight, false), Some(KeyAction::Note(79)));
    }

    #[test]
    fn home_row_plays_every_drum() {
        assert_eq!(drum_for_key(KeyCode::KeyA), Some(0));
        assert_eq!(drum_for_key(KeyCode::Quote), Some(10));
        assert_eq!(drum_for_key(KeyCode::KeyZ), None);
        assert_eq!(action_for_key(KeyCode::KeyA, true), Some(KeyAction::Drum(0)));
    }

    #[test]
    fn volume_is_clamped() {
        let mut v = VOLUME_DEFAULT;
        for _ in 0..20 {
            v = step_volume(v, VOLUME_STEP);
        }
        assert_eq!(v, VOLUME_MAX);
        for _ in 0..20 {
            v = step_volume(v, -VOLUME_STEP);
        }
        assert_eq!(v, VOLUME_MIN);
    }

    #[test]
    fn repeat_presses_are_ignored_and_release_returns_started_note() {
        let mut keys = KeyState::default();
        assert!(keys.press(KeyCode::KeyQ));
        assert!(!keys.press(KeyCode::KeyQ));
        keys.started_note(KeyCode::KeyQ, 72);
        assert_eq!(keys.release(KeyCode::KeyQ), Some(72));
        assert_eq!(keys.release(KeyCode::KeyQ), None);
        assert!(keys.press(KeyCode::KeyQ));
    }
}
