// Host-side integration tests for input conditioning.

use instrument_core::*;
use std::thread;

#[test]
fn spectrum_splits_into_three_bands() {
    let mut bins = vec![0.0f32; 100];
    for b in bins.iter_mut().take(15) {
        *b = 1.0;
    }
    for b in bins.iter_mut().skip(50) {
        *b = 0.5;
    }
    let levels = AudioLevels::from_spectrum(&bins);
    assert!((levels.bass - 1.0).abs() < 1e-6);
    assert_eq!(levels.mid, 0.0);
    assert!((levels.treble - 0.5).abs() < 1e-6);
    assert!((levels.energy - 0.6).abs() < 1e-6);
    assert_eq!(AudioLevels::from_spectrum(&[]), AudioLevels::default());
}

#[test]
fn mic_gate_silences_room_noise() {
    let mut mic = MicMeter::default();
    for _ in 0..100 {
        mic.push_rms(MIC_GATE * 0.5);
    }
    assert_eq!(mic.level(), 0.0);
    let mut prev = 0.0;
    for _ in 0..30 {
        let l = mic.push_rms(0.4);
        assert!(l > prev && l <= 0.4);
        prev = l;
    }
    mic.reset();
    assert_eq!(mic.level(), 0.0);
}

#[test]
fn rms_of_a_square_wave_is_its_amplitude() {
    let samples: Vec<f32> = (0..256).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect();
    assert!((rms(&samples) - 0.3).abs() < 1e-6);
    assert_eq!(rms(&[]), 0.0);
    let mut mic = MicMeter::new(0.0, 1.0);
    assert!((mic.push_samples(&samples) - 0.3).abs() < 1e-6);
}

#[test]
fn pointer_intensity_saturates_and_decays() {
    let mut p = PointerTracker::default();
    p.moved(0.0, 0.0);
    assert_eq!(p.intensity(), 0.0, "first sample has no speed");
    p.moved(30.0, 40.0);
    assert!((p.intensity() - 1.0).abs() < 1e-6);
    p.moved(40.0, 40.0);
    assert!((p.intensity() - 0.2).abs() < 1e-6);
    for _ in 0..60 {
        p.tick();
    }
    assert!(p.intensity() < 0.001);
    p.left();
    p.moved(500.0, 500.0);
    assert!(p.intensity() < 0.001, "re-entry does not count as a jump");
}

#[test]
fn shared_level_crosses_threads() {
    let level = SharedLevel::new(0.25);
    assert_eq!(level.load(), 0.25);
    let writer = level.clone();
    let handle = thread::spawn(move || {
        for i in 0..1000 {
            writer.store(i as f32 / 1000.0);
        }
    });
    handle.join().expect("writer thread");
    assert!((level.load() - 0.999).abs() < 1e-6);
}
