// Host-side integration tests for the arpeggiator and ambient player.

use instrument_core::*;

const DT: f32 = 1.0 / 60.0;

#[test]
fn arpeggiator_steps_at_sixteenths_over_the_root() {
    let mut arp = Arpeggiator::new(ARP_BPM, 3);
    let mut out = Vec::new();
    arp.tick(1.0, Some(60), &mut out);
    assert!(out.is_empty(), "disabled arpeggiator is silent");

    assert!(arp.toggle());
    assert!((arp.step_sec() - 60.0 / 140.0 / 2.0).abs() < 1e-6);
    let pattern = arp.pattern();
    assert!(ARP_PATTERNS.contains(&pattern));

    let steps = pattern.len() * 2;
    for _ in 0..steps {
        arp.tick(arp.step_sec(), Some(55), &mut out);
    }
    assert_eq!(out.len(), steps);
    for (i, n) in out.iter().enumerate() {
        assert_eq!(n.midi, 55 + pattern[i % pattern.len()]);
        assert!(n.velocity >= 0.35 && n.velocity <= 0.5);
        assert!(!n.sustained);
        assert!(n.visual);
    }
}

#[test]
fn arpeggiator_waits_without_a_held_note() {
    let mut arp = Arpeggiator::new(ARP_BPM, 4);
    arp.toggle();
    let mut out = Vec::new();
    for _ in 0..120 {
        arp.tick(DT, None, &mut out);
    }
    assert!(out.is_empty());
    assert!(!arp.toggle());
}

#[test]
fn ambient_auto_starts_after_quiet_period() {
    let params = SequencerParams::default();
    let idle = params.ambient_idle_sec;
    let mut amb = AmbientPlayer::new(params, 9);
    let mut out = Vec::new();
    let ticks = ((idle - 0.5) / DT) as usize;
    for _ in 0..ticks {
        amb.tick(DT, &mut out);
    }
    assert!(!amb.is_active());
    assert!(out.is_empty());
    for _ in 0..60 {
        amb.tick(DT, &mut out);
    }
    assert!(amb.is_active());
    assert!(!out.is_empty(), "first step plays immediately");
}

#[test]
fn ambient_fades_in_and_keeps_notes_soft() {
    let mut amb = AmbientPlayer::new(SequencerParams::default(), 21);
    amb.start();
    let mut out = Vec::new();
    let mut mains = Vec::new();
    for _ in 0..(60.0 / DT) as usize {
        out.clear();
        amb.tick(DT, &mut out);
        mains.extend(out.iter().filter(|n| n.visual).copied());
    }
    // steps come every 0.6..1.8 s
    assert!(mains.len() >= 30 && mains.len() <= 101, "{} steps", mains.len());
    assert!(mains[0].velocity <= 0.115 / 6.0 + 1e-6);
    for n in &mains {
        assert!(n.velocity <= 0.115 + 1e-6);
        assert!(n.midi >= 48 && n.midi < 48 + 24 + 11 + 12 + 1);
    }
}

#[test]
fn user_action_stops_and_restarts_the_quiet_timer() {
    let params = SequencerParams {
        ambient_idle_sec: 1.0,
        ..SequencerParams::default()
    };
    let mut amb = AmbientPlayer::new(params, 5);
    let mut out = Vec::new();
    for _ in 0..70 {
        amb.tick(DT, &mut out);
    }
    assert!(amb.is_active());
    amb.user_action();
    assert!(!amb.is_active());
    for _ in 0..50 {
        amb.tick(DT, &mut out);
    }
    assert!(!amb.is_active());

    amb.set_auto_start(false);
    for _ in 0..200 {
        amb.tick(DT, &mut out);
    }
    assert!(!amb.is_active());
    assert!(amb.toggle());
}
