// Host-side integration tests for the column-energy motion tracker.

use instrument_core::*;

const W: u32 = 64;
const H: u32 = 32;

fn uniform_frame(value: u8) -> Vec<u8> {
    let mut data = vec![value; (W * H * 4) as usize];
    for px in data.chunks_mut(4) {
        px[3] = 255;
    }
    data
}

/// Dark frame with a 2px bright column starting at the left edge of image
/// bin `bin` (16 bins of 4px each).
fn stripe_frame(bin: u32) -> Vec<u8> {
    let mut data = uniform_frame(0);
    let x0 = bin * (W / 16);
    for y in 0..H {
        for x in x0..x0 + 2 {
            let i = ((y * W + x) * 4) as usize;
            data[i] = 255;
            data[i + 1] = 255;
            data[i + 2] = 255;
        }
    }
    data
}

#[test]
fn bright_column_jumping_right_emits_positive_swipe() {
    let mut tracker = MotionTracker::new(TrackerParams::default());
    // View x is mirrored: image bin 14 shows at ~0.1, image bin 1 at ~0.9.
    let left = stripe_frame(14);
    let right = stripe_frame(1);

    let first = tracker
        .process(FrameRef::new(W, H, &left), 0.0)
        .expect("first frame analysed");
    assert_eq!(first.fast_swipe.direction, 0, "no swipe without history");

    let second = tracker
        .process(FrameRef::new(W, H, &right), 0.04)
        .expect("second frame analysed");
    assert_eq!(second.fast_swipe.direction, 1);
    assert!((second.fast_swipe.timestamp - 0.04).abs() < 1e-9);
    assert!(second.fast_swipe.is_active(0.1, SWIPE_SEC));
    assert!(!second.fast_swipe.is_active(0.04 + SWIPE_SEC as f64 + 0.01, SWIPE_SEC));
    assert!(second.hand_knob1 > first.hand_knob1, "hand knob follows the column");
}

#[test]
fn bright_column_jumping_left_emits_negative_swipe() {
    let mut tracker = MotionTracker::new(TrackerParams::default());
    let right = stripe_frame(1);
    let left = stripe_frame(14);
    tracker.process(FrameRef::new(W, H, &right), 1.0).expect("first");
    let s = tracker.process(FrameRef::new(W, H, &left), 1.04).expect("second");
    assert_eq!(s.fast_swipe.direction, -1);
}

#[test]
fn uniform_frames_give_low_confidence_and_no_head_jump() {
    let mut tracker = MotionTracker::new(TrackerParams::default());
    let flat = uniform_frame(128);
    let a = tracker.process(FrameRef::new(W, H, &flat), 0.0).expect("a");
    let b = tracker.process(FrameRef::new(W, H, &flat), 0.05).expect("b");
    for s in [a, b] {
        assert!((s.head_confidence - 0.1).abs() < 1e-6);
        assert!((s.head_x - 0.5).abs() < 1e-6);
        assert_eq!(s.fast_swipe.direction, 0);
    }
}

#[test]
fn flat_frames_move_a_displaced_head_only_slightly() {
    let params = TrackerParams::default();
    let bound = params.low_confidence_rate;
    let mut tracker = MotionTracker::new(params);
    let stripe = stripe_frame(2);
    let mut t = 0.0;
    for _ in 0..10 {
        tracker.process(FrameRef::new(W, H, &stripe), t);
        t += 0.05;
    }
    let flat = uniform_frame(40);
    // first flat frame still carries motion from the stripe vanishing
    tracker.process(FrameRef::new(W, H, &flat), t);
    t += 0.05;
    let mut prev = tracker.state().head_x;
    assert!((prev - 0.5).abs() > 0.1, "head should have moved off centre");
    for _ in 0..20 {
        let s = tracker.process(FrameRef::new(W, H, &flat), t).expect("flat");
        t += 0.05;
        assert!((s.head_confidence - 0.1).abs() < 1e-6);
        assert!(
            (s.head_x - prev).abs() <= bound + 1e-6,
            "head moved {} in one low-confidence tick",
            (s.head_x - prev).abs()
        );
        prev = s.head_x;
    }
}

#[test]
fn analysis_is_throttled_to_the_interval() {
    let mut tracker = MotionTracker::new(TrackerParams::default());
    let f = uniform_frame(10);
    assert!(tracker.process(FrameRef::new(W, H, &f), 0.0).is_some());
    assert!(tracker.process(FrameRef::new(W, H, &f), 0.010).is_none());
    assert!(tracker.process(FrameRef::new(W, H, &f), 0.032).is_none());
    assert!(tracker.process(FrameRef::new(W, H, &f), 0.034).is_some());
}

#[test]
fn malformed_and_resized_frames_are_handled() {
    let mut tracker = MotionTracker::new(TrackerParams::default());
    let short = vec![0u8; 100];
    assert!(tracker.process(FrameRef::new(W, H, &short), 0.0).is_none());
    let tiny = vec![0u8; 8 * 8 * 4];
    assert!(tracker.process(FrameRef::new(8, 8, &tiny), 0.1).is_none());

    let big = uniform_frame(50);
    assert!(tracker.process(FrameRef::new(W, H, &big), 0.2).is_some());
    let other = vec![50u8; 32 * 32 * 4];
    let s = tracker
        .process(FrameRef::new(32, 32, &other), 0.3)
        .expect("resized frame analysed");
    assert!(s.head_x >= 0.0 && s.head_x <= 1.0);
}

#[test]
fn motion_raises_second_knob_and_reset_clears_it() {
    let mut tracker = MotionTracker::new(TrackerParams::default());
    let dark = uniform_frame(0);
    let light = uniform_frame(200);
    let mut t = 0.0;
    for i in 0..12 {
        let f = if i % 2 == 0 { &dark } else { &light };
        tracker.process(FrameRef::new(W, H, f), t);
        t += 0.05;
    }
    let s = tracker.state();
    assert!(s.hand_knob2 > 0.5, "flicker should read as motion: {}", s.hand_knob2);
    assert!(s.hand_knob2 <= 1.0);
    tracker.reset();
    assert_eq!(tracker.state(), GestureState::default());
}

#[test]
fn zero_bins_drops_frames_instead_of_panicking() {
    let params = TrackerParams {
        bins: 0,
        ..TrackerParams::default()
    };
    let mut tracker = MotionTracker::new(params);
    let frame = stripe_frame(3);
    for i in 0..3 {
        let out = tracker.process(FrameRef::new(W, H, &frame), i as f64);
        assert!(out.is_none(), "frame {i} should be dropped");
    }
    assert_eq!(tracker.state(), GestureState::default());
}

#[test]
fn even_kernel_still_gives_bounded_estimates() {
    let mut params = TrackerParams::default();
    params.head.kernel = vec![1.0, 1.0];
    params.hand.kernel = Vec::new();
    let mut tracker = MotionTracker::new(params);
    let frame = stripe_frame(5);
    let g = tracker
        .process(FrameRef::new(W, H, &frame), 0.0)
        .expect("first frame analysed");
    assert!((0.0..=1.0).contains(&g.head_x));
    assert!((0.0..=1.0).contains(&g.hand_knob1));
}
