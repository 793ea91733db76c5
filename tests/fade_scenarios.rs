use fade_ink::draw::{FadeSettings, InkEvent, InkInputState, InkLifecycle, MouseButton, Point};
use std::time::{Duration, Instant};

fn at(base: Instant, ms: u64) -> Instant {
    base + Duration::from_millis(ms)
}

fn draw_three_point_stroke(state: &mut InkInputState, base: Instant) {
    state.handle_event(
        &InkEvent::MouseDown {
            button: MouseButton::Primary,
            point: Point::new(10.0, 10.0),
        },
        base,
    );
    state.handle_event(
        &InkEvent::MouseMove {
            point: Point::new(20.0, 15.0),
            primary_down: true,
        },
        at(base, 50),
    );
    state.handle_event(
        &InkEvent::MouseMove {
            point: Point::new(30.0, 25.0),
            primary_down: true,
        },
        at(base, 100),
    );
    state.handle_event(
        &InkEvent::MouseUp {
            button: MouseButton::Primary,
        },
        at(base, 100),
    );
}

#[test]
fn stroke_stays_opaque_then_fades_and_clears() {
    let base = Instant::now();
    let settings = FadeSettings::default();
    let mut state = InkInputState::new();

    draw_three_point_stroke(&mut state, base);
    assert_eq!(state.strokes().len(), 1);
    assert_eq!(state.strokes()[0].point_count(), 3);
    assert_eq!(state.lifecycle(), InkLifecycle::IdleWithHistory);

    let early = state.apply_fade(at(base, 4000), settings);
    assert!(!early.expired);
    assert_eq!(state.global_alpha(), 255.0);

    // Idle time counts from the release at 100 ms.
    state.apply_fade(at(base, 5600), settings);
    assert!((state.global_alpha() - 127.5).abs() < 0.01);
    assert_eq!(state.strokes().len(), 1);

    let late = state.apply_fade(at(base, 6100), settings);
    assert!(late.expired);
    assert!(state.strokes().is_empty());
    assert_eq!(state.last_input(), None);
    assert_eq!(state.global_alpha(), 255.0);
    assert_eq!(state.lifecycle(), InkLifecycle::Idle);
}

#[test]
fn fade_is_monotonic_across_the_fade_window() {
    let base = Instant::now();
    let settings = FadeSettings::default();
    let mut state = InkInputState::new();
    draw_three_point_stroke(&mut state, base);

    let mut previous = 255.0;
    for ms in (5150..6100).step_by(50) {
        state.apply_fade(at(base, ms), settings);
        assert!(state.global_alpha() < previous, "alpha did not drop at {ms} ms");
        previous = state.global_alpha();
    }
}

#[test]
fn single_tap_records_no_stroke_but_keeps_input_time() {
    let base = Instant::now();
    let mut state = InkInputState::new();
    state.handle_event(
        &InkEvent::MouseDown {
            button: MouseButton::Primary,
            point: Point::new(5.0, 5.0),
        },
        base,
    );
    state.handle_event(
        &InkEvent::MouseUp {
            button: MouseButton::Primary,
        },
        at(base, 10),
    );

    assert!(state.strokes().is_empty());
    assert!(state.current_stroke().is_none());
    assert_eq!(state.last_input(), Some(base));
}

#[test]
fn second_finger_does_not_touch_the_active_stroke() {
    let base = Instant::now();
    let mut state = InkInputState::new();
    state.handle_event(
        &InkEvent::TouchStart {
            touches: vec![Point::new(1.0, 1.0)],
        },
        base,
    );
    state.handle_event(
        &InkEvent::TouchMove {
            touches: vec![Point::new(2.0, 2.0)],
        },
        at(base, 16),
    );
    assert_eq!(state.current_stroke().map(|s| s.point_count()), Some(2));

    state.handle_event(
        &InkEvent::TouchStart {
            touches: vec![Point::new(2.0, 2.0), Point::new(90.0, 90.0)],
        },
        at(base, 32),
    );
    state.handle_event(
        &InkEvent::TouchMove {
            touches: vec![Point::new(3.0, 3.0), Point::new(91.0, 91.0)],
        },
        at(base, 48),
    );
    assert_eq!(state.current_stroke().map(|s| s.point_count()), Some(2));
}

#[test]
fn new_gesture_restores_full_opacity_mid_fade() {
    let base = Instant::now();
    let settings = FadeSettings::default();
    let mut state = InkInputState::new();
    draw_three_point_stroke(&mut state, base);

    state.apply_fade(at(base, 5700), settings);
    assert!(state.global_alpha() < 255.0);

    state.handle_event(
        &InkEvent::MouseDown {
            button: MouseButton::Primary,
            point: Point::new(40.0, 40.0),
        },
        at(base, 5750),
    );
    assert_eq!(state.global_alpha(), 255.0);
    assert_eq!(state.lifecycle(), InkLifecycle::Drawing);

    state.apply_fade(at(base, 5800), settings);
    assert_eq!(state.global_alpha(), 255.0);
}
