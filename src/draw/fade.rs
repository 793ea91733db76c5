use std::time::{Duration, Instant};

pub const MAX_ALPHA: f32 = 255.0;
pub const DEFAULT_FADE_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeSettings {
    /// Idle time before committed strokes start fading.
    pub delay: Duration,
    /// Span of the linear fade from full opacity to zero.
    pub duration: Duration,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            delay: DEFAULT_FADE_DELAY,
            duration: DEFAULT_FADE_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOutcome {
    pub alpha: f32,
    /// Opacity hit zero this frame; the history must be dropped before drawing.
    pub expired: bool,
}

impl FadeOutcome {
    const OPAQUE: Self = Self {
        alpha: MAX_ALPHA,
        expired: false,
    };
}

pub fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() {
        return 0.0;
    }
    alpha.clamp(0.0, MAX_ALPHA)
}

/// Global opacity for the committed strokes at `now`.
///
/// Derived from the wall-clock gap since the last input on every call, so the
/// result does not depend on how often frames are produced.
pub fn fade_alpha(
    now: Instant,
    last_input: Option<Instant>,
    stroke_count: usize,
    settings: FadeSettings,
) -> FadeOutcome {
    let Some(last_input) = last_input else {
        return FadeOutcome::OPAQUE;
    };
    if stroke_count == 0 {
        return FadeOutcome::OPAQUE;
    }

    let idle = now.saturating_duration_since(last_input);
    if idle <= settings.delay {
        return FadeOutcome::OPAQUE;
    }

    let fading_for = idle - settings.delay;
    let alpha = if settings.duration.is_zero() {
        0.0
    } else {
        let progress = fading_for.as_secs_f64() / settings.duration.as_secs_f64();
        clamp_alpha((f64::from(MAX_ALPHA) * (1.0 - progress)) as f32)
    };

    FadeOutcome {
        alpha,
        expired: alpha <= 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn unset_input_or_empty_history_stays_opaque() {
        let base = Instant::now();
        let settings = FadeSettings::default();
        assert_eq!(
            fade_alpha(at(base, 60_000), None, 3, settings),
            FadeOutcome::OPAQUE
        );
        assert_eq!(
            fade_alpha(at(base, 60_000), Some(base), 0, settings),
            FadeOutcome::OPAQUE
        );
    }

    #[test]
    fn alpha_holds_through_delay_then_decays_linearly() {
        let base = Instant::now();
        let settings = FadeSettings::default();

        assert_eq!(fade_alpha(at(base, 5000), Some(base), 1, settings).alpha, 255.0);

        let quarter = fade_alpha(at(base, 5250), Some(base), 1, settings);
        assert!((quarter.alpha - 191.25).abs() < 0.01);
        assert!(!quarter.expired);

        let half = fade_alpha(at(base, 5500), Some(base), 1, settings);
        assert!((half.alpha - 127.5).abs() < 0.01);
    }

    #[test]
    fn alpha_is_strictly_decreasing_inside_the_fade_window() {
        let base = Instant::now();
        let settings = FadeSettings::default();
        let mut previous = MAX_ALPHA + 1.0;
        for ms in (5001..6000).step_by(37) {
            let outcome = fade_alpha(at(base, ms), Some(base), 2, settings);
            assert!(outcome.alpha < previous, "alpha did not drop at {ms}ms");
            assert!(!outcome.expired);
            previous = outcome.alpha;
        }
    }

    #[test]
    fn alpha_reaches_zero_and_expires_after_full_window() {
        let base = Instant::now();
        let settings = FadeSettings::default();
        for ms in [6000, 6100, 60_000] {
            let outcome = fade_alpha(at(base, ms), Some(base), 1, settings);
            assert_eq!(outcome.alpha, 0.0);
            assert!(outcome.expired);
        }
    }

    #[test]
    fn zero_duration_clears_as_soon_as_delay_passes() {
        let base = Instant::now();
        let settings = FadeSettings {
            delay: Duration::from_millis(100),
            duration: Duration::ZERO,
        };
        assert!(!fade_alpha(at(base, 100), Some(base), 1, settings).expired);
        assert!(fade_alpha(at(base, 101), Some(base), 1, settings).expired);
    }

    #[test]
    fn clock_before_last_input_counts_as_no_idle_time() {
        let base = Instant::now();
        let later = at(base, 10_000);
        let outcome = fade_alpha(base, Some(later), 1, FadeSettings::default());
        assert_eq!(outcome, FadeOutcome::OPAQUE);
    }

    #[test]
    fn clamp_alpha_bounds_both_ends() {
        assert_eq!(clamp_alpha(300.0), 255.0);
        assert_eq!(clamp_alpha(-4.0), 0.0);
        assert_eq!(clamp_alpha(f32::NAN), 0.0);
        assert_eq!(clamp_alpha(12.5), 12.5);
    }
}
