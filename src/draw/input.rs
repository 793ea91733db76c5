use crate::draw::fade::{clamp_alpha, fade_alpha, FadeOutcome, FadeSettings, MAX_ALPHA};
use crate::draw::model::{Point, Stroke};
use crate::draw::state::{can_transition, InkLifecycle};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
    Other,
}

/// Raw input delivered to the overlay, in absolute viewport coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum InkEvent {
    MouseDown { button: MouseButton, point: Point },
    MouseMove { point: Point, primary_down: bool },
    MouseUp { button: MouseButton },
    /// `touches` lists every finger currently on the surface.
    TouchStart { touches: Vec<Point> },
    TouchMove { touches: Vec<Point> },
    TouchEnd,
    TouchCancel,
    Resize { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Let the platform run its default handling.
    PassThrough,
    /// The event fed an ink gesture; scrolling must not happen.
    SuppressDefault,
}

impl EventDisposition {
    pub fn suppresses_default(self) -> bool {
        matches!(self, Self::SuppressDefault)
    }
}

/// Drawing state of one mounted overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct InkInputState {
    strokes: Vec<Stroke>,
    current: Option<Stroke>,
    last_input: Option<Instant>,
    global_alpha: f32,
}

impl Default for InkInputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InkInputState {
    pub fn new() -> Self {
        Self {
            strokes: Vec::new(),
            current: None,
            last_input: None,
            global_alpha: MAX_ALPHA,
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn current_stroke(&self) -> Option<&Stroke> {
        self.current.as_ref()
    }

    pub fn last_input(&self) -> Option<Instant> {
        self.last_input
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    pub fn lifecycle(&self) -> InkLifecycle {
        InkLifecycle::from_parts(self.current.is_some(), !self.strokes.is_empty())
    }

    pub fn on_pointer_down(&mut self, point: Point, now: Instant) {
        if self.current.is_some() {
            return;
        }
        self.current = Some(Stroke::begin(point));
        self.last_input = Some(now);
        self.global_alpha = MAX_ALPHA;
    }

    pub fn on_pointer_move(&mut self, point: Point, primary_down: bool, now: Instant) {
        if !primary_down {
            return;
        }
        if let Some(stroke) = self.current.as_mut() {
            stroke.push(point);
            self.last_input = Some(now);
        }
    }

    pub fn on_pointer_up(&mut self, now: Instant) {
        let Some(stroke) = self.current.take() else {
            return;
        };
        if stroke.is_drawable() {
            tracing::debug!(points = stroke.point_count(), "committing ink stroke");
            self.strokes.push(stroke);
            self.last_input = Some(now);
        }
    }

    pub fn handle_event(&mut self, event: &InkEvent, now: Instant) -> EventDisposition {
        let before = self.lifecycle();
        let disposition = self.dispatch_event(event, now);
        self.note_transition(before);
        disposition
    }

    fn dispatch_event(&mut self, event: &InkEvent, now: Instant) -> EventDisposition {
        match event {
            InkEvent::MouseDown {
                button: MouseButton::Primary,
                point,
            } => {
                self.on_pointer_down(*point, now);
                EventDisposition::PassThrough
            }
            InkEvent::MouseMove {
                point,
                primary_down,
            } => {
                self.on_pointer_move(*point, *primary_down, now);
                EventDisposition::PassThrough
            }
            InkEvent::MouseUp {
                button: MouseButton::Primary,
            } => {
                self.on_pointer_up(now);
                EventDisposition::PassThrough
            }
            InkEvent::TouchStart { touches } => match single_touch(touches) {
                Some(point) if self.current.is_none() => {
                    self.on_pointer_down(point, now);
                    EventDisposition::SuppressDefault
                }
                _ => EventDisposition::PassThrough,
            },
            InkEvent::TouchMove { touches } => match single_touch(touches) {
                Some(point) if self.current.is_some() => {
                    self.on_pointer_move(point, true, now);
                    EventDisposition::SuppressDefault
                }
                _ => EventDisposition::PassThrough,
            },
            InkEvent::TouchEnd | InkEvent::TouchCancel => {
                self.on_pointer_up(now);
                EventDisposition::PassThrough
            }
            InkEvent::MouseDown { .. } | InkEvent::MouseUp { .. } | InkEvent::Resize { .. } => {
                EventDisposition::PassThrough
            }
        }
    }

    /// Runs the fade for this frame, dropping the history once it is invisible.
    pub fn apply_fade(&mut self, now: Instant, settings: FadeSettings) -> FadeOutcome {
        let before = self.lifecycle();
        let outcome = fade_alpha(now, self.last_input, self.strokes.len(), settings);
        if outcome.expired {
            tracing::debug!(strokes = self.strokes.len(), "ink faded out; clearing history");
            self.strokes.clear();
            self.last_input = None;
            self.global_alpha = MAX_ALPHA;
        } else {
            self.global_alpha = clamp_alpha(outcome.alpha);
        }
        self.note_transition(before);
        outcome
    }

    fn note_transition(&self, before: InkLifecycle) {
        let after = self.lifecycle();
        if after == before {
            return;
        }
        debug_assert!(
            can_transition(before, after),
            "illegal ink lifecycle change {before:?} -> {after:?}"
        );
        tracing::trace!(?before, ?after, "ink lifecycle changed");
    }
}

fn single_touch(touches: &[Point]) -> Option<Point> {
    match touches {
        [only] => Some(*only),
        _ => None,
    }
}
