use crate::draw::input::InkEvent;
use crate::draw::overlay::OverlayConfig;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct InkSample {
    pub event: InkEvent,
    /// Capture time; the recorder stamps `last_input` with this, not with the
    /// time the overlay thread got around to draining the event.
    pub at: Instant,
}

impl InkSample {
    pub fn now(event: InkEvent) -> Self {
        Self {
            event,
            at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Unmounted,
    ControllerGone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MainToOverlay {
    UpdateConfig(OverlayConfig),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayToMain {
    Started,
    StartFailure { error: String },
    Exited { reason: ExitReason },
}
