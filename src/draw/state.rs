#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InkLifecycle {
    /// No history and no gesture in progress.
    Idle,
    Drawing,
    /// Strokes are committed and the fade timer is running.
    IdleWithHistory,
}

impl InkLifecycle {
    pub fn from_parts(gesture_active: bool, has_history: bool) -> Self {
        match (gesture_active, has_history) {
            (true, _) => Self::Drawing,
            (false, true) => Self::IdleWithHistory,
            (false, false) => Self::Idle,
        }
    }
}

pub fn can_transition(from: InkLifecycle, to: InkLifecycle) -> bool {
    matches!(
        (from, to),
        (InkLifecycle::Idle, InkLifecycle::Drawing)
            | (InkLifecycle::Drawing, InkLifecycle::Idle)
            | (InkLifecycle::Drawing, InkLifecycle::IdleWithHistory)
            | (InkLifecycle::IdleWithHistory, InkLifecycle::Drawing)
            | (InkLifecycle::IdleWithHistory, InkLifecycle::Idle)
    ) || from == to
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_cannot_jump_straight_to_history() {
        assert!(!can_transition(
            InkLifecycle::Idle,
            InkLifecycle::IdleWithHistory
        ));
        assert!(can_transition(InkLifecycle::Idle, InkLifecycle::Drawing));
        assert!(can_transition(
            InkLifecycle::IdleWithHistory,
            InkLifecycle::Idle
        ));
    }

    #[test]
    fn active_gesture_wins_over_history() {
        assert_eq!(InkLifecycle::from_parts(true, true), InkLifecycle::Drawing);
        assert_eq!(
            InkLifecycle::from_parts(false, true),
            InkLifecycle::IdleWithHistory
        );
        assert_eq!(InkLifecycle::from_parts(false, false), InkLifecycle::Idle);
    }
}
