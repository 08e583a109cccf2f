//! Public session events.

// === Event vocabulary ===

/// Event emitted by a session's notification bridge.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// End of stream. Also emitted when the engine enters its error state.
    ReachedEnd,
    Paused,
    Played,
    /// New position, 0.0..=1.0.
    PositionChanged(f32),
    /// New time, in milliseconds.
    TimeChanged(i64),
}

/// Discriminant of [`SessionEvent`], used for bus registration and subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ReachedEnd,
    Paused,
    Played,
    PositionChanged,
    TimeChanged,
}

impl EventKind {
    /// Every kind a session registers on its bus at construction.
    pub const ALL: [EventKind; 5] = [
        EventKind::ReachedEnd,
        EventKind::Paused,
        EventKind::Played,
        EventKind::PositionChanged,
        EventKind::TimeChanged,
    ];
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ReachedEnd => EventKind::ReachedEnd,
            Self::Paused => EventKind::Paused,
            Self::Played => EventKind::Played,
            Self::PositionChanged(_) => EventKind::PositionChanged,
            Self::TimeChanged(_) => EventKind::TimeChanged,
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReachedEnd => write!(f, "reached end"),
            Self::Paused => write!(f, "paused"),
            Self::Played => write!(f, "played"),
            Self::PositionChanged(p) => write!(f, "position {:.3}", p),
            Self::TimeChanged(t) => write!(f, "time {} ms", t),
        }
    }
}
