//! Engine state codes and their public translation.
//!
//! The engine reports its primary state as a small integer. Sessions expose
//! the coarser [`PlayerState`]; descriptors cache a [`MediaState`].

use serde::{Deserialize, Serialize};

/// Raw engine-internal state, as carried by the `state` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum EngineState {
    Init = 0,
    Opening = 1,
    Buffering = 2,
    Playing = 3,
    Paused = 4,
    Ended = 5,
    Error = 6,
}

impl EngineState {
    /// Decode a raw state code; `None` outside the known set.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Init,
            1 => Self::Opening,
            2 => Self::Buffering,
            3 => Self::Playing,
            4 => Self::Paused,
            5 => Self::Ended,
            6 => Self::Error,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Public playback state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    Opening,
    Buffering,
    Playing,
    Paused,
    Ended,
    Error,
    Stopped,
}

/// State cached on a content descriptor by the notification bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaState {
    #[default]
    NothingSpecial,
    Playing,
    Error,
}

/// Map a raw engine state code to the public enumeration.
///
/// `None` means no resource is attached. Unknown codes map to `Stopped`.
pub fn translate(code: Option<i64>) -> PlayerState {
    match code.and_then(EngineState::from_code) {
        Some(EngineState::Init | EngineState::Opening) => PlayerState::Opening,
        Some(EngineState::Buffering) => PlayerState::Buffering,
        Some(EngineState::Playing) => PlayerState::Playing,
        Some(EngineState::Paused) => PlayerState::Paused,
        Some(EngineState::Ended) => PlayerState::Ended,
        Some(EngineState::Error) => PlayerState::Error,
        None => PlayerState::Stopped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_known_codes() {
        assert_eq!(translate(Some(0)), PlayerState::Opening);
        assert_eq!(translate(Some(1)), PlayerState::Opening);
        assert_eq!(translate(Some(2)), PlayerState::Buffering);
        assert_eq!(translate(Some(3)), PlayerState::Playing);
        assert_eq!(translate(Some(4)), PlayerState::Paused);
        assert_eq!(translate(Some(5)), PlayerState::Ended);
        assert_eq!(translate(Some(6)), PlayerState::Error);
    }

    #[test]
    fn test_translate_unknown_or_absent_is_stopped() {
        assert_eq!(translate(None), PlayerState::Stopped);
        assert_eq!(translate(Some(-1)), PlayerState::Stopped);
        assert_eq!(translate(Some(7)), PlayerState::Stopped);
        assert_eq!(translate(Some(i64::MAX)), PlayerState::Stopped);
    }

    #[test]
    fn test_code_roundtrip() {
        for code in 0..=6 {
            let state = EngineState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
    }
}
