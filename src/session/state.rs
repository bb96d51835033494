use serde::Serialize;
use std::fmt;

use crate::state::AtomicState;

/// Meeting attendance lifecycle
///
/// `NotStarted -> AwaitingAdmission -> Joined -> Ended`, with `Failed`
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinState {
    NotStarted,
    AwaitingAdmission,
    Joined,
    Ended,
    Failed,
}

impl JoinState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JoinState::Ended | JoinState::Failed)
    }
}

impl AtomicState for JoinState {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => JoinState::NotStarted,
            1 => JoinState::AwaitingAdmission,
            2 => JoinState::Joined,
            3 => JoinState::Ended,
            _ => JoinState::Failed,
        }
    }
}

impl fmt::Display for JoinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether a join was observed or merely assumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinConfidence {
    /// An in-call indicator was visible
    Confirmed,
    /// The join click went through but nothing confirmed admission
    Assumed,
}
