use std::fmt;

use thiserror::Error;

use crate::plan::session::SessionId;

/// Why a timer or progress operation had nothing to act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    NoActiveSession,
    UnknownSession(SessionId),
    SessionDone(SessionId),
    AlreadyActive(SessionId),
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::NoActiveSession => write!(f, "no active session"),
            Precondition::UnknownSession(id) => write!(f, "unknown session {id}"),
            Precondition::SessionDone(id) => write!(f, "session {id} is already done"),
            Precondition::AlreadyActive(id) => write!(f, "session {id} is already active"),
        }
    }
}

/// Every failure the planning engine reports. None of them leave the store
/// in a partially updated state.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PlanError {
    #[error("precondition not met: {0}")]
    PreconditionNotMet(Precondition),

    #[error("invalid duration: {0} minutes (expected 15, 25, 30, 45 or 60)")]
    InvalidDuration(u32),

    #[error("unit title must not be empty")]
    InvalidUnit,

    #[error("field `{0}` cannot be patched directly")]
    ForbiddenField(&'static str),

    #[error("score {0} is outside 0..=10")]
    InvalidScore(f64),

    #[error("session not found: {0}")]
    NotFound(SessionId),
}

impl PlanError {
    /// Precondition failures are recoverable no-ops; callers usually ignore them.
    pub fn is_precondition(&self) -> bool {
        matches!(self, PlanError::PreconditionNotMet(_))
    }
}

impl From<Precondition> for PlanError {
    fn from(p: Precondition) -> Self {
        PlanError::PreconditionNotMet(p)
    }
}
