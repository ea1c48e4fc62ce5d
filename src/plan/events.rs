use chrono::NaiveDate;

use crate::plan::session::SessionId;

/// Notifications emitted by the planner for persistence and logging hooks.
/// Callers drain them with `Planner::take_events`.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanEvent {
    Created {
        id: SessionId,
    },
    Updated {
        id: SessionId,
    },
    Deleted {
        id: SessionId,
        date: NaiveDate,
    },
    Rescheduled {
        id: SessionId,
        from: NaiveDate,
        to: NaiveDate,
    },
    Started {
        id: SessionId,
    },
    /// Another session was started while this one was active. Its uncommitted
    /// run time was discarded.
    Preempted {
        id: SessionId,
        discarded_secs: u64,
    },
    Stopped {
        id: SessionId,
        committed_minutes: u32,
    },
    Completed {
        id: SessionId,
        run_minutes: u32,
        elapsed_minutes: u32,
        used_hints: u32,
    },
}

impl PlanEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            PlanEvent::Created { id }
            | PlanEvent::Updated { id }
            | PlanEvent::Deleted { id, .. }
            | PlanEvent::Rescheduled { id, .. }
            | PlanEvent::Started { id }
            | PlanEvent::Preempted { id, .. }
            | PlanEvent::Stopped { id, .. }
            | PlanEvent::Completed { id, .. } => id,
        }
    }

    /// Whether the event changed persisted session data.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, PlanEvent::Started { .. })
    }
}
