use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::plan::error::{PlanError, Precondition};
use crate::plan::events::PlanEvent;
use crate::plan::record_store::SessionStore;
use crate::plan::session::{SessionId, SessionStatus};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Focus,
    Break,
}

impl Phase {
    pub fn toggled(self) -> Self {
        match self {
            Phase::Focus => Phase::Break,
            Phase::Break => Phase::Focus,
        }
    }
}

/// In-memory bookkeeping for the session currently on the clock.
///
/// `segment_secs` is the display counter and restarts on every phase change.
/// `focus_secs` only grows during focus ticks and is what `stop` commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveRun {
    pub session_id: SessionId,
    pub phase: Phase,
    pub segment_secs: u64,
    pub focus_secs: u64,
}

impl ActiveRun {
    fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            phase: Phase::Focus,
            segment_secs: 0,
            focus_secs: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TimerState {
    #[default]
    Stopped,
    Running(ActiveRun),
    Paused(ActiveRun),
}

/// Single-flight stopwatch over the session store. At most one session is
/// ever `Running` or `Paused`; time only moves through `tick`/`advance`.
#[derive(Clone, Debug, Default)]
pub struct TimerEngine {
    state: TimerState,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn active_run(&self) -> Option<&ActiveRun> {
        match &self.state {
            TimerState::Running(run) | TimerState::Paused(run) => Some(run),
            TimerState::Stopped => None,
        }
    }

    pub fn active_id(&self) -> Option<&SessionId> {
        self.active_run().map(|run| &run.session_id)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running(_))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, TimerState::Paused(_))
    }

    pub fn phase(&self) -> Option<Phase> {
        self.active_run().map(|run| run.phase)
    }

    pub fn start(
        &mut self,
        store: &mut SessionStore,
        id: &SessionId,
        events: &mut Vec<PlanEvent>,
    ) -> Result<(), PlanError> {
        let target = store
            .get(id)
            .ok_or_else(|| Precondition::UnknownSession(id.clone()))?;
        if target.is_done() {
            return Err(Precondition::SessionDone(id.clone()).into());
        }
        if self.active_id() == Some(id) {
            return Err(Precondition::AlreadyActive(id.clone()).into());
        }

        self.preempt(store, events);

        if let Some(session) = store.get_mut(id) {
            session.status = SessionStatus::Running;
        }
        self.state = TimerState::Running(ActiveRun::new(id.clone()));
        info!(session = %id, "timer started");
        events.push(PlanEvent::Started { id: id.clone() });
        Ok(())
    }

    /// Quiesce whatever is on the clock without committing its run.
    fn preempt(&mut self, store: &mut SessionStore, events: &mut Vec<PlanEvent>) {
        let (TimerState::Running(run) | TimerState::Paused(run)) = std::mem::take(&mut self.state)
        else {
            return;
        };
        if let Some(session) = store.get_mut(&run.session_id) {
            session.status = SessionStatus::Idle;
        }
        info!(
            session = %run.session_id,
            discarded_secs = run.focus_secs,
            "timer preempted by another session"
        );
        events.push(PlanEvent::Preempted {
            id: run.session_id,
            discarded_secs: run.focus_secs,
        });
    }

    pub fn pause(&mut self) -> Result<(), PlanError> {
        match std::mem::take(&mut self.state) {
            TimerState::Running(run) => {
                debug!(session = %run.session_id, "timer paused");
                self.state = TimerState::Paused(run);
                Ok(())
            }
            paused @ TimerState::Paused(_) => {
                self.state = paused;
                Ok(())
            }
            TimerState::Stopped => Err(Precondition::NoActiveSession.into()),
        }
    }

    pub fn resume(&mut self) -> Result<(), PlanError> {
        match std::mem::take(&mut self.state) {
            TimerState::Paused(run) => {
                debug!(session = %run.session_id, "timer resumed");
                self.state = TimerState::Running(run);
                Ok(())
            }
            running @ TimerState::Running(_) => {
                self.state = running;
                Ok(())
            }
            TimerState::Stopped => Err(Precondition::NoActiveSession.into()),
        }
    }

    /// Flip focus/break and restart the display segment. Focus seconds
    /// gathered so far stay with the run.
    pub fn toggle_phase(&mut self) -> Result<Phase, PlanError> {
        match &mut self.state {
            TimerState::Running(run) | TimerState::Paused(run) => {
                run.phase = run.phase.toggled();
                run.segment_secs = 0;
                debug!(session = %run.session_id, phase = ?run.phase, "phase toggled");
                Ok(run.phase)
            }
            TimerState::Stopped => Err(Precondition::NoActiveSession.into()),
        }
    }

    /// One logical second. Ignored unless running.
    pub fn tick(&mut self) -> bool {
        match &mut self.state {
            TimerState::Running(run) => {
                run.segment_secs += 1;
                if run.phase == Phase::Focus {
                    run.focus_secs += 1;
                }
                true
            }
            _ => false,
        }
    }

    pub fn advance(&mut self, secs: u64) {
        for _ in 0..secs {
            if !self.tick() {
                break;
            }
        }
    }

    /// Commit the run's focus time as whole minutes (remainder dropped) and
    /// release the clock. Returns the minutes committed.
    pub fn stop(
        &mut self,
        store: &mut SessionStore,
        completed: bool,
        events: &mut Vec<PlanEvent>,
    ) -> Result<u32, PlanError> {
        let run = match std::mem::take(&mut self.state) {
            TimerState::Running(run) | TimerState::Paused(run) => run,
            TimerState::Stopped => return Err(Precondition::NoActiveSession.into()),
        };
        let run_minutes = u32::try_from(run.focus_secs / 60).unwrap_or(u32::MAX);

        let Some(session) = store.get_mut(&run.session_id) else {
            warn!(session = %run.session_id, "active session vanished from store");
            return Err(Precondition::UnknownSession(run.session_id).into());
        };
        session.progress.elapsed_minutes = session.progress.elapsed_minutes.saturating_add(run_minutes);

        if completed {
            session.status = SessionStatus::Done;
            info!(
                session = %run.session_id,
                run_minutes,
                total_minutes = session.progress.elapsed_minutes,
                "session completed"
            );
            events.push(PlanEvent::Completed {
                id: run.session_id,
                run_minutes,
                elapsed_minutes: session.progress.elapsed_minutes,
                used_hints: session.progress.used_hints,
            });
        } else {
            session.status = SessionStatus::Idle;
            info!(session = %run.session_id, run_minutes, "timer stopped");
            events.push(PlanEvent::Stopped {
                id: run.session_id,
                committed_minutes: run_minutes,
            });
        }
        Ok(run_minutes)
    }

    pub fn record_hint(&mut self, store: &mut SessionStore) -> Result<u32, PlanError> {
        let id = self.active_id().ok_or(Precondition::NoActiveSession)?;
        let session = store
            .get_mut(id)
            .ok_or_else(|| Precondition::UnknownSession(id.clone()))?;
        session.progress.used_hints += 1;
        Ok(session.progress.used_hints)
    }

    /// Seconds left on the active session, counting uncommitted focus time.
    pub fn remaining_secs(&self, store: &SessionStore) -> Option<u64> {
        let run = self.active_run()?;
        let session = store.get(&run.session_id)?;
        Some(session.remaining_secs(run.focus_secs))
    }
}

/// Turns wall-clock time into whole logical ticks. Armed only while the
/// timer runs, so a paused or stopped engine never receives stray seconds.
#[derive(Clone, Debug, Default)]
pub struct Pacer {
    anchor: Option<Instant>,
}

impl Pacer {
    pub fn sync(&mut self, running: bool, now: Instant) {
        match (running, self.anchor) {
            (true, None) => self.anchor = Some(now),
            (false, Some(_)) => self.anchor = None,
            _ => {}
        }
    }

    pub fn is_armed(&self) -> bool {
        self.anchor.is_some()
    }

    /// Whole seconds elapsed since the last call. Sub-second leftovers carry over.
    pub fn due(&mut self, now: Instant) -> u64 {
        let Some(anchor) = self.anchor else {
            return 0;
        };
        let secs = now.saturating_duration_since(anchor).as_secs();
        if secs > 0 {
            self.anchor = Some(anchor + Duration::from_secs(secs));
        }
        secs
    }
}
