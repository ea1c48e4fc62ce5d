use chrono::{Days, NaiveDate};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::plan::day_plan::DayPlan;
use crate::plan::error::{PlanError, Precondition};
use crate::plan::events::PlanEvent;
use crate::plan::record_store::SessionStore;
use crate::plan::session::{
    PlannedMinutes, Priority, Progress, Session, SessionDraft, SessionId, SessionMode,
    SessionPatch, SessionStatus, UnitRef,
};
use crate::plan::timer::{Phase, TimerEngine};

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 6;

/// The single writer of the session store: scheduling operations plus the
/// timer, with an event queue for whoever persists the changes.
pub struct Planner {
    store: SessionStore,
    timer: TimerEngine,
    events: Vec<PlanEvent>,
    rng: SmallRng,
}

impl Planner {
    pub fn new(store: SessionStore) -> Self {
        Self::with_rng(store, SmallRng::from_entropy())
    }

    /// Deterministic ids, for tests and fixtures.
    pub fn with_seed(store: SessionStore, seed: u64) -> Self {
        Self::with_rng(store, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(store: SessionStore, rng: SmallRng) -> Self {
        Self {
            store,
            timer: TimerEngine::new(),
            events: Vec::new(),
            rng,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.store.get(id)
    }

    pub fn take_events(&mut self) -> Vec<PlanEvent> {
        std::mem::take(&mut self.events)
    }

    fn fresh_id(&mut self) -> SessionId {
        loop {
            let raw: String = (0..ID_LEN)
                .map(|_| ID_ALPHABET[self.rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            let id = SessionId::new(raw);
            if !self.store.contains(&id) {
                return id;
            }
        }
    }

    // ── Scheduling ──────────────────────────────────────────────────────

    pub fn create(&mut self, draft: SessionDraft) -> Result<SessionId, PlanError> {
        let planned = PlannedMinutes::try_from(draft.planned_minutes)?;
        let title = draft.unit_title.trim();
        if title.is_empty() {
            return Err(PlanError::InvalidUnit);
        }

        let id = self.fresh_id();
        let unit_id = match draft.unit_id.trim() {
            "" => format!("unit-{id}"),
            given => given.to_string(),
        };
        let session = Session {
            id: id.clone(),
            date: draft.date,
            subject: draft.subject,
            unit: UnitRef {
                id: unit_id,
                title: title.to_string(),
                subject: draft.subject,
            },
            mode: draft.mode,
            planned,
            start_at: draft.start_at,
            priority: draft.priority,
            note: draft.note,
            status: SessionStatus::Idle,
            progress: Progress::default(),
        };
        info!(session = %id, date = %session.date, subject = %session.subject, "session created");
        self.store.insert(session);
        self.events.push(PlanEvent::Created { id: id.clone() });
        Ok(id)
    }

    /// Merge caller-editable fields. A patch touching `status` or `progress`
    /// is rejected as a whole and leaves the session unchanged.
    pub fn update(&mut self, id: &SessionId, patch: SessionPatch) -> Result<(), PlanError> {
        if patch.status.is_some() {
            return Err(PlanError::ForbiddenField("status"));
        }
        if patch.progress.is_some() {
            return Err(PlanError::ForbiddenField("progress"));
        }
        let planned = patch
            .planned_minutes
            .map(PlannedMinutes::try_from)
            .transpose()?;
        if patch.unit.as_ref().is_some_and(|u| u.title.trim().is_empty()) {
            return Err(PlanError::InvalidUnit);
        }

        let session = self
            .store
            .get_mut(id)
            .ok_or_else(|| PlanError::NotFound(id.clone()))?;
        if let Some(subject) = patch.subject {
            session.subject = subject;
            session.unit.subject = subject;
        }
        if let Some(mut unit) = patch.unit {
            unit.title = unit.title.trim().to_string();
            unit.subject = session.subject;
            session.unit = unit;
        }
        if let Some(mode) = patch.mode {
            // Keep an already recorded score when the mode stays `assess`.
            session.mode = match (mode, &session.mode) {
                (SessionMode::Assess { score: None }, SessionMode::Assess { score }) => {
                    SessionMode::Assess { score: *score }
                }
                (mode, _) => mode,
            };
        }
        if let Some(planned) = planned {
            session.planned = planned;
        }
        if let Some(start_at) = patch.start_at {
            session.start_at = start_at;
        }
        if let Some(priority) = patch.priority {
            session.priority = priority;
        }
        if let Some(note) = patch.note {
            session.note = note;
        }
        debug!(session = %id, "session updated");
        self.events.push(PlanEvent::Updated { id: id.clone() });
        Ok(())
    }

    pub fn delete(&mut self, id: &SessionId) -> Result<Session, PlanError> {
        if !self.store.contains(id) {
            return Err(PlanError::NotFound(id.clone()));
        }
        if self.timer.active_id() == Some(id) {
            self.timer.stop(&mut self.store, false, &mut self.events)?;
        }
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| PlanError::NotFound(id.clone()))?;
        info!(session = %id, "session deleted");
        self.events.push(PlanEvent::Deleted {
            id: id.clone(),
            date: removed.date,
        });
        Ok(removed)
    }

    /// Move a session by whole days. Only the date changes. Done sessions are
    /// already logged under their date and stay put.
    pub fn reschedule(&mut self, id: &SessionId, delta_days: i64) -> Result<NaiveDate, PlanError> {
        let session = self
            .store
            .get_mut(id)
            .ok_or_else(|| PlanError::NotFound(id.clone()))?;
        if session.is_done() {
            return Err(Precondition::SessionDone(id.clone()).into());
        }
        let from = session.date;
        let to = shift_date(from, delta_days);
        session.date = to;
        info!(session = %id, %from, %to, "session rescheduled");
        self.events.push(PlanEvent::Rescheduled {
            id: id.clone(),
            from,
            to,
        });
        Ok(to)
    }

    /// Add a high-priority tutor session for every weak unit without an open
    /// session on `date`. Returns the ids created.
    pub fn replan_weak_units(
        &mut self,
        date: NaiveDate,
        weak_units: &[UnitRef],
        limit: usize,
    ) -> Vec<SessionId> {
        let mut created = Vec::new();
        for unit in weak_units {
            if created.len() >= limit {
                break;
            }
            let covered = self
                .store
                .on_date(date)
                .any(|s| s.unit.id == unit.id && !s.is_done());
            if covered {
                continue;
            }
            let mut draft = SessionDraft::new(date, unit.subject, unit.title.clone());
            draft.unit_id = unit.id.clone();
            draft.priority = Priority::HIGH;
            if let Ok(id) = self.create(draft) {
                created.push(id);
            }
        }
        created
    }

    // ── Timer ───────────────────────────────────────────────────────────

    pub fn start(&mut self, id: &SessionId) -> Result<(), PlanError> {
        self.timer.start(&mut self.store, id, &mut self.events)
    }

    pub fn pause(&mut self) -> Result<(), PlanError> {
        self.timer.pause()
    }

    pub fn resume(&mut self) -> Result<(), PlanError> {
        self.timer.resume()
    }

    pub fn toggle_phase(&mut self) -> Result<Phase, PlanError> {
        self.timer.toggle_phase()
    }

    pub fn tick(&mut self) -> bool {
        self.timer.tick()
    }

    pub fn advance(&mut self, secs: u64) {
        self.timer.advance(secs);
    }

    pub fn stop(&mut self, completed: bool) -> Result<u32, PlanError> {
        self.timer.stop(&mut self.store, completed, &mut self.events)
    }

    pub fn record_hint(&mut self) -> Result<u32, PlanError> {
        let hints = self.timer.record_hint(&mut self.store)?;
        if let Some(id) = self.timer.active_id() {
            self.events.push(PlanEvent::Updated { id: id.clone() });
        }
        Ok(hints)
    }

    /// Store the result reported by the assessment collaborator.
    pub fn record_score(&mut self, id: &SessionId, score: f64) -> Result<(), PlanError> {
        if !(0.0..=10.0).contains(&score) {
            return Err(PlanError::InvalidScore(score));
        }
        let session = self
            .store
            .get_mut(id)
            .ok_or_else(|| PlanError::NotFound(id.clone()))?;
        match &mut session.mode {
            SessionMode::Assess { score: slot } => *slot = Some(score),
            _ => return Err(PlanError::ForbiddenField("score")),
        }
        self.events.push(PlanEvent::Updated { id: id.clone() });
        Ok(())
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        self.timer.remaining_secs(&self.store)
    }

    // ── Derived views ───────────────────────────────────────────────────

    pub fn day_plan(&self, date: NaiveDate, budget_minutes: u32, weak_units: Vec<UnitRef>) -> DayPlan {
        DayPlan::derive(date, budget_minutes, self.store.on_date(date), weak_units)
    }
}

fn shift_date(date: NaiveDate, delta_days: i64) -> NaiveDate {
    let days = Days::new(delta_days.unsigned_abs());
    let shifted = if delta_days >= 0 {
        date.checked_add_days(days)
    } else {
        date.checked_sub_days(days)
    };
    shifted.unwrap_or(date)
}
