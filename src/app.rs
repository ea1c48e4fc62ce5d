use std::time::Instant;

use anyhow::{Result, bail};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::plan::day_plan::DayPlan;
use crate::plan::events::PlanEvent;
use crate::plan::record_store::SessionStore;
use crate::plan::risk::{
    Alert, ClassWeekly, Learner, RiskLevel, RiskThresholds, StudentRow, class_alerts, evaluate,
    normalize_class_code, risk_level,
};
use crate::plan::session::{
    PlannedMinutes, Priority, Session, SessionDraft, SessionId, SessionMode, SessionPatch,
};
use crate::plan::subject::{ALL_SUBJECTS, Subject};
use crate::plan::summary::{
    ActivityRecord, MasteryReport, Scope, Summary, SummaryCache, Window, merge_records, summarize,
};
use crate::plan::timer::{Pacer, Phase};
use crate::plan::{PlanError, Planner};
use crate::store::kv::{KeyValueStore, MemoryKvStore};
use crate::store::plan_store::PlanStore;
use crate::store::schema::{ExportData, SessionsData};
use crate::ui::components::session_list::SessionRow;
use crate::ui::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppScreen {
    Plan,
    Progress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Title,
    Subject,
    Mode,
    Duration,
    Priority,
    StartAt,
}

impl FormField {
    const ORDER: [FormField; 6] = [
        FormField::Title,
        FormField::Subject,
        FormField::Mode,
        FormField::Duration,
        FormField::Priority,
        FormField::StartAt,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn is_text(self) -> bool {
        matches!(self, FormField::Title | FormField::StartAt)
    }
}

/// Quick-add form for a new session on the viewed day.
#[derive(Clone, Debug)]
pub struct SessionForm {
    pub title: String,
    pub subject: Subject,
    pub mode: SessionMode,
    pub planned: PlannedMinutes,
    pub priority: Priority,
    pub start_at: String,
    pub focus: FormField,
}

impl SessionForm {
    pub fn new(subject: Subject, planned: PlannedMinutes) -> Self {
        Self {
            title: String::new(),
            subject,
            mode: SessionMode::Tutor,
            planned,
            priority: Priority::NORMAL,
            start_at: String::new(),
            focus: FormField::Title,
        }
    }

    pub fn push_char(&mut self, ch: char) {
        match self.focus {
            FormField::Title => self.title.push(ch),
            FormField::StartAt if ch.is_ascii_digit() || ch == ':' => {
                if self.start_at.len() < 5 {
                    self.start_at.push(ch);
                }
            }
            _ => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            FormField::Title => {
                self.title.pop();
            }
            FormField::StartAt => {
                self.start_at.pop();
            }
            _ => {}
        }
    }

    /// Step the focused choice field.
    pub fn cycle(&mut self) {
        match self.focus {
            FormField::Subject => self.subject = self.subject.next(),
            FormField::Mode => self.mode = self.mode.next(),
            FormField::Duration => self.planned = self.planned.next(),
            FormField::Priority => {
                let next = self.priority.level() % 3 + 1;
                self.priority = Priority::try_from(next).unwrap_or_default();
            }
            FormField::Title | FormField::StartAt => {}
        }
    }

    pub fn to_draft(&self, date: NaiveDate) -> Result<SessionDraft, String> {
        let start_at = match self.start_at.trim() {
            "" => None,
            raw => Some(
                NaiveTime::parse_from_str(raw, "%H:%M")
                    .map_err(|_| format!("Start time must be HH:MM, got {raw:?}"))?,
            ),
        };
        let mut draft = SessionDraft::new(date, self.subject, self.title.trim());
        draft.mode = self.mode.clone();
        draft.planned_minutes = self.planned.minutes();
        draft.priority = self.priority;
        draft.start_at = start_at;
        Ok(draft)
    }
}

#[derive(Clone, Debug)]
pub enum InputMode {
    Normal,
    NewSession(SessionForm),
    Note { id: SessionId, buffer: String },
    ConfirmDelete(SessionId),
}

/// Everything the `summary` command prints and the Progress screen shows.
#[derive(Clone, Debug, Serialize)]
pub struct ProgressReport {
    pub learner: Learner,
    pub summary: Summary,
    pub day_plan: DayPlan,
    pub alerts: Vec<Alert>,
    pub risk_level: RiskLevel,
}

/// Merge the history log with live sessions and roll up the window.
pub fn compute_summary<K: KeyValueStore>(
    store: &PlanStore<K>,
    live: &SessionStore,
    mastery: &MasteryReport,
    window: Window,
    scope: Scope,
) -> Summary {
    let records = merge_records(store.load_history(window), live.iter());
    summarize(&records, window, scope, mastery)
}

/// Weekly view across several learners' exports.
#[derive(Clone, Debug, Serialize)]
pub struct ClassReport {
    pub class_code: Option<String>,
    pub week_of: NaiveDate,
    pub weekly: ClassWeekly,
    pub rows: Vec<StudentRow>,
    pub alerts: Vec<Alert>,
}

/// Build the class view from learner exports. Each export is loaded into a
/// scratch store and summarized for the week containing `today`. Exports whose
/// class differs from `class_code` are skipped.
pub fn class_report(
    exports: &[ExportData],
    today: NaiveDate,
    class_code: Option<&str>,
    thresholds: &RiskThresholds,
    alert_limit: usize,
) -> Result<ClassReport> {
    let class_code = match class_code {
        Some(raw) => match normalize_class_code(raw) {
            Some(code) => Some(code),
            None => bail!("Unknown class code: {raw}"),
        },
        None => None,
    };
    let window = Window::week_of(today);

    let mut rows = Vec::new();
    for export in exports {
        let mut learner_config = export.config.clone();
        learner_config.validate();
        if class_code.is_some() && learner_config.class_code() != class_code.as_deref() {
            continue;
        }
        let mut store = PlanStore::new(MemoryKvStore::default());
        store.import_all(export)?;
        let live = SessionStore::from_sessions(export.sessions.sessions.iter().cloned());
        let summary = compute_summary(&store, &live, &store.load_mastery(), window, Scope::All);
        let learner = Learner {
            id: learner_config.learner_id.clone(),
            name: learner_config.learner_name.clone(),
            class_code: learner_config.class_code().map(str::to_string),
        };
        rows.push(StudentRow::from_summary(learner, &summary));
    }

    Ok(ClassReport {
        class_code,
        week_of: window.start,
        weekly: ClassWeekly::rollup(&rows, thresholds),
        alerts: class_alerts(&rows, thresholds, alert_limit),
        rows,
    })
}

pub struct App<K: KeyValueStore> {
    pub screen: AppScreen,
    pub input: InputMode,
    pub theme: Theme,
    pub config: Config,
    pub today: NaiveDate,
    pub view_date: NaiveDate,
    pub subject_filter: Option<Subject>,
    pub summary_scope: Scope,
    pub selected: usize,
    pub status_message: Option<String>,
    pub should_quit: bool,
    planner: Planner,
    store: PlanStore<K>,
    mastery: MasteryReport,
    pacer: Pacer,
    cache: SummaryCache,
}

impl<K: KeyValueStore> App<K> {
    pub fn new(config: Config, store: PlanStore<K>, today: NaiveDate) -> Self {
        let sessions = store.load_sessions();
        let planner = Planner::new(SessionStore::from_sessions(sessions.sessions));
        Self::with_planner(config, store, planner, today)
    }

    pub fn with_planner(config: Config, store: PlanStore<K>, planner: Planner, today: NaiveDate) -> Self {
        let theme = Theme::load(&config.theme).unwrap_or_default();
        let mastery = store.load_mastery();
        info!(
            sessions = planner.store().len(),
            %today,
            learner = %config.learner_id,
            "planner loaded"
        );
        Self {
            screen: AppScreen::Plan,
            input: InputMode::Normal,
            theme,
            config,
            today,
            view_date: today,
            subject_filter: None,
            summary_scope: Scope::All,
            selected: 0,
            status_message: None,
            should_quit: false,
            planner,
            store,
            mastery,
            pacer: Pacer::default(),
            cache: SummaryCache::default(),
        }
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn store(&self) -> &PlanStore<K> {
        &self.store
    }

    pub fn mastery(&self) -> &MasteryReport {
        &self.mastery
    }

    pub fn learner(&self) -> Learner {
        Learner {
            id: self.config.learner_id.clone(),
            name: self.config.learner_name.clone(),
            class_code: self.config.class_code().map(str::to_string),
        }
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    // ── Views ───────────────────────────────────────────────────────────

    pub fn visible_sessions(&self) -> Vec<&Session> {
        self.planner
            .store()
            .day_view(self.view_date, self.subject_filter)
    }

    pub fn session_rows(&self) -> Vec<SessionRow<'_>> {
        let timer = self.planner.timer();
        let run = timer.active_run();
        self.visible_sessions()
            .into_iter()
            .map(|session| {
                let active = run.filter(|r| r.session_id == session.id);
                SessionRow {
                    session,
                    remaining_secs: session.remaining_secs(active.map_or(0, |r| r.focus_secs)),
                    phase: active.map(|r| r.phase),
                    paused: active.is_some() && timer.is_paused(),
                    segment_secs: active.map_or(0, |r| r.segment_secs),
                }
            })
            .collect()
    }

    pub fn selected_id(&self) -> Option<SessionId> {
        self.visible_sessions()
            .get(self.selected)
            .map(|s| s.id.clone())
    }

    pub fn select_next(&mut self) {
        let len = self.visible_sessions().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_sessions().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn day_plan(&self) -> DayPlan {
        self.planner.day_plan(
            self.view_date,
            self.config.daily_budget_minutes,
            self.mastery.weakest_units.clone(),
        )
    }

    pub fn summary_window(&self) -> Window {
        Window::week_of(self.view_date)
    }

    pub fn summary(&mut self) -> Summary {
        let window = self.summary_window();
        let scope = self.summary_scope;
        let store = &self.store;
        let live = self.planner.store();
        let mastery = &self.mastery;
        self.cache
            .get_or_compute(window, scope, || {
                debug!(start = %window.start, ?scope, "computing summary");
                compute_summary(store, live, mastery, window, scope)
            })
            .clone()
    }

    pub fn progress_report(&mut self) -> ProgressReport {
        let summary = self.summary();
        let learner = self.learner();
        let row = StudentRow::from_summary(learner.clone(), &summary);
        let alerts = evaluate(&row, &self.config.thresholds());
        ProgressReport {
            learner,
            risk_level: risk_level(&alerts),
            day_plan: self.day_plan(),
            summary,
            alerts,
        }
    }

    // ── Navigation ──────────────────────────────────────────────────────

    pub fn toggle_screen(&mut self) {
        self.screen = match self.screen {
            AppScreen::Plan => AppScreen::Progress,
            AppScreen::Progress => AppScreen::Plan,
        };
    }

    pub fn shift_view_date(&mut self, delta_days: i64) {
        let days = Days::new(delta_days.unsigned_abs());
        let shifted = if delta_days >= 0 {
            self.view_date.checked_add_days(days)
        } else {
            self.view_date.checked_sub_days(days)
        };
        if let Some(date) = shifted {
            self.view_date = date;
            self.selected = 0;
        }
    }

    pub fn go_today(&mut self) {
        self.view_date = self.today;
        self.selected = 0;
    }

    pub fn cycle_subject_filter(&mut self) {
        self.subject_filter = match self.subject_filter {
            None => Some(ALL_SUBJECTS[0]),
            Some(s) if s.index() + 1 < ALL_SUBJECTS.len() => Some(s.next()),
            Some(_) => None,
        };
        self.clamp_selection();
    }

    pub fn cycle_summary_scope(&mut self) {
        self.summary_scope = match self.summary_scope {
            Scope::All => Scope::Subject(ALL_SUBJECTS[0]),
            Scope::Subject(s) if s.index() + 1 < ALL_SUBJECTS.len() => Scope::Subject(s.next()),
            Scope::Subject(_) => Scope::All,
        };
    }

    // ── Timer ───────────────────────────────────────────────────────────

    /// Feed elapsed wall-clock seconds to the timer. Breaks end on their own
    /// after the configured length.
    pub fn on_tick(&mut self, now: Instant) {
        self.pacer.sync(self.planner.timer().is_running(), now);
        let due = self.pacer.due(now);
        let break_secs = self.config.break_secs();
        for _ in 0..due {
            if !self.planner.tick() {
                break;
            }
            let break_over = self
                .planner
                .timer()
                .active_run()
                .is_some_and(|r| r.phase == Phase::Break && r.segment_secs >= break_secs);
            if break_over && self.planner.toggle_phase().is_ok() {
                self.notify("Break over, back to focus");
            }
        }
    }

    /// Catch the clock up, run a timer operation, then re-arm the pacer for
    /// whatever state the timer ended in.
    fn with_clock<T>(
        &mut self,
        op: impl FnOnce(&mut Planner) -> Result<T, PlanError>,
    ) -> Result<T, PlanError> {
        let now = Instant::now();
        self.on_tick(now);
        let out = op(&mut self.planner);
        self.pacer.sync(self.planner.timer().is_running(), now);
        out
    }

    fn report(&mut self, result: Result<(), PlanError>) {
        if let Err(e) = result {
            debug!(error = %e, "operation rejected");
            self.notify(e.to_string());
        }
        self.persist();
    }

    pub fn start_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let result = self.with_clock(|p| p.start(&id));
        self.report(result);
    }

    pub fn toggle_pause(&mut self) {
        let result = if self.planner.timer().is_paused() {
            self.with_clock(Planner::resume)
        } else {
            self.with_clock(Planner::pause)
        };
        self.report(result);
    }

    pub fn toggle_phase(&mut self) {
        let result = self.with_clock(Planner::toggle_phase).map(|phase| {
            self.status_message = Some(match phase {
                Phase::Focus => "Focus".to_string(),
                Phase::Break => format!("Break ({}')", self.config.break_minutes),
            });
        });
        self.report(result);
    }

    pub fn stop(&mut self, completed: bool) {
        let result = self.with_clock(|p| p.stop(completed)).map(|minutes| {
            let verb = if completed { "Completed" } else { "Stopped" };
            self.status_message = Some(format!("{verb}: +{minutes}'"));
        });
        self.report(result);
    }

    pub fn record_hint(&mut self) {
        let result = self.planner.record_hint().map(|_| ());
        self.report(result);
    }

    pub fn record_score(&mut self, id: &SessionId, score: f64) {
        let result = self.planner.record_score(id, score);
        self.report(result);
    }

    // ── Scheduling ──────────────────────────────────────────────────────

    pub fn reschedule_selected(&mut self, delta_days: i64) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let result = self.planner.reschedule(&id, delta_days).map(|to| {
            self.status_message = Some(format!("Moved to {}", to.format("%d/%m")));
        });
        self.report(result);
        self.clamp_selection();
    }

    pub fn cycle_priority_selected(&mut self) {
        let Some(session) = self.selected_id().and_then(|id| self.planner.get(&id).cloned()) else {
            return;
        };
        let next = Priority::try_from(session.priority.level() % 3 + 1).unwrap_or_default();
        let patch = SessionPatch {
            priority: Some(next),
            ..SessionPatch::default()
        };
        let result = self.planner.update(&session.id, patch);
        self.report(result);
    }

    pub fn cycle_duration_selected(&mut self) {
        let Some(session) = self.selected_id().and_then(|id| self.planner.get(&id).cloned()) else {
            return;
        };
        let patch = SessionPatch {
            planned_minutes: Some(session.planned.next().minutes()),
            ..SessionPatch::default()
        };
        let result = self.planner.update(&session.id, patch);
        self.report(result);
    }

    pub fn replan_weak_units(&mut self) {
        let weak = self.mastery.weakest_units.clone();
        let created = self
            .planner
            .replan_weak_units(self.view_date, &weak, crate::plan::day_plan::MAX_WEAK_SUGGESTIONS);
        self.notify(match created.len() {
            0 => "Weak units are already planned".to_string(),
            n => format!("Added {n} review session(s)"),
        });
        self.persist();
    }

    pub fn delete_confirmed(&mut self, id: &SessionId) {
        let result = self.planner.delete(id).map(|removed| {
            self.status_message = Some(format!("Deleted \"{}\"", removed.unit.title));
        });
        self.pacer.sync(self.planner.timer().is_running(), Instant::now());
        self.report(result);
        self.clamp_selection();
    }

    // ── Input modes ─────────────────────────────────────────────────────

    pub fn open_new_session(&mut self) {
        let subject = self.subject_filter.unwrap_or(ALL_SUBJECTS[0]);
        self.input = InputMode::NewSession(SessionForm::new(subject, self.config.default_duration()));
    }

    pub fn open_note_editor(&mut self) {
        if let Some(session) = self.selected_id().and_then(|id| self.planner.get(&id)) {
            self.input = InputMode::Note {
                id: session.id.clone(),
                buffer: session.note.clone(),
            };
        }
    }

    pub fn open_delete_confirm(&mut self) {
        if let Some(id) = self.selected_id() {
            self.input = InputMode::ConfirmDelete(id);
        }
    }

    pub fn cancel_input(&mut self) {
        self.input = InputMode::Normal;
    }

    /// Submit whatever the current input mode holds. The form stays open when
    /// its contents are rejected.
    pub fn submit_input(&mut self) {
        match std::mem::replace(&mut self.input, InputMode::Normal) {
            InputMode::Normal => {}
            InputMode::NewSession(form) => match form.to_draft(self.view_date) {
                Ok(draft) => match self.planner.create(draft) {
                    Ok(id) => {
                        self.persist();
                        if let Some(pos) = self.visible_sessions().iter().position(|s| s.id == id) {
                            self.selected = pos;
                        }
                    }
                    Err(e) => {
                        self.notify(e.to_string());
                        self.input = InputMode::NewSession(form);
                    }
                },
                Err(msg) => {
                    self.notify(msg);
                    self.input = InputMode::NewSession(form);
                }
            },
            InputMode::Note { id, buffer } => {
                let result = self.planner.update(&id, SessionPatch::note(buffer.trim()));
                self.report(result);
            }
            InputMode::ConfirmDelete(id) => self.delete_confirmed(&id),
        }
    }

    /// Commit the run on the clock, if any, before leaving.
    pub fn quit(&mut self) {
        if self.planner.timer().active_id().is_some() {
            self.stop(false);
        }
        self.should_quit = true;
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Drain planner events into the store. Completions are appended to the
    /// history log of the session's date; deletions take their entry out again.
    pub fn persist(&mut self) {
        let events = self.planner.take_events();
        if !events.iter().any(PlanEvent::is_mutation) {
            return;
        }
        self.cache.invalidate();

        for event in &events {
            if let PlanEvent::Deleted { id, date } = event {
                if let Err(e) = self.store.remove_history(*date, id) {
                    error!(session = %id, error = %e, "failed to drop history entry");
                    self.status_message = Some(format!("Could not update history: {e}"));
                }
                continue;
            }
            let log = match event {
                PlanEvent::Completed { .. } => true,
                PlanEvent::Updated { id } => self.planner.get(id).is_some_and(Session::is_done),
                _ => false,
            };
            if !log {
                continue;
            }
            let Some(session) = self.planner.get(event.session_id()) else {
                continue;
            };
            if let Err(e) = self.store.append_history(ActivityRecord::from(session)) {
                error!(session = %session.id, error = %e, "failed to log completion");
                self.status_message = Some(format!("Could not save history: {e}"));
            }
        }

        let data = SessionsData::new(self.planner.store().iter().cloned().collect());
        if let Err(e) = self.store.save_sessions(&data) {
            error!(error = %e, "failed to save sessions");
            self.status_message = Some(format!("Could not save plan: {e}"));
        }
    }

    pub fn reload_mastery(&mut self) {
        self.mastery = self.store.load_mastery();
        self.cache.invalidate();
        if self.mastery.subjects.is_empty() {
            warn!("no mastery report on disk");
        }
    }
}
