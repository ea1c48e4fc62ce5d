use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::plan::session::{Session, SessionId, SessionMode, SessionStatus, UnitRef};
use crate::plan::subject::{ALL_SUBJECTS, Subject};

/// Strongest/weakest lists are cut to this many entries for display.
pub const MAX_RANKED_UNITS: usize = 3;

/// One line of study history. Live sessions and the persisted log share this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub session_id: SessionId,
    pub date: NaiveDate,
    pub subject: Subject,
    pub unit: UnitRef,
    #[serde(flatten)]
    pub mode: SessionMode,
    pub completed: bool,
    pub elapsed_minutes: u32,
    pub used_hints: u32,
}

impl From<&Session> for ActivityRecord {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.id.clone(),
            date: s.date,
            subject: s.subject,
            unit: s.unit.clone(),
            mode: s.mode.clone(),
            completed: s.status == SessionStatus::Done,
            elapsed_minutes: s.progress.elapsed_minutes,
            used_hints: s.progress.used_hints,
        }
    }
}

/// Inclusive date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Monday through Sunday of the week containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as u64;
        let start = date.checked_sub_days(Days::new(offset)).unwrap_or(date);
        let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take_while(|d| *d <= self.end)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    All,
    Subject(Subject),
}

impl Scope {
    fn includes(self, subject: Subject) -> bool {
        match self {
            Scope::All => true,
            Scope::Subject(s) => s == subject,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectMastery {
    pub subject: Subject,
    pub mastery_pct: u32,
}

/// Output of the knowledge-tracing collaborator. Passed through, never computed here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MasteryReport {
    #[serde(default)]
    pub subjects: Vec<SubjectMastery>,
    #[serde(default)]
    pub strongest_units: Vec<UnitRef>,
    #[serde(default)]
    pub weakest_units: Vec<UnitRef>,
}

impl MasteryReport {
    pub fn mastery_pct(&self, subject: Subject) -> u32 {
        self.subjects
            .iter()
            .find(|m| m.subject == subject)
            .map(|m| m.mastery_pct.min(100))
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week_of: NaiveDate,
    pub total_minutes: u32,
    pub sessions_planned: usize,
    pub sessions_completed: usize,
    pub adherence_pct: u32,
    pub assess_avg: f64,
    pub hints_used: u32,
    pub strongest_units: Vec<UnitRef>,
    pub weakest_units: Vec<UnitRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub subject: Subject,
    pub mastery_pct: u32,
    pub minutes: u32,
    pub assess_avg: f64,
    pub hints: u32,
}

impl SubjectSummary {
    fn zero(subject: Subject, mastery_pct: u32) -> Self {
        Self {
            subject,
            mastery_pct,
            minutes: 0,
            assess_avg: 0.0,
            hints: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub window: Window,
    pub scope: Scope,
    pub weekly: WeeklySummary,
    /// One entry per subject in `ALL_SUBJECTS` order, whatever the scope.
    pub subjects: Vec<SubjectSummary>,
}

/// `round(100 * completed / max(1, planned))`.
pub fn adherence_pct(completed: usize, planned: usize) -> u32 {
    (100.0 * completed as f64 / planned.max(1) as f64).round() as u32
}

#[derive(Default)]
struct ScoreAcc {
    sum: f64,
    count: u32,
}

impl ScoreAcc {
    fn push(&mut self, score: f64) {
        self.sum += score;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Combine the persisted log with live sessions. A live session replaces any
/// logged record with the same id. Output is ordered by date, then id.
pub fn merge_records<'a>(
    history: impl IntoIterator<Item = ActivityRecord>,
    live: impl IntoIterator<Item = &'a Session>,
) -> Vec<ActivityRecord> {
    let mut by_id: BTreeMap<SessionId, ActivityRecord> = BTreeMap::new();
    for record in history {
        by_id.insert(record.session_id.clone(), record);
    }
    for session in live {
        by_id.insert(session.id.clone(), ActivityRecord::from(session));
    }
    let mut records: Vec<ActivityRecord> = by_id.into_values().collect();
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.session_id.cmp(&b.session_id)));
    records
}

fn ranked_units(units: &[UnitRef], scope: Scope) -> Vec<UnitRef> {
    units
        .iter()
        .filter(|u| !u.id.trim().is_empty() && !u.title.trim().is_empty())
        .filter(|u| scope.includes(u.subject))
        .take(MAX_RANKED_UNITS)
        .cloned()
        .collect()
}

/// Fold activity inside `window` into weekly and per-subject rollups.
/// An empty window yields a zero-filled summary.
pub fn summarize(
    records: &[ActivityRecord],
    window: Window,
    scope: Scope,
    mastery: &MasteryReport,
) -> Summary {
    let mut subjects: Vec<SubjectSummary> = ALL_SUBJECTS
        .iter()
        .map(|&s| SubjectSummary::zero(s, mastery.mastery_pct(s)))
        .collect();
    let mut subject_scores: Vec<ScoreAcc> = ALL_SUBJECTS.iter().map(|_| ScoreAcc::default()).collect();

    let mut total_minutes = 0u32;
    let mut planned = 0usize;
    let mut completed = 0usize;
    let mut hints = 0u32;
    let mut scores = ScoreAcc::default();

    for r in records.iter().filter(|r| window.contains(r.date)) {
        let idx = r.subject.index();
        subjects[idx].minutes += r.elapsed_minutes;
        subjects[idx].hints += r.used_hints;
        let score = match (&r.mode, r.completed) {
            (SessionMode::Assess { score: Some(score) }, true) => Some(*score),
            _ => None,
        };
        if let Some(score) = score {
            subject_scores[idx].push(score);
        }

        if !scope.includes(r.subject) {
            continue;
        }
        planned += 1;
        total_minutes += r.elapsed_minutes;
        hints += r.used_hints;
        if r.completed {
            completed += 1;
        }
        if let Some(score) = score {
            scores.push(score);
        }
    }

    for (summary, acc) in subjects.iter_mut().zip(&subject_scores) {
        summary.assess_avg = acc.mean();
    }

    Summary {
        window,
        scope,
        weekly: WeeklySummary {
            week_of: window.start,
            total_minutes,
            sessions_planned: planned,
            sessions_completed: completed,
            adherence_pct: adherence_pct(completed, planned),
            assess_avg: scores.mean(),
            hints_used: hints,
            strongest_units: ranked_units(&mastery.strongest_units, scope),
            weakest_units: ranked_units(&mastery.weakest_units, scope),
        },
        subjects,
    }
}

/// Memoizes summaries by window and scope. Callers invalidate whenever the
/// underlying records or the mastery report change.
#[derive(Default)]
pub struct SummaryCache {
    entries: HashMap<(Window, Scope), Summary>,
}

impl SummaryCache {
    pub fn get_or_compute(
        &mut self,
        window: Window,
        scope: Scope,
        compute: impl FnOnce() -> Summary,
    ) -> &Summary {
        self.entries.entry((window, scope)).or_insert_with(compute)
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn unit(id: &str, subject: Subject) -> UnitRef {
        UnitRef {
            id: id.into(),
            title: format!("Unit {id}"),
            subject,
        }
    }

    fn record(
        id: &str,
        day: u32,
        subject: Subject,
        mode: SessionMode,
        completed: bool,
        minutes: u32,
        hints: u32,
    ) -> ActivityRecord {
        ActivityRecord {
            session_id: SessionId::new(id),
            date: date(day),
            subject,
            unit: unit(&format!("u-{id}"), subject),
            mode,
            completed,
            elapsed_minutes: minutes,
            used_hints: hints,
        }
    }

    fn week() -> Window {
        // 2026-03-02 is a Monday.
        Window::week_of(date(4))
    }

    #[test]
    fn test_week_window_starts_monday() {
        let w = week();
        assert_eq!(w.start, date(2));
        assert_eq!(w.end, date(8));
        assert!(w.contains(date(8)));
        assert!(!w.contains(date(9)));
        assert_eq!(w.dates().count(), 7);
        assert_eq!(Window::week_of(date(2)), w);
    }

    #[test]
    fn test_empty_window_is_zero_filled() {
        let summary = summarize(&[], week(), Scope::All, &MasteryReport::default());
        assert_eq!(summary.weekly.adherence_pct, 0);
        assert_eq!(summary.weekly.total_minutes, 0);
        assert_eq!(summary.weekly.assess_avg, 0.0);
        assert_eq!(summary.subjects.len(), ALL_SUBJECTS.len());
        for (s, expected) in summary.subjects.iter().zip(ALL_SUBJECTS) {
            assert_eq!(s.subject, expected);
            assert_eq!(s.minutes, 0);
            assert_eq!(s.hints, 0);
            assert_eq!(s.mastery_pct, 0);
        }
    }

    #[test]
    fn test_subject_without_activity_still_present() {
        let records = vec![record("a", 3, Subject::Math, SessionMode::Tutor, true, 30, 2)];
        let summary = summarize(&records, week(), Scope::All, &MasteryReport::default());
        let english = summary
            .subjects
            .iter()
            .find(|s| s.subject == Subject::English)
            .unwrap();
        assert_eq!(english, &SubjectSummary::zero(Subject::English, 0));
    }

    #[test]
    fn test_rollup_counts() {
        let records = vec![
            record("a", 2, Subject::Math, SessionMode::Assess { score: Some(8.0) }, true, 15, 1),
            record("b", 3, Subject::Math, SessionMode::Assess { score: Some(9.0) }, true, 15, 0),
            // Not completed: score ignored.
            record("c", 3, Subject::Math, SessionMode::Assess { score: Some(2.0) }, false, 5, 4),
            record("d", 4, Subject::English, SessionMode::Tutor, false, 20, 3),
            // Outside the window.
            record("e", 9, Subject::English, SessionMode::Tutor, true, 60, 9),
        ];
        let summary = summarize(&records, week(), Scope::All, &MasteryReport::default());
        let w = &summary.weekly;
        assert_eq!(w.total_minutes, 55);
        assert_eq!(w.sessions_planned, 4);
        assert_eq!(w.sessions_completed, 2);
        assert_eq!(w.adherence_pct, 50);
        assert!((w.assess_avg - 8.5).abs() < 1e-9);
        assert_eq!(w.hints_used, 8);
        assert_eq!(w.week_of, date(2));

        let math = &summary.subjects[Subject::Math.index()];
        assert_eq!(math.minutes, 35);
        assert_eq!(math.hints, 5);
        assert!((math.assess_avg - 8.5).abs() < 1e-9);
        let english = &summary.subjects[Subject::English.index()];
        assert_eq!(english.minutes, 20);
        assert_eq!(english.assess_avg, 0.0);
    }

    #[test]
    fn test_subject_scope_limits_weekly_totals() {
        let records = vec![
            record("a", 2, Subject::Math, SessionMode::Tutor, true, 15, 1),
            record("b", 3, Subject::English, SessionMode::Tutor, false, 25, 2),
        ];
        let mastery = MasteryReport {
            subjects: vec![],
            strongest_units: vec![],
            weakest_units: vec![unit("u1", Subject::Math), unit("u7", Subject::English)],
        };
        let summary = summarize(&records, week(), Scope::Subject(Subject::English), &mastery);
        assert_eq!(summary.weekly.total_minutes, 25);
        assert_eq!(summary.weekly.sessions_planned, 1);
        assert_eq!(summary.weekly.adherence_pct, 0);
        assert_eq!(summary.weekly.weakest_units, vec![unit("u7", Subject::English)]);
        // Per-subject rows keep their fixed shape.
        assert_eq!(summary.subjects.len(), 2);
        assert_eq!(summary.subjects[Subject::Math.index()].minutes, 15);
    }

    #[test]
    fn test_mastery_passthrough_and_truncation() {
        let mastery = MasteryReport {
            subjects: vec![SubjectMastery {
                subject: Subject::English,
                mastery_pct: 65,
            }],
            strongest_units: vec![],
            weakest_units: vec![
                unit("u1", Subject::Math),
                UnitRef {
                    id: "".into(),
                    title: "no id".into(),
                    subject: Subject::Math,
                },
                unit("u2", Subject::Math),
                unit("u3", Subject::English),
                unit("u4", Subject::English),
            ],
        };
        let summary = summarize(&[], week(), Scope::All, &mastery);
        assert_eq!(summary.subjects[Subject::English.index()].mastery_pct, 65);
        assert_eq!(summary.subjects[Subject::Math.index()].mastery_pct, 0);
        let ids: Vec<&str> = summary.weekly.weakest_units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_summarize_is_deterministic() {
        let records = vec![
            record("a", 2, Subject::Math, SessionMode::Assess { score: Some(7.5) }, true, 15, 1),
            record("b", 5, Subject::English, SessionMode::Handbook, true, 10, 0),
        ];
        let mastery = MasteryReport::default();
        let first = summarize(&records, week(), Scope::All, &mastery);
        let second = summarize(&records, week(), Scope::All, &mastery);
        assert_eq!(first, second);
    }

    #[test]
    fn test_adherence_guards_zero_planned() {
        assert_eq!(adherence_pct(0, 0), 0);
        assert_eq!(adherence_pct(2, 3), 67);
        assert_eq!(adherence_pct(1, 8), 13);
        assert_eq!(adherence_pct(3, 3), 100);
    }

    #[test]
    fn test_merge_prefers_live_sessions() {
        use crate::plan::session::{PlannedMinutes, Priority, Progress};

        let logged = record("a", 2, Subject::Math, SessionMode::Tutor, true, 10, 0);
        let live = Session {
            id: SessionId::new("a"),
            date: date(2),
            subject: Subject::Math,
            unit: unit("u-a", Subject::Math),
            mode: SessionMode::Tutor,
            planned: PlannedMinutes::Thirty,
            start_at: None,
            priority: Priority::NORMAL,
            note: String::new(),
            status: SessionStatus::Done,
            progress: Progress {
                elapsed_minutes: 25,
                used_hints: 1,
            },
        };
        let older = record("z", 1, Subject::English, SessionMode::Tutor, true, 5, 0);

        let merged = merge_records(vec![logged, older], [&live]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].session_id.as_str(), "z");
        assert_eq!(merged[1].elapsed_minutes, 25);
        assert_eq!(merged[1].used_hints, 1);
    }

    #[test]
    fn test_cache_memoizes_until_invalidated() {
        let mut cache = SummaryCache::default();
        let mastery = MasteryReport::default();
        let mut calls = 0;
        for _ in 0..3 {
            cache.get_or_compute(week(), Scope::All, || {
                calls += 1;
                summarize(&[], week(), Scope::All, &mastery)
            });
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);

        cache.invalidate();
        assert!(cache.is_empty());
        cache.get_or_compute(week(), Scope::All, || {
            calls += 1;
            summarize(&[], week(), Scope::All, &mastery)
        });
        assert_eq!(calls, 2);
    }
}
