use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::plan::session::{Priority, Session, SessionStatus, UnitRef};
use crate::plan::summary::adherence_pct;

/// Weak-unit chips shown under today's list.
pub const MAX_WEAK_SUGGESTIONS: usize = 6;

/// Context for "today", recomputed whenever the day's sessions change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub budget_minutes: u32,
    pub scheduled_minutes: u32,
    pub elapsed_minutes: u32,
    pub session_count: usize,
    pub done_count: usize,
    pub high_priority_count: usize,
    pub adherence_pct: u32,
    pub weak_units: Vec<UnitRef>,
}

impl DayPlan {
    pub fn derive<'a>(
        date: NaiveDate,
        budget_minutes: u32,
        sessions: impl IntoIterator<Item = &'a Session>,
        mut weak_units: Vec<UnitRef>,
    ) -> Self {
        let mut plan = DayPlan {
            date,
            budget_minutes,
            scheduled_minutes: 0,
            elapsed_minutes: 0,
            session_count: 0,
            done_count: 0,
            high_priority_count: 0,
            adherence_pct: 0,
            weak_units: Vec::new(),
        };
        for s in sessions {
            plan.session_count += 1;
            plan.scheduled_minutes += s.planned.minutes();
            plan.elapsed_minutes += s.progress.elapsed_minutes;
            if s.status == SessionStatus::Done {
                plan.done_count += 1;
            }
            if s.priority == Priority::HIGH {
                plan.high_priority_count += 1;
            }
        }
        plan.adherence_pct = adherence_pct(plan.done_count, plan.session_count);
        weak_units.truncate(MAX_WEAK_SUGGESTIONS);
        plan.weak_units = weak_units;
        plan
    }

    pub fn over_budget(&self) -> bool {
        self.scheduled_minutes > self.budget_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::session::{PlannedMinutes, Progress, SessionId, SessionMode};
    use crate::plan::subject::Subject;

    fn make(id: &str, planned: PlannedMinutes, status: SessionStatus, elapsed: u32, prio: Priority) -> Session {
        Session {
            id: SessionId::new(id),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            subject: Subject::Math,
            unit: UnitRef {
                id: format!("u-{id}"),
                title: id.to_string(),
                subject: Subject::Math,
            },
            mode: SessionMode::Tutor,
            planned,
            start_at: None,
            priority: prio,
            note: String::new(),
            status,
            progress: Progress {
                elapsed_minutes: elapsed,
                used_hints: 0,
            },
        }
    }

    #[test]
    fn test_derive_totals() {
        let sessions = vec![
            make("a", PlannedMinutes::FortyFive, SessionStatus::Done, 40, Priority::HIGH),
            make("b", PlannedMinutes::Fifteen, SessionStatus::Idle, 5, Priority::NORMAL),
            make("c", PlannedMinutes::Thirty, SessionStatus::Idle, 0, Priority::HIGH),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let plan = DayPlan::derive(date, 80, &sessions, Vec::new());

        assert_eq!(plan.scheduled_minutes, 90);
        assert_eq!(plan.elapsed_minutes, 45);
        assert_eq!(plan.session_count, 3);
        assert_eq!(plan.done_count, 1);
        assert_eq!(plan.high_priority_count, 2);
        assert_eq!(plan.adherence_pct, 33);
        assert!(plan.over_budget());
    }

    #[test]
    fn test_empty_day_is_zero() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let plan = DayPlan::derive(date, 90, std::iter::empty(), Vec::new());
        assert_eq!(plan.adherence_pct, 0);
        assert_eq!(plan.session_count, 0);
        assert!(!plan.over_budget());
    }

    #[test]
    fn test_weak_units_truncated() {
        let units: Vec<UnitRef> = (0..9)
            .map(|i| UnitRef {
                id: format!("u{i}"),
                title: format!("Unit {i}"),
                subject: Subject::English,
            })
            .collect();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let plan = DayPlan::derive(date, 90, std::iter::empty(), units);
        assert_eq!(plan.weak_units.len(), MAX_WEAK_SUGGESTIONS);
        assert_eq!(plan.weak_units[0].id, "u0");
    }
}
