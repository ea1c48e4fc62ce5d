use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::plan::session::{Session, SessionId, SessionStatus};
use crate::plan::subject::Subject;

/// Owns every planned session. Mutation goes through `pub(crate)` primitives
/// so only the scheduler and the timer can change records.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionStore {
    pub fn from_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let mut store = Self::default();
        for mut s in sessions {
            // Nothing can be running across a reload; the timer state is not persisted.
            if s.status == SessionStatus::Running {
                s.status = SessionStatus::Idle;
            }
            store.sessions.insert(s.id.clone(), s);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn running(&self) -> Option<&Session> {
        self.sessions
            .values()
            .find(|s| s.status == SessionStatus::Running)
    }

    pub fn on_date(&self, date: NaiveDate) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(move |s| s.date == date)
    }

    /// Sessions of one day in display order: by start time (unscheduled last),
    /// then by priority.
    pub fn day_view(&self, date: NaiveDate, subject: Option<Subject>) -> Vec<&Session> {
        let mut list: Vec<&Session> = self
            .on_date(date)
            .filter(|s| subject.is_none_or(|subj| s.subject == subj))
            .collect();
        list.sort_by(|a, b| {
            let a_key = (a.start_at.is_none(), a.start_at, a.priority);
            let b_key = (b.start_at.is_none(), b.start_at, b.priority);
            a_key.cmp(&b_key).then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    pub(crate) fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub(crate) fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub(crate) fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::plan::session::{PlannedMinutes, Priority, Progress, SessionMode, UnitRef};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn make(id: &str, date: NaiveDate, subject: Subject, start: Option<(u32, u32)>, prio: u8) -> Session {
        Session {
            id: SessionId::new(id),
            date,
            subject,
            unit: UnitRef {
                id: format!("u-{id}"),
                title: format!("Unit {id}"),
                subject,
            },
            mode: SessionMode::Tutor,
            planned: PlannedMinutes::TwentyFive,
            start_at: start.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            priority: Priority::try_from(prio).unwrap(),
            note: String::new(),
            status: SessionStatus::Idle,
            progress: Progress::default(),
        }
    }

    #[test]
    fn test_day_view_orders_by_start_then_priority() {
        let store = SessionStore::from_sessions([
            make("a", day(2), Subject::Math, None, 1),
            make("b", day(2), Subject::Math, Some((9, 0)), 2),
            make("c", day(2), Subject::Math, Some((7, 30)), 3),
            make("d", day(2), Subject::English, Some((9, 0)), 1),
            make("e", day(3), Subject::Math, Some((6, 0)), 1),
        ]);

        let ids: Vec<&str> = store
            .day_view(day(2), None)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "d", "b", "a"]);

        let math: Vec<&str> = store
            .day_view(day(2), Some(Subject::Math))
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(math, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_reload_clears_running_status() {
        let mut s = make("a", day(2), Subject::Math, None, 1);
        s.status = SessionStatus::Running;
        let store = SessionStore::from_sessions([s]);
        assert!(store.running().is_none());
        assert_eq!(store.get(&SessionId::new("a")).unwrap().status, SessionStatus::Idle);
    }
}
