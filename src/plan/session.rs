use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::plan::error::PlanError;
use crate::plan::subject::Subject;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A knowledge unit as referenced by sessions, alerts and mastery reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    pub id: String,
    pub title: String,
    pub subject: Subject,
}

/// What kind of study a session is. Only assessments produce a score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SessionMode {
    Tutor,
    Assess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<f64>,
    },
    Handbook,
}

impl SessionMode {
    pub fn assess() -> Self {
        SessionMode::Assess { score: None }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Tutor => "tutor",
            SessionMode::Assess { .. } => "assess",
            SessionMode::Handbook => "handbook",
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            SessionMode::Assess { score } => *score,
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SessionMode::Tutor => SessionMode::assess(),
            SessionMode::Assess { .. } => SessionMode::Handbook,
            SessionMode::Handbook => SessionMode::Tutor,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PlannedMinutes {
    Fifteen,
    TwentyFive,
    Thirty,
    FortyFive,
    Sixty,
}

pub const ALL_DURATIONS: [PlannedMinutes; 5] = [
    PlannedMinutes::Fifteen,
    PlannedMinutes::TwentyFive,
    PlannedMinutes::Thirty,
    PlannedMinutes::FortyFive,
    PlannedMinutes::Sixty,
];

impl PlannedMinutes {
    pub fn minutes(self) -> u32 {
        match self {
            PlannedMinutes::Fifteen => 15,
            PlannedMinutes::TwentyFive => 25,
            PlannedMinutes::Thirty => 30,
            PlannedMinutes::FortyFive => 45,
            PlannedMinutes::Sixty => 60,
        }
    }

    pub fn seconds(self) -> u64 {
        self.minutes() as u64 * 60
    }

    pub fn next(self) -> Self {
        let idx = ALL_DURATIONS.iter().position(|d| *d == self).unwrap_or(0);
        ALL_DURATIONS[(idx + 1) % ALL_DURATIONS.len()]
    }
}

impl TryFrom<u32> for PlannedMinutes {
    type Error = PlanError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        ALL_DURATIONS
            .into_iter()
            .find(|d| d.minutes() == minutes)
            .ok_or(PlanError::InvalidDuration(minutes))
    }
}

impl From<PlannedMinutes> for u32 {
    fn from(d: PlannedMinutes) -> u32 {
        d.minutes()
    }
}

impl Default for PlannedMinutes {
    fn default() -> Self {
        PlannedMinutes::TwentyFive
    }
}

/// 1 = high, 3 = low.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGH: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(2);
    pub const LOW: Priority = Priority(3);

    pub fn level(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if (1..=3).contains(&level) {
            Ok(Priority(level))
        } else {
            Err(format!("priority must be 1..=3, got {level}"))
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Done,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub elapsed_minutes: u32,
    pub used_hints: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub date: NaiveDate,
    pub subject: Subject,
    pub unit: UnitRef,
    #[serde(flatten)]
    pub mode: SessionMode,
    pub planned: PlannedMinutes,
    #[serde(default)]
    pub start_at: Option<NaiveTime>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub progress: Progress,
}

impl Session {
    pub fn is_done(&self) -> bool {
        self.status == SessionStatus::Done
    }

    /// Seconds left against the planned duration given extra uncommitted focus time.
    pub fn remaining_secs(&self, uncommitted_focus_secs: u64) -> u64 {
        let spent = self.progress.elapsed_minutes as u64 * 60 + uncommitted_focus_secs;
        self.planned.seconds().saturating_sub(spent)
    }
}

/// Input for quick-add. `unit_id` may be empty; the scheduler then derives one.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionDraft {
    pub date: NaiveDate,
    pub subject: Subject,
    pub unit_id: String,
    pub unit_title: String,
    pub mode: SessionMode,
    pub planned_minutes: u32,
    pub start_at: Option<NaiveTime>,
    pub priority: Priority,
    pub note: String,
}

impl SessionDraft {
    pub fn new(date: NaiveDate, subject: Subject, unit_title: impl Into<String>) -> Self {
        Self {
            date,
            subject,
            unit_id: String::new(),
            unit_title: unit_title.into(),
            mode: SessionMode::Tutor,
            planned_minutes: PlannedMinutes::default().minutes(),
            start_at: None,
            priority: Priority::default(),
            note: String::new(),
        }
    }
}

/// Caller-editable fields. `status` and `progress` exist only so that a patch
/// built from untrusted input can be rejected instead of silently applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionPatch {
    pub subject: Option<Subject>,
    pub unit: Option<UnitRef>,
    pub mode: Option<SessionMode>,
    pub planned_minutes: Option<u32>,
    pub start_at: Option<Option<NaiveTime>>,
    pub priority: Option<Priority>,
    pub note: Option<String>,
    pub status: Option<SessionStatus>,
    pub progress: Option<Progress>,
}

impl SessionPatch {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        Session {
            id: SessionId::new("s1"),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            subject: Subject::Math,
            unit: UnitRef {
                id: "u1".into(),
                title: "Lập hệ phương trình".into(),
                subject: Subject::Math,
            },
            mode: SessionMode::Assess { score: Some(8.5) },
            planned: PlannedMinutes::FortyFive,
            start_at: NaiveTime::from_hms_opt(7, 30, 0),
            priority: Priority::HIGH,
            note: String::new(),
            status: SessionStatus::Idle,
            progress: Progress {
                elapsed_minutes: 10,
                used_hints: 2,
            },
        }
    }

    #[test]
    fn test_duration_rejects_values_outside_set() {
        assert_eq!(PlannedMinutes::try_from(45), Ok(PlannedMinutes::FortyFive));
        assert_eq!(
            PlannedMinutes::try_from(20),
            Err(PlanError::InvalidDuration(20))
        );
    }

    #[test]
    fn test_duration_next_wraps() {
        assert_eq!(PlannedMinutes::Sixty.next(), PlannedMinutes::Fifteen);
        assert_eq!(PlannedMinutes::Fifteen.next(), PlannedMinutes::TwentyFive);
    }

    #[test]
    fn test_priority_bounds() {
        assert!(Priority::try_from(0).is_err());
        assert!(Priority::try_from(4).is_err());
        assert_eq!(Priority::try_from(1).unwrap(), Priority::HIGH);
    }

    #[test]
    fn test_remaining_counts_committed_and_uncommitted_time() {
        let s = sample();
        assert_eq!(s.remaining_secs(0), 35 * 60);
        assert_eq!(s.remaining_secs(90), 35 * 60 - 90);
        assert_eq!(s.remaining_secs(10_000), 0);
    }

    #[test]
    fn test_session_json_shape() {
        let s = sample();
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["mode"], "assess");
        assert_eq!(value["score"], 8.5);
        assert_eq!(value["planned"], 45);
        assert_eq!(value["subject"], "Toán");
        assert_eq!(value["status"], "idle");

        let back: Session = serde_json::from_value(value).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_session_json_rejects_bad_duration() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["planned"] = serde_json::json!(20);
        assert!(serde_json::from_value::<Session>(value).is_err());
    }
}
