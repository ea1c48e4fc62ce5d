use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate, NaiveTime, Utc};

use studyplan::config::Config;
use studyplan::plan::session::{
    ALL_DURATIONS, PlannedMinutes, Priority, Progress, Session, SessionId, SessionMode,
    SessionStatus, UnitRef,
};
use studyplan::plan::subject::{ALL_SUBJECTS, Subject};
use studyplan::plan::summary::{ActivityRecord, MasteryReport, SubjectMastery, Window};
use studyplan::store::schema::{EXPORT_VERSION, ExportData, HistoryDay, MasteryData, SessionsData};

const SESSIONS_PER_SUBJECT: u32 = 5;

struct SubjectWeek {
    subject: Subject,
    mastery_pct: u32,
    minutes: u32,
    assess_score: f64,
    hints: u32,
}

struct DemoLearner {
    id: &'static str,
    name: &'static str,
    class_name: &'static str,
    adherence_pct: u32,
    weak_unit: (&'static str, &'static str, Subject),
    subjects: [SubjectWeek; 2],
}

fn demo_learners() -> Vec<DemoLearner> {
    vec![
        DemoLearner {
            id: "st1",
            name: "Nguyễn Minh Khoa",
            class_name: "9A",
            adherence_pct: 72,
            weak_unit: ("u1", "Lập hệ phương trình", Subject::Math),
            subjects: [
                week(Subject::Math, 62, 120, 8.0, 5),
                week(Subject::English, 65, 90, 8.5, 2),
            ],
        },
        DemoLearner {
            id: "st2",
            name: "Trần Gia Linh",
            class_name: "9A",
            adherence_pct: 55,
            weak_unit: ("u2", "Hệ thức Vi-ét", Subject::Math),
            subjects: [
                week(Subject::Math, 45, 80, 6.8, 7),
                week(Subject::English, 70, 60, 8.2, 1),
            ],
        },
        DemoLearner {
            id: "st3",
            name: "Phạm Bảo Nam",
            class_name: "9A",
            adherence_pct: 88,
            weak_unit: ("u3", "Góc nội tiếp", Subject::Math),
            subjects: [
                week(Subject::Math, 72, 150, 8.7, 2),
                week(Subject::English, 68, 110, 8.0, 1),
            ],
        },
        DemoLearner {
            id: "st4",
            name: "Lưu Thảo Vy",
            class_name: "9B",
            adherence_pct: 67,
            weak_unit: ("u7", "Present Perfect", Subject::English),
            subjects: [
                week(Subject::Math, 58, 70, 7.2, 3),
                week(Subject::English, 50, 110, 7.5, 5),
            ],
        },
    ]
}

fn week(subject: Subject, mastery_pct: u32, minutes: u32, assess_score: f64, hints: u32) -> SubjectWeek {
    SubjectWeek {
        subject,
        mastery_pct,
        minutes,
        assess_score,
        hints,
    }
}

fn unit(id: &str, title: &str, subject: Subject) -> UnitRef {
    UnitRef {
        id: id.to_string(),
        title: title.to_string(),
        subject,
    }
}

/// Smallest offered duration that fits `minutes`.
fn fitting_duration(minutes: u32) -> PlannedMinutes {
    ALL_DURATIONS
        .iter()
        .copied()
        .find(|d| d.minutes() >= minutes)
        .unwrap_or(PlannedMinutes::Sixty)
}

/// Spread `total` over `parts` as evenly as integers allow.
fn share(total: u32, parts: u32, index: u32) -> u32 {
    total / parts + u32::from(index < total % parts)
}

/// A week of sessions for one learner. The assessment is the first session of
/// each subject and is always among the completed ones so its score counts.
fn week_sessions(learner: &DemoLearner, week_start: NaiveDate) -> Vec<Session> {
    let total = SESSIONS_PER_SUBJECT * ALL_SUBJECTS.len() as u32;
    let completed_total = (learner.adherence_pct * total + 50) / 100;
    let mut sessions = Vec::new();

    for (s_idx, sw) in learner.subjects.iter().enumerate() {
        let completed_here = share(completed_total, ALL_SUBJECTS.len() as u32, s_idx as u32)
            .min(SESSIONS_PER_SUBJECT)
            .max(1);
        for i in 0..SESSIONS_PER_SUBJECT {
            let done = i < completed_here;
            let elapsed = if done {
                share(sw.minutes, completed_here, i)
            } else {
                0
            };
            let mode = if i == 0 {
                SessionMode::Assess {
                    score: Some(sw.assess_score),
                }
            } else if i % 2 == 1 {
                SessionMode::Tutor
            } else {
                SessionMode::Handbook
            };
            let unit_ref = if sw.subject == learner.weak_unit.2 && i == 1 {
                unit(learner.weak_unit.0, learner.weak_unit.1, learner.weak_unit.2)
            } else {
                unit(
                    &format!("{}-w{}", sw.subject.index(), i),
                    &format!("{} review {}", sw.subject.label(), i + 1),
                    sw.subject,
                )
            };
            sessions.push(Session {
                id: SessionId::new(format!("{}-{}-{}", learner.id, sw.subject.index(), i)),
                date: week_start + Days::new(u64::from(i)),
                subject: sw.subject,
                unit: unit_ref,
                mode,
                planned: fitting_duration(elapsed),
                start_at: NaiveTime::from_hms_opt(19 + s_idx as u32, 0, 0),
                priority: if i == 1 { Priority::HIGH } else { Priority::NORMAL },
                note: String::new(),
                status: if done {
                    SessionStatus::Done
                } else {
                    SessionStatus::Idle
                },
                progress: Progress {
                    elapsed_minutes: elapsed,
                    used_hints: if done {
                        share(sw.hints, completed_here, i)
                    } else {
                        0
                    },
                },
            });
        }
    }
    sessions
}

/// The plan a learner sees when opening the app today.
fn today_sessions(learner_id: &str, today: NaiveDate) -> Vec<Session> {
    let entry = |n: u32,
                 unit_ref: UnitRef,
                 mode: SessionMode,
                 planned: PlannedMinutes,
                 at: (u32, u32),
                 priority: Priority,
                 progress: Progress| Session {
        id: SessionId::new(format!("{learner_id}-today-{n}")),
        date: today,
        subject: unit_ref.subject,
        unit: unit_ref,
        mode,
        planned,
        start_at: NaiveTime::from_hms_opt(at.0, at.1, 0),
        priority,
        note: String::new(),
        status: SessionStatus::Idle,
        progress,
    };
    vec![
        entry(
            1,
            unit("u1", "Lập hệ phương trình", Subject::Math),
            SessionMode::Tutor,
            PlannedMinutes::FortyFive,
            (7, 30),
            Priority::HIGH,
            Progress {
                elapsed_minutes: 10,
                used_hints: 2,
            },
        ),
        entry(
            2,
            unit("u2", "Hệ thức Vi-ét", Subject::Math),
            SessionMode::Handbook,
            PlannedMinutes::Fifteen,
            (9, 0),
            Priority::NORMAL,
            Progress::default(),
        ),
        entry(
            3,
            unit("u7", "Present Perfect", Subject::English),
            SessionMode::Tutor,
            PlannedMinutes::Thirty,
            (20, 15),
            Priority::NORMAL,
            Progress::default(),
        ),
    ]
}

fn history_days(sessions: &[Session]) -> Vec<HistoryDay> {
    let mut by_date: BTreeMap<NaiveDate, HistoryDay> = BTreeMap::new();
    for s in sessions.iter().filter(|s| s.is_done()) {
        by_date
            .entry(s.date)
            .or_insert_with(|| HistoryDay::new(s.date))
            .upsert(ActivityRecord::from(s));
    }
    by_date.into_values().collect()
}

fn mastery(learner: &DemoLearner) -> MasteryData {
    let mut subjects: Vec<&SubjectWeek> = learner.subjects.iter().collect();
    subjects.sort_by_key(|sw| std::cmp::Reverse(sw.mastery_pct));
    let strongest = subjects.first().map(|sw| {
        unit(
            &format!("{}-w4", sw.subject.index()),
            &format!("{} review 5", sw.subject.label()),
            sw.subject,
        )
    });

    MasteryData {
        report: MasteryReport {
            subjects: learner
                .subjects
                .iter()
                .map(|sw| SubjectMastery {
                    subject: sw.subject,
                    mastery_pct: sw.mastery_pct,
                })
                .collect(),
            strongest_units: strongest.into_iter().collect(),
            weakest_units: vec![unit(
                learner.weak_unit.0,
                learner.weak_unit.1,
                learner.weak_unit.2,
            )],
        },
        ..MasteryData::default()
    }
}

fn build_export(learner: &DemoLearner, today: NaiveDate) -> ExportData {
    let week_start = Window::week_of(today).start;
    let mut sessions = week_sessions(learner, week_start);
    if learner.id == "st1" {
        sessions.extend(today_sessions(learner.id, today));
    }

    let config = Config {
        learner_id: learner.id.to_string(),
        learner_name: learner.name.to_string(),
        class_name: learner.class_name.to_string(),
        ..Config::default()
    };

    ExportData {
        studyplan_export_version: EXPORT_VERSION,
        exported_at: Utc::now(),
        config,
        history: history_days(&sessions),
        sessions: SessionsData::new(sessions),
        mastery: mastery(learner),
    }
}

fn main() -> Result<()> {
    let today = Local::now().date_naive();
    let out_dir = Path::new("demo-data");
    fs::create_dir_all(out_dir).context("creating demo-data directory")?;

    for learner in demo_learners() {
        let export = build_export(&learner, today);
        let path = out_dir.join(format!("{}.json", learner.id));
        fs::write(&path, serde_json::to_string_pretty(&export)?)
            .with_context(|| format!("writing {}", path.display()))?;
        println!(
            "Wrote {} ({} sessions, week of {})",
            path.display(),
            export.sessions.sessions.len(),
            Window::week_of(today).start,
        );
    }
    Ok(())
}
