use chrono::{Days, NaiveDate};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use studyplan::plan::record_store::SessionStore;
use studyplan::plan::session::{
    PlannedMinutes, Priority, Progress, Session, SessionId, SessionMode, SessionStatus, UnitRef,
};
use studyplan::plan::subject::{ALL_SUBJECTS, Subject};
use studyplan::plan::summary::{
    ActivityRecord, MasteryReport, Scope, SummaryCache, Window, merge_records, summarize,
};

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

fn make_session(i: usize) -> Session {
    let subject = ALL_SUBJECTS[i % ALL_SUBJECTS.len()];
    Session {
        id: SessionId::new(format!("s{i:05}")),
        date: start_date() + Days::new((i / 4) as u64),
        subject,
        unit: UnitRef {
            id: format!("u{}", i % 40),
            title: format!("Unit {}", i % 40),
            subject,
        },
        mode: if i % 5 == 0 {
            SessionMode::Assess {
                score: Some((i % 11) as f64),
            }
        } else {
            SessionMode::Tutor
        },
        planned: PlannedMinutes::TwentyFive,
        start_at: None,
        priority: Priority::NORMAL,
        note: String::new(),
        status: if i % 3 == 0 {
            SessionStatus::Idle
        } else {
            SessionStatus::Done
        },
        progress: Progress {
            elapsed_minutes: (i % 30) as u32,
            used_hints: (i % 4) as u32,
        },
    }
}

fn make_history(count: usize) -> Vec<ActivityRecord> {
    (0..count).map(|i| ActivityRecord::from(&make_session(i))).collect()
}

fn bench_summarize(c: &mut Criterion) {
    // Roughly a school year at four sessions a day.
    let records = make_history(1500);
    let mastery = MasteryReport::default();
    let window = Window::week_of(start_date() + Days::new(180));

    c.bench_function("summarize week (1500 records)", |b| {
        b.iter(|| summarize(black_box(&records), window, Scope::All, &mastery))
    });

    c.bench_function("summarize subject scope (1500 records)", |b| {
        b.iter(|| {
            summarize(
                black_box(&records),
                window,
                Scope::Subject(Subject::English),
                &mastery,
            )
        })
    });
}

fn bench_merge(c: &mut Criterion) {
    let history = make_history(1500);
    let live = SessionStore::from_sessions((1400..1600).map(make_session));

    c.bench_function("merge_records (1500 logged, 200 live)", |b| {
        b.iter(|| merge_records(black_box(history.clone()), live.iter()))
    });
}

fn bench_cache(c: &mut Criterion) {
    let records = make_history(1500);
    let mastery = MasteryReport::default();
    let window = Window::week_of(start_date() + Days::new(180));
    let mut cache = SummaryCache::default();
    cache.get_or_compute(window, Scope::All, || {
        summarize(&records, window, Scope::All, &mastery)
    });

    c.bench_function("summary cache hit", |b| {
        b.iter(|| {
            cache
                .get_or_compute(black_box(window), Scope::All, || {
                    summarize(&records, window, Scope::All, &mastery)
                })
                .weekly
                .total_minutes
        })
    });
}

criterion_group!(benches, bench_summarize, bench_merge, bench_cache);
criterion_main!(benches);
