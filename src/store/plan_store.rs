use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::config::Config;
use crate::plan::session::SessionId;
use crate::plan::summary::{ActivityRecord, MasteryReport, Window};
use crate::store::kv::KeyValueStore;
use crate::store::schema::{EXPORT_VERSION, ExportData, HistoryDay, MasteryData, SessionsData};

const SESSIONS_KEY: &str = "sessions";
const MASTERY_KEY: &str = "mastery";
const HISTORY_PREFIX: &str = "history";

fn history_key(date: NaiveDate) -> String {
    format!("{HISTORY_PREFIX}/{}", date.format("%Y-%m-%d"))
}

/// Typed persistence for a learner's plan on top of any key-value backend.
pub struct PlanStore<K: KeyValueStore> {
    kv: K,
}

impl<K: KeyValueStore> PlanStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Missing or unreadable entries load as the default value.
    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.kv.get(key) {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(key, error = %e, "discarding unreadable entry");
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                warn!(key, error = %e, "store read failed");
                T::default()
            }
        }
    }

    fn save<T: Serialize>(&mut self, key: &str, data: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(data)?;
        self.kv.set(key, &json)
    }

    pub fn load_sessions(&self) -> SessionsData {
        let data: SessionsData = self.load(SESSIONS_KEY);
        if data.needs_reset() {
            warn!(version = data.schema_version, "session data has a stale schema, starting empty");
            return SessionsData::default();
        }
        data
    }

    pub fn save_sessions(&mut self, data: &SessionsData) -> Result<()> {
        self.save(SESSIONS_KEY, data)
    }

    pub fn load_history_day(&self, date: NaiveDate) -> HistoryDay {
        match self.kv.get(&history_key(date)) {
            Ok(Some(bytes)) => match serde_json::from_slice::<HistoryDay>(&bytes) {
                Ok(day) if !day.needs_reset() => day,
                Ok(_) => HistoryDay::new(date),
                Err(e) => {
                    warn!(%date, error = %e, "discarding unreadable history day");
                    HistoryDay::new(date)
                }
            },
            Ok(None) => HistoryDay::new(date),
            Err(e) => {
                warn!(%date, error = %e, "history read failed");
                HistoryDay::new(date)
            }
        }
    }

    /// Log a finished session under its date. Re-logging the same session
    /// replaces the earlier entry.
    pub fn append_history(&mut self, record: ActivityRecord) -> Result<()> {
        let date = record.date;
        let mut day = self.load_history_day(date);
        day.upsert(record);
        debug!(%date, entries = day.entries.len(), "history day updated");
        self.save(&history_key(date), &day)
    }

    /// Drop a session's record from the log of `date`. A day left empty is removed.
    pub fn remove_history(&mut self, date: NaiveDate, id: &SessionId) -> Result<()> {
        let mut day = self.load_history_day(date);
        let before = day.entries.len();
        day.entries.retain(|e| &e.session_id != id);
        if day.entries.len() == before {
            return Ok(());
        }
        debug!(%date, session = %id, "history entry removed");
        if day.entries.is_empty() {
            self.kv.remove(&history_key(date))
        } else {
            self.save(&history_key(date), &day)
        }
    }

    /// Logged records for every day in the window, in date order.
    pub fn load_history(&self, window: Window) -> Vec<ActivityRecord> {
        window
            .dates()
            .flat_map(|date| self.load_history_day(date).entries)
            .collect()
    }

    pub fn load_mastery(&self) -> MasteryReport {
        let data: MasteryData = self.load(MASTERY_KEY);
        data.report
    }

    pub fn save_mastery(&mut self, report: &MasteryReport) -> Result<()> {
        let data = MasteryData {
            report: report.clone(),
            ..MasteryData::default()
        };
        self.save(MASTERY_KEY, &data)
    }

    fn history_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self
            .kv
            .list(HISTORY_PREFIX)?
            .iter()
            .filter_map(|key| key.strip_prefix("history/"))
            .filter_map(|stem| NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok())
            .collect())
    }

    /// Bundle all persisted data and the active config.
    pub fn export_all(&self, config: &Config) -> Result<ExportData> {
        let history = self
            .history_dates()?
            .into_iter()
            .map(|date| self.load_history_day(date))
            .filter(|day| !day.entries.is_empty())
            .collect();

        Ok(ExportData {
            studyplan_export_version: EXPORT_VERSION,
            exported_at: Utc::now(),
            config: config.clone(),
            sessions: self.load_sessions(),
            history,
            mastery: self.load(MASTERY_KEY),
        })
    }

    /// Replace stored data with an export. Every payload is serialized before
    /// anything is written, and history days absent from the export are removed.
    pub fn import_all(&mut self, data: &ExportData) -> Result<()> {
        if data.studyplan_export_version != EXPORT_VERSION {
            bail!(
                "Unsupported export version: {} (expected {})",
                data.studyplan_export_version,
                EXPORT_VERSION
            );
        }
        if data.sessions.needs_reset() {
            bail!(
                "Unsupported session schema version: {}",
                data.sessions.schema_version
            );
        }

        let mut staged: Vec<(String, Vec<u8>)> = vec![
            (SESSIONS_KEY.to_string(), serde_json::to_vec_pretty(&data.sessions)?),
            (MASTERY_KEY.to_string(), serde_json::to_vec_pretty(&data.mastery)?),
        ];
        for day in &data.history {
            staged.push((history_key(day.date), serde_json::to_vec_pretty(day)?));
        }

        let stale: Vec<NaiveDate> = self
            .history_dates()?
            .into_iter()
            .filter(|date| !data.history.iter().any(|d| d.date == *date))
            .collect();

        for (key, bytes) in &staged {
            self.kv.set(key, bytes)?;
        }
        for date in stale {
            self.kv.remove(&history_key(date))?;
        }
        debug!(
            sessions = data.sessions.sessions.len(),
            history_days = data.history.len(),
            "import complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::session::{SessionId, SessionMode, UnitRef};
    use crate::plan::subject::Subject;
    use crate::plan::summary::SubjectMastery;
    use crate::store::kv::{FileKvStore, MemoryKvStore};
    use tempfile::TempDir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn record(id: &str, day: u32, minutes: u32) -> ActivityRecord {
        ActivityRecord {
            session_id: SessionId::new(id),
            date: date(day),
            subject: Subject::English,
            unit: UnitRef {
                id: "u7".into(),
                title: "Câu bị động".into(),
                subject: Subject::English,
            },
            mode: SessionMode::Assess { score: Some(7.5) },
            completed: true,
            elapsed_minutes: minutes,
            used_hints: 1,
        }
    }

    fn memory_store() -> PlanStore<MemoryKvStore> {
        PlanStore::new(MemoryKvStore::default())
    }

    #[test]
    fn test_missing_entries_load_defaults() {
        let store = memory_store();
        assert!(store.load_sessions().sessions.is_empty());
        assert!(store.load_history(Window::week_of(date(4))).is_empty());
        assert_eq!(store.load_mastery(), MasteryReport::default());
    }

    #[test]
    fn test_corrupt_sessions_load_empty() {
        let mut kv = MemoryKvStore::default();
        kv.set(SESSIONS_KEY, b"{not json").unwrap();
        let store = PlanStore::new(kv);
        assert!(store.load_sessions().sessions.is_empty());
    }

    #[test]
    fn test_stale_schema_resets() {
        let mut kv = MemoryKvStore::default();
        kv.set(SESSIONS_KEY, br#"{"schema_version": 99, "sessions": []}"#)
            .unwrap();
        let store = PlanStore::new(kv);
        assert!(!store.load_sessions().needs_reset());
    }

    #[test]
    fn test_history_is_keyed_by_day_and_upserts() {
        let mut store = memory_store();
        store.append_history(record("a", 2, 10)).unwrap();
        store.append_history(record("b", 4, 15)).unwrap();
        store.append_history(record("a", 2, 25)).unwrap();

        assert!(store.kv().get("history/2026-03-02").unwrap().is_some());
        assert_eq!(store.load_history_day(date(2)).entries.len(), 1);

        let week = store.load_history(Window::week_of(date(4)));
        assert_eq!(week.len(), 2);
        assert_eq!(week[0].elapsed_minutes, 25);
        assert_eq!(week[1].session_id.as_str(), "b");

        let day = store.load_history(Window::day(date(4)));
        assert_eq!(day.len(), 1);
    }

    #[test]
    fn test_remove_history_drops_entry_and_empty_day() {
        let mut store = memory_store();
        store.append_history(record("a", 2, 10)).unwrap();
        store.append_history(record("b", 2, 15)).unwrap();

        store.remove_history(date(2), &SessionId::new("a")).unwrap();
        let day = store.load_history_day(date(2));
        assert_eq!(day.entries.len(), 1);
        assert_eq!(day.entries[0].session_id.as_str(), "b");

        store.remove_history(date(2), &SessionId::new("missing")).unwrap();
        assert_eq!(store.load_history_day(date(2)).entries.len(), 1);

        store.remove_history(date(2), &SessionId::new("b")).unwrap();
        assert!(store.kv().get("history/2026-03-02").unwrap().is_none());
    }

    #[test]
    fn test_mastery_round_trip() {
        let mut store = memory_store();
        let report = MasteryReport {
            subjects: vec![SubjectMastery {
                subject: Subject::Math,
                mastery_pct: 58,
            }],
            strongest_units: vec![],
            weakest_units: vec![],
        };
        store.save_mastery(&report).unwrap();
        assert_eq!(store.load_mastery(), report);
    }

    #[test]
    fn test_export_import_between_file_stores() {
        let dir = TempDir::new().unwrap();
        let mut store = PlanStore::new(FileKvStore::with_base_dir(dir.path().to_path_buf()).unwrap());
        store.append_history(record("a", 2, 10)).unwrap();
        store.append_history(record("b", 5, 20)).unwrap();

        let config = Config::default();
        let export = store.export_all(&config).unwrap();
        assert_eq!(export.studyplan_export_version, EXPORT_VERSION);
        assert_eq!(export.history.len(), 2);

        let dir2 = TempDir::new().unwrap();
        let mut store2 = PlanStore::new(FileKvStore::with_base_dir(dir2.path().to_path_buf()).unwrap());
        store2.append_history(record("old", 20, 5)).unwrap();
        store2.import_all(&export).unwrap();

        let imported = store2.load_history(Window::week_of(date(4)));
        assert_eq!(imported.len(), 2);
        assert!(store2.load_history_day(date(20)).entries.is_empty());
    }

    #[test]
    fn test_version_rejection() {
        let mut store = memory_store();
        let mut export = store.export_all(&Config::default()).unwrap();
        export.studyplan_export_version = 99;

        let result = store.import_all(&export);
        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Unsupported export version"));
        assert!(err_msg.contains("99"));
    }
}
