use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::plan::session::Session;
use crate::plan::summary::{ActivityRecord, MasteryReport};

const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionsData {
    pub schema_version: u32,
    pub sessions: Vec<Session>,
}

impl Default for SessionsData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sessions: Vec::new(),
        }
    }
}

impl SessionsData {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            ..Self::default()
        }
    }

    /// Check if loaded data has a stale schema version and needs reset.
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }
}

/// Completed-session log for one calendar day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryDay {
    pub schema_version: u32,
    pub date: NaiveDate,
    pub entries: Vec<ActivityRecord>,
}

impl HistoryDay {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            date,
            entries: Vec::new(),
        }
    }

    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }

    /// Insert or replace by session id.
    pub fn upsert(&mut self, record: ActivityRecord) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.session_id == record.session_id)
        {
            Some(existing) => *existing = record,
            None => self.entries.push(record),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasteryData {
    pub schema_version: u32,
    #[serde(flatten)]
    pub report: MasteryReport,
}

impl Default for MasteryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            report: MasteryReport::default(),
        }
    }
}

pub const EXPORT_VERSION: u32 = 1;

/// Everything a learner's data directory holds, plus the active config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub studyplan_export_version: u32,
    pub exported_at: DateTime<Utc>,
    pub config: Config,
    pub sessions: SessionsData,
    pub history: Vec<HistoryDay>,
    pub mastery: MasteryData,
}
