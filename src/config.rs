use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::plan::risk::{RiskThresholds, normalize_class_code};
use crate::plan::session::{ALL_DURATIONS, PlannedMinutes};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_learner_id")]
    pub learner_id: String,
    #[serde(default = "default_learner_name")]
    pub learner_name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default = "default_daily_budget_minutes")]
    pub daily_budget_minutes: u32,
    #[serde(default = "default_planned_minutes")]
    pub default_planned_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
    #[serde(default = "default_adherence_crit_pct")]
    pub adherence_crit_pct: u32,
    #[serde(default = "default_hint_warn_count")]
    pub hint_warn_count: u32,
    #[serde(default = "default_class_alert_limit")]
    pub class_alert_limit: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_theme() -> String {
    "terminal-default".to_string()
}
fn default_learner_id() -> String {
    "local".to_string()
}
fn default_learner_name() -> String {
    "Học sinh".to_string()
}
fn default_daily_budget_minutes() -> u32 {
    90
}
fn default_planned_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_tick_rate_ms() -> u64 {
    250
}
fn default_adherence_crit_pct() -> u32 {
    60
}
fn default_hint_warn_count() -> u32 {
    6
}
fn default_class_alert_limit() -> usize {
    6
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            learner_id: default_learner_id(),
            learner_name: default_learner_name(),
            class_name: String::new(),
            daily_budget_minutes: default_daily_budget_minutes(),
            default_planned_minutes: default_planned_minutes(),
            break_minutes: default_break_minutes(),
            tick_rate_ms: default_tick_rate_ms(),
            adherence_crit_pct: default_adherence_crit_pct(),
            hint_warn_count: default_hint_warn_count(),
            class_alert_limit: default_class_alert_limit(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studyplan")
            .join("config.toml")
    }

    /// Clamp numbers into usable ranges and drop values the planner would reject.
    /// Call after deserialization; hand-edited files can hold anything.
    pub fn validate(&mut self) {
        self.daily_budget_minutes = self.daily_budget_minutes.clamp(15, 600);
        self.break_minutes = self.break_minutes.clamp(1, 30);
        self.tick_rate_ms = self.tick_rate_ms.clamp(50, 1000);
        self.adherence_crit_pct = self.adherence_crit_pct.min(100);
        self.hint_warn_count = self.hint_warn_count.max(1);
        self.class_alert_limit = self.class_alert_limit.clamp(1, 50);

        if !ALL_DURATIONS
            .iter()
            .any(|d| d.minutes() == self.default_planned_minutes)
        {
            self.default_planned_minutes = default_planned_minutes();
        }
        self.class_name = normalize_class_code(&self.class_name).unwrap_or_default();
        // Used as a directory name under the data dir.
        self.learner_id.retain(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if self.learner_id.is_empty() {
            self.learner_id = default_learner_id();
        }
        if self.log_level.trim().is_empty() {
            self.log_level = default_log_level();
        }
    }

    pub fn default_duration(&self) -> PlannedMinutes {
        PlannedMinutes::try_from(self.default_planned_minutes).unwrap_or_default()
    }

    pub fn class_code(&self) -> Option<&str> {
        (!self.class_name.is_empty()).then_some(self.class_name.as_str())
    }

    pub fn thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            adherence_crit_pct: self.adherence_crit_pct,
            hint_warn_count: self.hint_warn_count,
        }
    }

    pub fn break_secs(&self) -> u64 {
        self.break_minutes as u64 * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde_defaults_from_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.daily_budget_minutes, 90);
        assert_eq!(config.default_planned_minutes, 25);
        assert_eq!(config.break_minutes, 5);
        assert_eq!(config.tick_rate_ms, 250);
        assert_eq!(config.class_alert_limit, 6);
        assert_eq!(config.log_level, "info");
        assert!(config.class_code().is_none());
    }

    #[test]
    fn test_config_serde_partial_file() {
        let toml_str = r#"
theme = "monokai"
learner_name = "Lan"
class_name = "9C"
adherence_crit_pct = 70
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.theme, "monokai");
        assert_eq!(config.learner_name, "Lan");
        assert_eq!(config.class_code(), Some("9C"));
        assert_eq!(config.thresholds().adherence_crit_pct, 70);
        assert_eq!(config.thresholds().hint_warn_count, 6);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.learner_id, deserialized.learner_id);
        assert_eq!(config.daily_budget_minutes, deserialized.daily_budget_minutes);
        assert_eq!(config.tick_rate_ms, deserialized.tick_rate_ms);
    }

    #[test]
    fn test_config_validate_clamps_values() {
        let mut config = Config::default();
        config.daily_budget_minutes = 0;
        config.tick_rate_ms = 5;
        config.adherence_crit_pct = 250;
        config.hint_warn_count = 0;
        config.default_planned_minutes = 20;
        config.class_name = "9z".to_string();
        config.learner_id = "  ".to_string();

        config.validate();

        assert_eq!(config.daily_budget_minutes, 15);
        assert_eq!(config.tick_rate_ms, 50);
        assert_eq!(config.adherence_crit_pct, 100);
        assert_eq!(config.hint_warn_count, 1);
        assert_eq!(config.default_planned_minutes, 25);
        assert_eq!(config.default_duration(), PlannedMinutes::TwentyFive);
        assert!(config.class_code().is_none());
        assert_eq!(config.learner_id, "local");
    }

    #[test]
    fn test_config_validate_normalizes_class_code() {
        let mut config = Config::default();
        config.class_name = " 9p".to_string();
        config.default_planned_minutes = 45;
        config.validate();
        assert_eq!(config.class_code(), Some("9P"));
        assert_eq!(config.default_duration(), PlannedMinutes::FortyFive);
    }

    #[test]
    fn test_config_validate_sanitizes_learner_id() {
        let mut config = Config::default();
        config.learner_id = "../st-01".to_string();
        config.validate();
        assert_eq!(config.learner_id, "st-01");
    }
}
