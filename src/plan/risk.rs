use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plan::session::UnitRef;
use crate::plan::summary::{Summary, SubjectSummary};

pub const CLASS_CODES: [&str; 7] = ["9A", "9B", "9C", "9D", "9E", "9G", "9P"];

/// Returns the class code if it is one the school uses.
pub fn normalize_class_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    CLASS_CODES.contains(&code.as_str()).then_some(code)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Crit,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Crit => "crit",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Ok,
    Warn,
    Crit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Adherence strictly below this is critical.
    pub adherence_crit_pct: u32,
    /// Hints at or above this in any one subject is a warning.
    pub hint_warn_count: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            adherence_crit_pct: 60,
            hint_warn_count: 6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Learner {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub class_code: Option<String>,
}

/// One learner's week as dashboards see it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentRow {
    pub learner: Learner,
    pub adherence_pct: u32,
    pub study_minutes: u32,
    pub assess_avg: f64,
    pub weakest_units: Vec<UnitRef>,
    pub subjects: Vec<SubjectSummary>,
}

impl StudentRow {
    pub fn from_summary(learner: Learner, summary: &Summary) -> Self {
        Self {
            learner,
            adherence_pct: summary.weekly.adherence_pct,
            study_minutes: summary.weekly.total_minutes,
            assess_avg: summary.weekly.assess_avg,
            weakest_units: summary.weekly.weakest_units.clone(),
            subjects: summary.subjects.clone(),
        }
    }
}

/// Apply the threshold rules to one learner. Critical findings come first so
/// that truncating a concatenated list keeps the most severe ones.
pub fn evaluate(row: &StudentRow, thresholds: &RiskThresholds) -> Vec<Alert> {
    let name = &row.learner.name;
    let learner_id = Some(row.learner.id.clone());
    let mut alerts = Vec::new();

    if row.adherence_pct < thresholds.adherence_crit_pct {
        alerts.push(Alert {
            severity: Severity::Crit,
            message: format!("{name} has low plan adherence ({}%).", row.adherence_pct),
            unit: None,
            learner_id: learner_id.clone(),
        });
    }

    if let Some(s) = row
        .subjects
        .iter()
        .find(|s| s.hints >= thresholds.hint_warn_count)
    {
        alerts.push(Alert {
            severity: Severity::Warn,
            message: format!("{name} relies on hints in {} ({} hints).", s.subject, s.hints),
            unit: None,
            learner_id: learner_id.clone(),
        });
    }

    if let Some(unit) = row.weakest_units.first() {
        alerts.push(Alert {
            severity: Severity::Warn,
            message: format!("{name} should review \"{}\" ({}).", unit.title, unit.subject),
            unit: Some(unit.clone()),
            learner_id,
        });
    }

    alerts
}

pub fn risk_level(alerts: &[Alert]) -> RiskLevel {
    match alerts.iter().map(|a| a.severity).max() {
        Some(Severity::Crit) => RiskLevel::Crit,
        Some(Severity::Warn) => RiskLevel::Warn,
        _ => RiskLevel::Ok,
    }
}

/// Alerts for a whole class, learner by learner, cut to `limit`.
pub fn class_alerts(rows: &[StudentRow], thresholds: &RiskThresholds, limit: usize) -> Vec<Alert> {
    rows.iter()
        .flat_map(|row| evaluate(row, thresholds))
        .take(limit)
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassWeekly {
    pub total_minutes: u32,
    pub adherence_avg: u32,
    pub assess_avg: f64,
    pub warn_count: usize,
    pub crit_count: usize,
}

impl ClassWeekly {
    pub fn rollup(rows: &[StudentRow], thresholds: &RiskThresholds) -> Self {
        let n = rows.len().max(1);
        let adherence_sum: u32 = rows.iter().map(|r| r.adherence_pct).sum();
        let assess_sum: f64 = rows.iter().map(|r| r.assess_avg).sum();
        let mut weekly = ClassWeekly {
            total_minutes: rows.iter().map(|r| r.study_minutes).sum(),
            adherence_avg: (adherence_sum as f64 / n as f64).round() as u32,
            assess_avg: assess_sum / n as f64,
            ..Self::default()
        };
        for row in rows {
            match risk_level(&evaluate(row, thresholds)) {
                RiskLevel::Crit => weekly.crit_count += 1,
                RiskLevel::Warn => weekly.warn_count += 1,
                RiskLevel::Ok => {}
            }
        }
        weekly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::subject::Subject;

    fn subject(subject: Subject, hints: u32) -> SubjectSummary {
        SubjectSummary {
            subject,
            mastery_pct: 50,
            minutes: 60,
            assess_avg: 7.0,
            hints,
        }
    }

    fn row(id: &str, adherence: u32, math_hints: u32, english_hints: u32, weak: Vec<UnitRef>) -> StudentRow {
        StudentRow {
            learner: Learner {
                id: id.into(),
                name: format!("Learner {id}"),
                class_code: Some("9A".into()),
            },
            adherence_pct: adherence,
            study_minutes: 120,
            assess_avg: 8.0,
            weakest_units: weak,
            subjects: vec![
                subject(Subject::Math, math_hints),
                subject(Subject::English, english_hints),
            ],
        }
    }

    fn weak_unit() -> UnitRef {
        UnitRef {
            id: "u1".into(),
            title: "Lập hệ phương trình".into(),
            subject: Subject::Math,
        }
    }

    #[test]
    fn test_low_adherence_and_hints_orders_crit_first() {
        let alerts = evaluate(&row("st2", 40, 7, 0, vec![]), &RiskThresholds::default());
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].severity, Severity::Crit);
        assert!(alerts[0].message.contains("40%"));
        assert_eq!(alerts[1].severity, Severity::Warn);
        assert!(alerts[1].message.contains("Toán"));
        assert!(alerts[1].message.contains('7'));
        assert_eq!(alerts[0].learner_id.as_deref(), Some("st2"));
    }

    #[test]
    fn test_hint_rule_reports_first_subject_in_order() {
        let alerts = evaluate(&row("st1", 90, 6, 9, vec![]), &RiskThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("Toán"));
        assert!(alerts[0].message.contains("6 hints"));
    }

    #[test]
    fn test_thresholds_are_boundaries() {
        let alerts = evaluate(&row("st1", 60, 5, 5, vec![]), &RiskThresholds::default());
        assert!(alerts.is_empty());
        assert_eq!(risk_level(&alerts), RiskLevel::Ok);
    }

    #[test]
    fn test_weak_unit_alert_links_unit() {
        let alerts = evaluate(&row("st1", 88, 0, 0, vec![weak_unit()]), &RiskThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warn);
        assert_eq!(alerts[0].unit.as_ref().map(|u| u.id.as_str()), Some("u1"));
        assert_eq!(risk_level(&alerts), RiskLevel::Warn);
    }

    #[test]
    fn test_all_rules_fire_together() {
        let alerts = evaluate(&row("st1", 10, 8, 0, vec![weak_unit()]), &RiskThresholds::default());
        let severities: Vec<Severity> = alerts.iter().map(|a| a.severity).collect();
        assert_eq!(severities, vec![Severity::Crit, Severity::Warn, Severity::Warn]);
        assert_eq!(risk_level(&alerts), RiskLevel::Crit);
    }

    #[test]
    fn test_custom_thresholds() {
        let strict = RiskThresholds {
            adherence_crit_pct: 80,
            hint_warn_count: 3,
        };
        let alerts = evaluate(&row("st1", 72, 3, 0, vec![]), &strict);
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_class_alerts_truncate() {
        let rows = vec![
            row("a", 40, 7, 0, vec![weak_unit()]),
            row("b", 50, 9, 0, vec![weak_unit()]),
            row("c", 55, 0, 0, vec![weak_unit()]),
        ];
        let alerts = class_alerts(&rows, &RiskThresholds::default(), 6);
        assert_eq!(alerts.len(), 6);
        assert_eq!(alerts[0].learner_id.as_deref(), Some("a"));
        assert_eq!(alerts[3].learner_id.as_deref(), Some("b"));
        assert_eq!(alerts[3].severity, Severity::Crit);
    }

    #[test]
    fn test_class_weekly_rollup() {
        let rows = vec![
            row("a", 72, 5, 2, vec![weak_unit()]),
            row("b", 55, 7, 1, vec![]),
            row("c", 88, 2, 1, vec![]),
        ];
        let weekly = ClassWeekly::rollup(&rows, &RiskThresholds::default());
        assert_eq!(weekly.total_minutes, 360);
        assert_eq!(weekly.adherence_avg, 72);
        assert!((weekly.assess_avg - 8.0).abs() < 1e-9);
        assert_eq!(weekly.warn_count, 1);
        assert_eq!(weekly.crit_count, 1);

        let empty = ClassWeekly::rollup(&[], &RiskThresholds::default());
        assert_eq!(empty.adherence_avg, 0);
    }

    #[test]
    fn test_class_code_validation() {
        assert_eq!(normalize_class_code(" 9b "), Some("9B".to_string()));
        assert_eq!(normalize_class_code("9F"), None);
        assert_eq!(normalize_class_code(""), None);
    }
}
