//! Inconsistency detection — the same GES evaluated very differently
//! across a company's positions.
//!
//! Spread is the coefficient of variation of NR (population standard
//! deviation over the mean). Hazards whose mean NR is 0 are never
//! flagged.

use crate::{
    config::LearningConfig,
    learning::ApplicationRecord,
    risk_level::RiskLevels,
    types::{HazardId, PositionId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InconsistencySeverity {
    Low,
    Medium,
    High,
}

impl InconsistencySeverity {
    /// HIGH above 1.0, MEDIUM above 0.7, otherwise LOW.
    pub fn from_cv(cv: f64) -> Self {
        if cv > 1.0 {
            Self::High
        } else if cv > 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Observation {
    pub position_id: PositionId,
    pub levels: RiskLevels,
    pub nr: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyReport {
    pub hazard_id: HazardId,
    pub records: usize,
    pub mean_nr: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub severity: InconsistencySeverity,
    /// Distinct (position, final levels) pairs.
    pub observations: Vec<Observation>,
}

/// Scan final levels grouped by hazard. Reports come back worst first,
/// then by hazard id.
pub fn detect_inconsistencies(
    history: &[ApplicationRecord],
    config: &LearningConfig,
) -> Vec<InconsistencyReport> {
    let mut by_hazard: BTreeMap<&str, Vec<&ApplicationRecord>> = BTreeMap::new();
    for record in history {
        by_hazard.entry(record.hazard_id.as_str()).or_default().push(record);
    }

    let mut reports: Vec<InconsistencyReport> = by_hazard
        .into_iter()
        .filter(|(_, records)| records.len() >= config.inconsistency_min_records)
        .filter_map(|(hazard_id, records)| {
            let values: Vec<f64> = records.iter().map(|r| r.final_levels.risk() as f64).collect();
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            if mean == 0.0 {
                return None;
            }
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();
            let cv = std_dev / mean;
            if cv <= config.inconsistency_cv {
                return None;
            }

            let observations: BTreeSet<Observation> = records
                .iter()
                .map(|r| Observation {
                    position_id: r.position_id.clone(),
                    levels: r.final_levels,
                    nr: r.final_levels.risk(),
                })
                .collect();

            Some(InconsistencyReport {
                hazard_id: hazard_id.to_string(),
                records: records.len(),
                mean_nr: mean,
                std_dev,
                coefficient_of_variation: cv,
                severity: InconsistencySeverity::from_cv(cv),
                observations: observations.into_iter().collect(),
            })
        })
        .collect();

    reports.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.hazard_id.cmp(&b.hazard_id))
    });
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands() {
        assert_eq!(InconsistencySeverity::from_cv(0.6), InconsistencySeverity::Low);
        assert_eq!(InconsistencySeverity::from_cv(0.7), InconsistencySeverity::Low);
        assert_eq!(InconsistencySeverity::from_cv(0.71), InconsistencySeverity::Medium);
        assert_eq!(InconsistencySeverity::from_cv(1.0), InconsistencySeverity::Medium);
        assert_eq!(InconsistencySeverity::from_cv(1.2), InconsistencySeverity::High);
    }
}
