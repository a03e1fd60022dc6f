//! Consolidation — one control set per position.
//!
//! Starts from the universal minimum package, unions in the special-duty
//! mandates and every hazard bundle that applies, and keeps the shortest
//! periodicity ("most restrictive wins").
//!
//! RULE: Always a full recompute from current inputs. The fold is over
//! set-union and min, so the result does not depend on hazard order and
//! re-running on the same inputs yields an identical value.

use crate::{
    catalog::ExamCatalog,
    config::ControlConfig,
    controls::ControlBundle,
    hazard_resolver::{HazardResolution, HazardStatus},
    toggle_resolver::{SpecialDuty, ToggleResolution},
    types::{HazardId, Months, PositionId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A hazard named in the metadata. Ordered by id so two hazards sharing a
/// display name stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HazardRef {
    pub id: HazardId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationMetadata {
    pub hazards_analyzed: usize,
    pub hazards_triggering_controls: usize,
    pub hazards_without_controls_configured: usize,
    pub max_nr: Option<u32>,
    pub min_nr: Option<u32>,
    pub high_severity_hazards: BTreeSet<HazardRef>,
    pub low_severity_hazards: BTreeSet<HazardRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedControls {
    pub position_id: PositionId,
    pub exam_codes: BTreeSet<String>,
    pub ppe: BTreeSet<String>,
    pub aptitudes: BTreeSet<String>,
    pub disqualifying_conditions: BTreeSet<String>,
    pub periodicity_months: Months,
    pub mandates: Vec<SpecialDuty>,
    /// Universal package first, then mandates in duty order, then
    /// applying hazards sorted by text.
    pub justifications: Vec<String>,
    pub metadata: ConsolidationMetadata,
}

/// Display line for one exam code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamLine {
    pub code: String,
    pub name: Option<String>,
    pub default_periodicity_months: Option<Months>,
}

impl HazardRef {
    fn of(resolution: &HazardResolution) -> Self {
        Self {
            id: resolution.hazard.id.clone(),
            name: resolution.hazard.name.clone(),
        }
    }
}

impl ConsolidatedControls {
    /// Decorate exam codes with catalog metadata. Presentation only.
    pub fn exam_lines(&self, exams: &ExamCatalog) -> Vec<ExamLine> {
        self.exam_codes
            .iter()
            .map(|code| {
                let info = exams.get(code);
                ExamLine {
                    code: code.clone(),
                    name: info.map(|i| i.name.clone()),
                    default_periodicity_months: info.map(|i| i.default_periodicity_months),
                }
            })
            .collect()
    }
}

pub fn consolidate(
    position_id: &str,
    toggles: &ToggleResolution,
    hazards: &[HazardResolution],
    config: &ControlConfig,
) -> ConsolidatedControls {
    let universal = config.universal_minimum.bundle();
    let applying: Vec<&HazardResolution> = hazards.iter().filter(|h| h.applies()).collect();

    let merged: ControlBundle = applying
        .iter()
        .fold(universal.union(&toggles.bundle), |acc, h| acc.union(&h.bundle));

    let mut hazard_notes: Vec<String> = applying
        .iter()
        .map(|h| h.bundle.justification.clone())
        .collect();
    hazard_notes.sort();
    hazard_notes.dedup();

    let mut justifications = vec![universal.justification];
    justifications.extend(toggles.justifications.iter().cloned());
    justifications.extend(hazard_notes);

    let thresholds = &config.thresholds;
    let assessed: Vec<(&HazardResolution, u32)> = hazards
        .iter()
        .filter_map(|h| h.nr().map(|nr| (h, nr)))
        .collect();

    let metadata = ConsolidationMetadata {
        hazards_analyzed: hazards.len(),
        hazards_triggering_controls: applying.len(),
        hazards_without_controls_configured: hazards
            .iter()
            .filter(|h| h.status != HazardStatus::Evaluated)
            .count(),
        max_nr: assessed.iter().map(|(_, nr)| *nr).max(),
        min_nr: assessed.iter().map(|(_, nr)| *nr).min(),
        high_severity_hazards: assessed
            .iter()
            .filter(|(_, nr)| thresholds.is_high_severity(*nr))
            .map(|(h, _)| HazardRef::of(h))
            .collect(),
        low_severity_hazards: assessed
            .iter()
            .filter(|(_, nr)| thresholds.is_low_severity(*nr))
            .map(|(h, _)| HazardRef::of(h))
            .collect(),
    };

    ConsolidatedControls {
        position_id: position_id.to_string(),
        exam_codes: merged.exam_codes,
        ppe: merged.ppe,
        aptitudes: merged.aptitudes,
        disqualifying_conditions: merged.disqualifying_conditions,
        periodicity_months: merged.periodicity_months,
        mandates: toggles.active.clone(),
        justifications,
        metadata,
    }
}
