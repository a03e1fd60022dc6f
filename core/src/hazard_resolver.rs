//! Per-hazard control resolution.
//!
//! Decides, for one GES on one position, which of its catalog-defined
//! control families apply given the computed NR:
//!
//!   NR >= ppe threshold       -> catalog PPE
//!   NR >= exam threshold      -> catalog exams
//!   NR >= aptitude threshold  -> aptitudes + disqualifying conditions
//!
//! RULE: A hazard is never dropped. Unset levels and catalog gaps are
//! returned as labelled, zero-control entries so auditors can still
//! enumerate every hazard a position claims exposure to.

use crate::{
    catalog::{CatalogLookup, HazardCatalog},
    config::ControlConfig,
    controls::{string_set, ControlBundle},
    error::ValidationError,
    hazard::{HazardExposure, PositionHazard},
    risk_level::RiskAssessment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardStatus {
    Evaluated,
    RiskLevelsUnset,
    NotInCatalog,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredFamilies {
    pub exams: bool,
    pub ppe: bool,
    pub aptitudes: bool,
}

impl TriggeredFamilies {
    pub fn any(&self) -> bool {
        self.exams || self.ppe || self.aptitudes
    }

    fn describe(&self) -> String {
        let mut names = Vec::new();
        if self.exams {
            names.push("medical exams");
        }
        if self.ppe {
            names.push("PPE");
        }
        if self.aptitudes {
            names.push("aptitude criteria");
        }
        match names.as_slice() {
            [] => "no control family triggered".to_string(),
            [only] => format!("{only} required"),
            [init @ .., last] => format!("{} and {last} required", init.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardResolution {
    pub hazard: HazardExposure,
    pub status: HazardStatus,
    pub assessment: Option<RiskAssessment>,
    pub triggered: TriggeredFamilies,
    pub consequences: Option<String>,
    pub worst_consequence: Option<String>,
    pub bundle: ControlBundle,
}

impl HazardResolution {
    /// Whether this hazard contributes to the position's consolidated controls.
    pub fn applies(&self) -> bool {
        self.status == HazardStatus::Evaluated && self.triggered.any()
    }

    pub fn nr(&self) -> Option<u32> {
        self.assessment.as_ref().map(|a| a.nr)
    }
}

/// Resolve one hazard. Only an out-of-set level is an error.
pub fn resolve_hazard(
    item: &PositionHazard,
    catalog: &dyn HazardCatalog,
    config: &ControlConfig,
) -> Result<HazardResolution, ValidationError> {
    item.levels.validate_supplied()?;
    let assessment = if item.levels.is_complete() {
        Some(item.levels.to_levels()?.assess()?)
    } else {
        None
    };
    let hazard = item.hazard.clone();

    let entry = match catalog.lookup(&hazard.name) {
        CatalogLookup::Found(entry) => entry,
        CatalogLookup::NotFound => {
            log::warn!(
                "hazard {} '{}' is not configured in the catalog; no controls derived",
                hazard.id,
                hazard.name
            );
            let justification = format!(
                "Hazard '{}' identified but not configured in the catalog: no controls derived",
                hazard.name
            );
            return Ok(HazardResolution {
                hazard,
                status: HazardStatus::NotInCatalog,
                assessment,
                triggered: TriggeredFamilies::default(),
                consequences: None,
                worst_consequence: None,
                bundle: ControlBundle::empty(justification)
                    .with_periodicity(config.unconfigured_periodicity_months),
            });
        }
    };

    let consequences = Some(entry.consequences.clone()).filter(|c| !c.is_empty());
    let worst_consequence = Some(entry.worst_consequence.clone()).filter(|c| !c.is_empty());

    let Some(assessment) = assessment else {
        let justification = format!(
            "Risk levels not configured for '{}': hazard recorded, no controls derived \
             until ND, NE and NC are set",
            hazard.name
        );
        return Ok(HazardResolution {
            hazard,
            status: HazardStatus::RiskLevelsUnset,
            assessment: None,
            triggered: TriggeredFamilies::default(),
            consequences,
            worst_consequence,
            bundle: ControlBundle::empty(justification)
                .with_periodicity(config.unconfigured_periodicity_months),
        });
    };

    let t = &config.thresholds;
    let triggered = TriggeredFamilies {
        exams: assessment.nr >= t.exam_nr,
        ppe: assessment.nr >= t.ppe_nr,
        aptitudes: assessment.nr >= t.aptitude_nr,
    };

    let mut bundle = ControlBundle::empty(format!(
        "'{}' band {} (NR {}): {}",
        hazard.name,
        assessment.band,
        assessment.nr,
        triggered.describe()
    ))
    .with_periodicity(config.band_periodicity.for_band(assessment.band));
    if triggered.exams {
        bundle.exam_codes = string_set(entry.required_exams());
    }
    if triggered.ppe {
        bundle.ppe = string_set(&entry.ppe);
    }
    if triggered.aptitudes {
        bundle.aptitudes = string_set(&entry.aptitudes);
        bundle.disqualifying_conditions = string_set(&entry.disqualifying_conditions);
    }

    log::debug!(
        "hazard {} '{}': NR={} band={} exams={} ppe={} aptitudes={}",
        hazard.id,
        hazard.name,
        assessment.nr,
        assessment.band,
        triggered.exams,
        triggered.ppe,
        triggered.aptitudes
    );

    Ok(HazardResolution {
        hazard,
        status: HazardStatus::Evaluated,
        assessment: Some(assessment),
        triggered,
        consequences,
        worst_consequence,
        bundle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{CatalogEntry, StaticCatalog},
        risk_level::{RiskInput, SeverityBand},
    };
    use std::collections::BTreeMap;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![CatalogEntry {
            name: "Ruido".into(),
            category: "Físico".into(),
            consequences: "Hipoacusia neurosensorial".into(),
            worst_consequence: "Sordera profesional".into(),
            exams: BTreeMap::from([("AUDIO".to_string(), true)]),
            ppe: vec!["Protector auditivo".into()],
            aptitudes: vec!["Audición funcional".into()],
            disqualifying_conditions: vec!["Hipoacusia severa previa".into()],
            aliases: vec![],
        }])
    }

    fn noise(nd: Option<u32>, ne: Option<u32>, nc: Option<u32>) -> PositionHazard {
        PositionHazard {
            hazard: HazardExposure::new("h-noise", "Ruido", "Físico"),
            levels: RiskInput { nd, ne, nc },
        }
    }

    #[test]
    fn high_nr_triggers_every_family() {
        let r = resolve_hazard(&noise(Some(6), Some(3), Some(25)), &catalog(), &ControlConfig::default())
            .unwrap();
        assert_eq!(r.status, HazardStatus::Evaluated);
        assert_eq!(r.assessment.as_ref().map(|a| a.band), Some(SeverityBand::IV));
        assert!(r.triggered.exams && r.triggered.ppe && r.triggered.aptitudes);
        assert!(r.bundle.exam_codes.contains("AUDIO"));
        assert!(r.bundle.ppe.contains("Protector auditivo"));
        assert!(r.bundle.disqualifying_conditions.contains("Hipoacusia severa previa"));
        assert_eq!(r.bundle.periodicity_months, 12);
        assert!(r.applies());
    }

    #[test]
    fn mid_nr_triggers_exams_only() {
        // NR = 2 * 3 * 10 = 60
        let r = resolve_hazard(&noise(Some(2), Some(3), Some(10)), &catalog(), &ControlConfig::default())
            .unwrap();
        assert!(r.triggered.exams);
        assert!(!r.triggered.ppe);
        assert!(r.bundle.ppe.is_empty());
        assert!(r.bundle.justification.contains("medical exams required"));
    }

    #[test]
    fn unset_levels_are_recorded_not_dropped() {
        let r = resolve_hazard(&noise(Some(6), None, None), &catalog(), &ControlConfig::default())
            .unwrap();
        assert_eq!(r.status, HazardStatus::RiskLevelsUnset);
        assert!(!r.bundle.has_controls());
        assert!(r.bundle.justification.contains("Risk levels not configured"));
        assert!(!r.applies());
    }

    #[test]
    fn unknown_hazard_is_labelled() {
        let item = PositionHazard {
            hazard: HazardExposure::new("h-x", "Radiación cósmica", "Físico"),
            levels: RiskInput { nd: Some(10), ne: Some(4), nc: Some(100) },
        };
        let r = resolve_hazard(&item, &catalog(), &ControlConfig::default()).unwrap();
        assert_eq!(r.status, HazardStatus::NotInCatalog);
        assert_eq!(r.nr(), Some(4000));
        assert!(!r.bundle.has_controls());
        assert!(!r.applies());
    }

    #[test]
    fn out_of_set_level_is_an_error_even_when_incomplete() {
        let err = resolve_hazard(&noise(Some(7), None, None), &catalog(), &ControlConfig::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfSet { field: "nd", .. }));
    }
}
