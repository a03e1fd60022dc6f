//! Full evaluation of one position: mandates, hazards, consolidation.

use crate::{
    catalog::HazardCatalog,
    config::ControlConfig,
    consolidation::{consolidate, ConsolidatedControls},
    error::ValidationError,
    hazard::{PositionHazard, RawHazardRecord},
    hazard_resolver::{resolve_hazard, HazardResolution},
    toggle_resolver::{resolve_toggles, ToggleSet},
    types::PositionId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionProfile {
    pub position_id: PositionId,
    pub toggles: ToggleSet,
    pub hazards: Vec<PositionHazard>,
}

/// A position as exported upstream, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPositionProfile {
    #[serde(alias = "cargo_id", alias = "id")]
    pub position_id: String,
    #[serde(default, alias = "toggles_especiales")]
    pub toggles: ToggleSet,
    #[serde(default, alias = "riesgos", alias = "ges")]
    pub hazards: Vec<RawHazardRecord>,
}

impl RawPositionProfile {
    pub fn normalize(self) -> Result<PositionProfile, ValidationError> {
        let hazards = self
            .hazards
            .into_iter()
            .map(RawHazardRecord::normalize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PositionProfile {
            position_id: self.position_id,
            toggles: self.toggles,
            hazards,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEvaluation {
    /// Every hazard the position claims, in input order.
    pub hazards: Vec<HazardResolution>,
    pub controls: ConsolidatedControls,
}

/// Evaluate a position. A single out-of-set level rejects the whole
/// position; nothing is partially applied.
pub fn evaluate_position(
    profile: &PositionProfile,
    catalog: &dyn HazardCatalog,
    config: &ControlConfig,
) -> Result<PositionEvaluation, ValidationError> {
    let hazards = profile
        .hazards
        .iter()
        .map(|item| resolve_hazard(item, catalog, config))
        .collect::<Result<Vec<_>, _>>()?;
    let toggles = resolve_toggles(&profile.toggles);
    let controls = consolidate(&profile.position_id, &toggles, &hazards, config);

    log::debug!(
        "position {}: {} hazards, {} applying, {} exams, every {} months",
        profile.position_id,
        controls.metadata.hazards_analyzed,
        controls.metadata.hazards_triggering_controls,
        controls.exam_codes.len(),
        controls.periodicity_months
    );

    Ok(PositionEvaluation { hazards, controls })
}
