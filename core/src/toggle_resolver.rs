//! Special-duty mandates — controls fixed by law, independent of risk.
//!
//! Each active duty flag contributes its full bundle unconditionally.
//! A "low risk" computation elsewhere can never suppress these.

use crate::{
    controls::{string_set, ControlBundle, NO_PERIODICITY_MONTHS},
    types::Months,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToggleSet {
    #[serde(default, alias = "trabajo_alturas", alias = "worksAtHeight")]
    pub works_at_height: bool,
    #[serde(default, alias = "manipula_alimentos", alias = "handlesFood")]
    pub handles_food: bool,
    #[serde(default, alias = "conduce_vehiculo", alias = "drivesVehicle")]
    pub drives_vehicle: bool,
    #[serde(default, alias = "espacios_confinados", alias = "worksInConfinedSpace")]
    pub works_in_confined_space: bool,
}

impl ToggleSet {
    pub fn is_active(&self, duty: SpecialDuty) -> bool {
        match duty {
            SpecialDuty::WorkAtHeight => self.works_at_height,
            SpecialDuty::FoodHandling => self.handles_food,
            SpecialDuty::Driving => self.drives_vehicle,
            SpecialDuty::ConfinedSpace => self.works_in_confined_space,
        }
    }

    pub fn active(&self) -> Vec<SpecialDuty> {
        SpecialDuty::ALL
            .iter()
            .copied()
            .filter(|duty| self.is_active(*duty))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialDuty {
    WorkAtHeight,
    FoodHandling,
    Driving,
    ConfinedSpace,
}

impl SpecialDuty {
    pub const ALL: [SpecialDuty; 4] = [
        Self::WorkAtHeight,
        Self::FoodHandling,
        Self::Driving,
        Self::ConfinedSpace,
    ];

    pub fn mandate(&self) -> &'static DutyMandate {
        match self {
            Self::WorkAtHeight => &WORK_AT_HEIGHT,
            Self::FoodHandling => &FOOD_HANDLING,
            Self::Driving => &DRIVING,
            Self::ConfinedSpace => &CONFINED_SPACE,
        }
    }
}

/// Static legal reference data for one special duty.
#[derive(Debug)]
pub struct DutyMandate {
    pub label: &'static str,
    pub legal_basis: &'static str,
    pub exam_codes: &'static [&'static str],
    pub ppe: &'static [&'static str],
    pub aptitudes: &'static [&'static str],
    pub disqualifying_conditions: &'static [&'static str],
    pub periodicity_months: Months,
}

impl DutyMandate {
    pub fn justification(&self) -> String {
        format!(
            "{} ({}): mandatory controls regardless of computed risk; re-evaluate every {} months",
            self.label, self.legal_basis, self.periodicity_months
        )
    }

    pub fn bundle(&self) -> ControlBundle {
        ControlBundle {
            exam_codes: string_set(self.exam_codes),
            ppe: string_set(self.ppe),
            aptitudes: string_set(self.aptitudes),
            disqualifying_conditions: string_set(self.disqualifying_conditions),
            periodicity_months: self.periodicity_months,
            justification: self.justification(),
        }
    }
}

static WORK_AT_HEIGHT: DutyMandate = DutyMandate {
    label: "Work at height",
    legal_basis: "Res. 4272/2021",
    exam_codes: &["EMOA", "VISIO", "AUDIO", "GLIC", "PERFIL_LIP", "PSM"],
    ppe: &[
        "Full-body harness",
        "Shock-absorbing lanyard",
        "Dielectric helmet with chin strap",
        "Anchorage connector",
    ],
    aptitudes: &[
        "Certified work-at-height training",
        "Adequate balance and coordination",
    ],
    disqualifying_conditions: &[
        "Uncontrolled epilepsy",
        "Vertigo or balance disorders",
        "Uncontrolled arterial hypertension",
        "Acrophobia",
    ],
    periodicity_months: 12,
};

static FOOD_HANDLING: DutyMandate = DutyMandate {
    label: "Food handling",
    legal_basis: "Res. 2674/2013",
    exam_codes: &["FROTIS_FAR", "KOH_UNAS", "COPRO"],
    ppe: &["Hairnet", "Face mask", "Waterproof apron"],
    aptitudes: &["Food handling course certificate"],
    disqualifying_conditions: &[
        "Active transmissible infectious disease",
        "Open skin lesions on hands or forearms",
    ],
    periodicity_months: 12,
};

static DRIVING: DutyMandate = DutyMandate {
    label: "Vehicle driving",
    legal_basis: "Ley 769/2002, Res. 40595/2022",
    exam_codes: &["PSM", "VISIO", "AUDIO"],
    ppe: &["High-visibility vest"],
    aptitudes: &["Valid driving licence for the vehicle category"],
    disqualifying_conditions: &[
        "Uncorrected visual acuity deficit",
        "Untreated sleep disorder",
        "Uncontrolled epilepsy",
    ],
    periodicity_months: 12,
};

static CONFINED_SPACE: DutyMandate = DutyMandate {
    label: "Confined space entry",
    legal_basis: "Res. 0491/2020",
    exam_codes: &["EMOC", "ESPIRO", "ECG", "PSM"],
    ppe: &[
        "Multi-gas detector",
        "Supplied-air respirator",
        "Rescue harness with retrieval line",
    ],
    aptitudes: &["Certified confined-space entrant training"],
    disqualifying_conditions: &[
        "Claustrophobia",
        "Chronic obstructive respiratory disease",
        "Uncontrolled cardiovascular disease",
    ],
    periodicity_months: 6,
};

/// Combined output of every active duty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResolution {
    pub active: Vec<SpecialDuty>,
    pub bundle: ControlBundle,
    /// One entry per active duty, in duty order.
    pub justifications: Vec<String>,
}

pub fn resolve_toggles(toggles: &ToggleSet) -> ToggleResolution {
    let active = toggles.active();
    let seed = ControlBundle::empty("Special-duty mandates").with_periodicity(NO_PERIODICITY_MONTHS);

    let bundle = active
        .iter()
        .fold(seed, |acc, duty| acc.union(&duty.mandate().bundle()));
    let justifications = active
        .iter()
        .map(|duty| duty.mandate().justification())
        .collect();

    ToggleResolution {
        active,
        bundle,
        justifications,
    }
}
