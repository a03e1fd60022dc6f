//! Per-company risk templates, one or more per hazard category.
//!
//! A template pre-fills ND / NE / NC for a newly selected GES. Its
//! running statistics are owned by the learning module and are always
//! recomputed from the application history.

use crate::{
    error::ValidationError,
    hazard::{fold, HazardCategory},
    risk_level::RiskLevels,
    types::{CompanyId, TemplateId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub template_id: TemplateId,
    pub company_id: CompanyId,
    pub category: HazardCategory,
    pub default_levels: RiskLevels,
    pub justification: String,
    /// Hazard-name fragments this template is meant for.
    pub name_patterns: Vec<String>,
    pub applications_count: u32,
    /// Fraction of applications accepted unmodified, in [0, 1].
    pub acceptance_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// A fresh template with no history.
    pub fn new(
        company_id: &str,
        category: HazardCategory,
        default_levels: RiskLevels,
        justification: impl Into<String>,
        name_patterns: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        default_levels.validate()?;
        Ok(Self {
            template_id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            category,
            default_levels,
            justification: justification.into(),
            name_patterns,
            applications_count: 0,
            acceptance_rate: 0.0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Case- and accent-insensitive: a pattern inside the name, or the
    /// name inside a pattern.
    pub fn matches_name(&self, hazard_name: &str) -> bool {
        let name = fold(hazard_name);
        if name.is_empty() {
            return false;
        }
        self.name_patterns.iter().map(|p| fold(p)).any(|pattern| {
            !pattern.is_empty() && (name.contains(&pattern) || pattern.contains(&name))
        })
    }
}

struct CategoryDefault {
    category: HazardCategory,
    levels: (u32, u32, u32),
    justification: &'static str,
    patterns: &'static [&'static str],
}

const CATEGORY_DEFAULTS: &[CategoryDefault] = &[
    CategoryDefault {
        category: HazardCategory::Physical,
        levels: (6, 3, 25),
        justification: "Physical agents usually present with partial engineering controls",
        patterns: &["ruido", "iluminacion", "vibracion", "temperatura", "radiacion"],
    },
    CategoryDefault {
        category: HazardCategory::Mechanical,
        levels: (6, 2, 25),
        justification: "Machinery and hand tools with guards in place but frequent contact",
        patterns: &["maquina", "herramienta", "proyeccion", "atrapamiento", "corte"],
    },
    CategoryDefault {
        category: HazardCategory::Chemical,
        levels: (2, 3, 25),
        justification: "Chemical exposure under labelling and ventilation controls",
        patterns: &["polvo", "humo", "gases", "vapores", "solvente", "liquido"],
    },
    CategoryDefault {
        category: HazardCategory::Biological,
        levels: (2, 2, 25),
        justification: "Occasional contact with biological agents, basic hygiene controls",
        patterns: &["virus", "bacteria", "hongo", "fluido", "picadura", "mordedura"],
    },
    CategoryDefault {
        category: HazardCategory::Psychosocial,
        levels: (6, 4, 10),
        justification: "Continuous psychosocial load inherent to the job design",
        patterns: &["carga mental", "jornada", "atencion al cliente", "monotonia"],
    },
    CategoryDefault {
        category: HazardCategory::Biomechanical,
        levels: (6, 4, 10),
        justification: "Sustained postures and repetitive movement through the shift",
        patterns: &["postura", "movimiento repetitivo", "manipulacion de cargas", "esfuerzo"],
    },
    CategoryDefault {
        category: HazardCategory::Electrical,
        levels: (2, 2, 60),
        justification: "Low exposure but potentially fatal consequence",
        patterns: &["alta tension", "baja tension", "electricidad estatica"],
    },
    CategoryDefault {
        category: HazardCategory::Locative,
        levels: (2, 3, 25),
        justification: "Walking surfaces and storage with routine housekeeping",
        patterns: &["superficie", "caida al mismo nivel", "almacenamiento", "orden y aseo"],
    },
    CategoryDefault {
        category: HazardCategory::Public,
        levels: (2, 2, 25),
        justification: "Occasional exposure to public-order and road events",
        patterns: &["robo", "atraco", "transito"],
    },
    CategoryDefault {
        category: HazardCategory::Natural,
        levels: (2, 1, 60),
        justification: "Rare but severe natural events covered by the emergency plan",
        patterns: &["sismo", "terremoto", "inundacion", "vendaval"],
    },
    CategoryDefault {
        category: HazardCategory::Technological,
        levels: (2, 1, 60),
        justification: "Rare but severe technological events covered by the emergency plan",
        patterns: &["explosion", "fuga", "incendio", "derrame"],
    },
];

/// One default template per category for `company_id`, skipping
/// categories listed in `existing`.
pub fn seed_templates(
    company_id: &str,
    existing: &[HazardCategory],
    now: DateTime<Utc>,
) -> Result<Vec<Template>, ValidationError> {
    CATEGORY_DEFAULTS
        .iter()
        .filter(|seed| !existing.contains(&seed.category))
        .map(|seed| {
            let (nd, ne, nc) = seed.levels;
            Template::new(
                company_id,
                seed.category,
                RiskLevels::new(nd, ne, nc)?,
                seed.justification,
                seed.patterns.iter().map(|p| p.to_string()).collect(),
                now,
            )
        })
        .collect()
}
