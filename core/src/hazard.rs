//! Hazard exposures (GES) and the boundary that canonicalises them.
//!
//! RULE: Upstream records arrive in several shapes (form exports, legacy
//! tables, spreadsheets). They are mapped into `PositionHazard` exactly
//! once, here. Nothing downstream reads a raw record.

use crate::{
    error::ValidationError,
    risk_level::RiskInput,
    types::HazardId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardCategory {
    Physical,
    Mechanical,
    Chemical,
    Biological,
    Psychosocial,
    Biomechanical,
    Electrical,
    Locative,
    Public,
    Natural,
    Technological,
}

/// Folded stems per category. Biomechanical precedes Mechanical because
/// its stems contain the mechanical ones.
const CATEGORY_STEMS: &[(HazardCategory, &[&str])] = &[
    (HazardCategory::Biomechanical, &["biomecanic", "biomechanic", "ergonom"]),
    (HazardCategory::Physical, &["fisic", "physical"]),
    (HazardCategory::Mechanical, &["mecanic", "mechanic"]),
    (HazardCategory::Chemical, &["quimic", "chemical"]),
    (HazardCategory::Biological, &["biologic"]),
    (HazardCategory::Psychosocial, &["psicosocial", "psychosocial"]),
    (HazardCategory::Electrical, &["electric"]),
    (HazardCategory::Locative, &["locativ"]),
    (HazardCategory::Public, &["public"]),
    (HazardCategory::Natural, &["natural", "fenomeno"]),
    (HazardCategory::Technological, &["tecnologic", "technologic"]),
];

impl HazardCategory {
    pub const ALL: [HazardCategory; 11] = [
        Self::Physical,
        Self::Mechanical,
        Self::Chemical,
        Self::Biological,
        Self::Psychosocial,
        Self::Biomechanical,
        Self::Electrical,
        Self::Locative,
        Self::Public,
        Self::Natural,
        Self::Technological,
    ];

    /// Canonicalise a free-text category label.
    /// "Riesgos Físicos", "FISICO" and "physical" all map to `Physical`.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded = fold(label);
        CATEGORY_STEMS
            .iter()
            .find(|(_, stems)| stems.iter().any(|stem| folded.contains(stem)))
            .map(|(category, _)| *category)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Mechanical => "mechanical",
            Self::Chemical => "chemical",
            Self::Biological => "biological",
            Self::Psychosocial => "psychosocial",
            Self::Biomechanical => "biomechanical",
            Self::Electrical => "electrical",
            Self::Locative => "locative",
            Self::Public => "public",
            Self::Natural => "natural",
            Self::Technological => "technological",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.key() == key)
    }
}

impl fmt::Display for HazardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Lowercase, strip Spanish diacritics and collapse whitespace.
pub fn fold(text: &str) -> String {
    let lowered: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A hazard a position is exposed to, in canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardExposure {
    pub id: HazardId,
    pub name: String,
    pub category: Option<HazardCategory>,
    /// The label as received, kept for display and audit.
    pub category_label: String,
}

impl HazardExposure {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category_label: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: HazardCategory::from_label(category_label),
            category_label: category_label.to_string(),
        }
    }
}

/// One hazard on one position together with its (possibly unset) levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHazard {
    pub hazard: HazardExposure,
    pub levels: RiskInput,
}

/// A hazard record as exported by any upstream source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHazardRecord {
    #[serde(alias = "hazard_id", alias = "ges_id", alias = "id_ges", alias = "riesgo_id")]
    pub id: Option<Value>,
    #[serde(alias = "nombre", alias = "ges", alias = "nombre_ges", alias = "hazard")]
    pub name: Option<String>,
    #[serde(alias = "categoria", alias = "tipo_riesgo", alias = "clasificacion")]
    pub category: Option<String>,
    #[serde(alias = "ND", alias = "nivel_deficiencia")]
    pub nd: Option<Value>,
    #[serde(alias = "NE", alias = "nivel_exposicion")]
    pub ne: Option<Value>,
    #[serde(alias = "NC", alias = "nivel_consecuencia")]
    pub nc: Option<Value>,
}

impl RawHazardRecord {
    pub fn normalize(self) -> Result<PositionHazard, ValidationError> {
        let id = match self.id {
            None | Some(Value::Null) => return Err(ValidationError::Missing { field: "id" }),
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
        };
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(ValidationError::Missing { field: "name" })?;
        let category_label = self.category.unwrap_or_default();

        let levels = RiskInput {
            nd: level_value("nd", self.nd)?,
            ne: level_value("ne", self.ne)?,
            nc: level_value("nc", self.nc)?,
        };

        Ok(PositionHazard {
            hazard: HazardExposure::new(id, name, &category_label),
            levels,
        })
    }
}

fn level_value(field: &'static str, raw: Option<Value>) -> Result<Option<u32>, ValidationError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| ValidationError::NonNumeric {
                field,
                raw: n.to_string(),
            }),
        // Legacy tables store levels as text; blank text means unset.
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<u32>()
                .map(Some)
                .map_err(|_| ValidationError::NonNumeric { field, raw: text })
        }
        Some(other) => Err(ValidationError::NonNumeric {
            field,
            raw: other.to_string(),
        }),
    }
}
