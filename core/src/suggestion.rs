//! Template suggestion — default risk levels for newly selected GES.
//!
//! For each hazard:
//!   1. Canonicalise its category
//!   2. Pick a template of that category (name-pattern match first)
//!   3. Score confidence from the template's history
//!   4. Decide whether a human must review the suggestion
//!
//! "No template for this category" is a normal outcome, not an error.

use crate::{
    hazard::{fold, HazardCategory, HazardExposure},
    risk_level::RiskLevels,
    template::Template,
    types::{HazardId, TemplateId},
};
use serde::{Deserialize, Serialize};

/// Applications after which history carries full weight.
pub const CONFIDENCE_HISTORY_CAP: u32 = 20;
const HISTORY_WEIGHT: f64 = 0.4;
const ACCEPTANCE_WEIGHT: f64 = 0.6;

/// Fewer applications than this and the template is still unproven.
pub const MIN_PROVEN_APPLICATIONS: u32 = 5;
pub const MIN_TRUSTED_ACCEPTANCE: f64 = 0.7;
/// NC at or above this is inherently high-consequence.
pub const HIGH_CONSEQUENCE_NC: u32 = 60;

/// Folded name fragments whose sub-types vary too much in severity for
/// a single default.
pub const MANUAL_REVIEW_KEYWORDS: &[&str] = &[
    "polvo",
    "dust",
    "ruido",
    "noise",
    "vibracion",
    "vibration",
    "temperatura",
    "temperature",
    "altura",
    "height",
    "confinad",
    "confined",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Suggested,
    NoTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub hazard_id: HazardId,
    pub hazard_name: String,
    pub category: Option<HazardCategory>,
    pub status: SuggestionStatus,
    pub template_id: Option<TemplateId>,
    pub levels: Option<RiskLevels>,
    pub nr: Option<u32>,
    pub justification: String,
    pub confidence: f64,
    pub needs_review: bool,
    pub review_reasons: Vec<String>,
}

/// `0.4 × min(count / 20, 1) + 0.6 × acceptance_rate`.
pub fn confidence(applications_count: u32, acceptance_rate: f64) -> f64 {
    let history = (applications_count as f64 / CONFIDENCE_HISTORY_CAP as f64).min(1.0);
    let acceptance = acceptance_rate.clamp(0.0, 1.0);
    HISTORY_WEIGHT * history + ACCEPTANCE_WEIGHT * acceptance
}

/// Every reason the suggestion must be reviewed. Empty means none.
pub fn review_reasons(template: &Template, hazard_name: &str) -> Vec<String> {
    let mut reasons = Vec::new();
    if template.default_levels.nc >= HIGH_CONSEQUENCE_NC {
        reasons.push(format!(
            "high-consequence default (NC {} >= {HIGH_CONSEQUENCE_NC})",
            template.default_levels.nc
        ));
    }
    if template.applications_count < MIN_PROVEN_APPLICATIONS {
        reasons.push(format!(
            "template still unproven ({} of {MIN_PROVEN_APPLICATIONS} applications)",
            template.applications_count
        ));
    }
    if template.acceptance_rate < MIN_TRUSTED_ACCEPTANCE {
        reasons.push(format!(
            "acceptance rate {:.0}% below {:.0}%",
            template.acceptance_rate * 100.0,
            MIN_TRUSTED_ACCEPTANCE * 100.0
        ));
    }
    let name = fold(hazard_name);
    if let Some(keyword) = MANUAL_REVIEW_KEYWORDS.iter().find(|k| name.contains(*k)) {
        reasons.push(format!(
            "'{keyword}' hazards vary too much in severity for a single default"
        ));
    }
    reasons
}

/// A template of the hazard's category; a name-pattern match wins,
/// otherwise the first of the category.
pub fn select_template<'a>(
    hazard: &HazardExposure,
    templates: &'a [Template],
) -> Option<&'a Template> {
    let category = hazard.category?;
    let candidates: Vec<&Template> = templates.iter().filter(|t| t.category == category).collect();
    candidates
        .iter()
        .find(|t| t.matches_name(&hazard.name))
        .or_else(|| candidates.first())
        .copied()
}

pub fn suggest_for_hazard(hazard: &HazardExposure, templates: &[Template]) -> Suggestion {
    let Some(template) = select_template(hazard, templates) else {
        return Suggestion {
            hazard_id: hazard.id.clone(),
            hazard_name: hazard.name.clone(),
            category: hazard.category,
            status: SuggestionStatus::NoTemplate,
            template_id: None,
            levels: None,
            nr: None,
            justification: format!(
                "No template for category '{}': manual evaluation required",
                hazard.category_label
            ),
            confidence: 0.0,
            needs_review: true,
            review_reasons: vec!["no template for category".to_string()],
        };
    };

    let review_reasons = review_reasons(template, &hazard.name);
    Suggestion {
        hazard_id: hazard.id.clone(),
        hazard_name: hazard.name.clone(),
        category: hazard.category,
        status: SuggestionStatus::Suggested,
        template_id: Some(template.template_id.clone()),
        levels: Some(template.default_levels),
        nr: Some(template.default_levels.risk()),
        justification: template.justification.clone(),
        confidence: confidence(template.applications_count, template.acceptance_rate),
        needs_review: !review_reasons.is_empty(),
        review_reasons,
    }
}

/// Suggest levels for every hazard using only `company_id`'s templates.
pub fn suggest(
    company_id: &str,
    hazards: &[HazardExposure],
    templates: &[Template],
) -> Vec<Suggestion> {
    let own: Vec<Template> = templates
        .iter()
        .filter(|t| t.company_id == company_id)
        .cloned()
        .collect();
    hazards
        .iter()
        .map(|hazard| suggest_for_hazard(hazard, &own))
        .collect()
}
