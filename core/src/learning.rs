//! Adaptive learning — application log, template statistics, override
//! patterns and template auto-revision.
//!
//! RULE: The application log is append-only. Template statistics are
//! recomputed from the full history on every recording, never
//! incremented, so concurrent writers cannot drift them as long as the
//! append and the recompute share one transaction.

use crate::{
    config::LearningConfig,
    error::ValidationError,
    risk_level::RiskLevels,
    template::Template,
    types::{CompanyId, HazardId, PositionId, TemplateId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One suggestion-versus-final-value event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub record_id: String,
    pub company_id: CompanyId,
    pub template_id: TemplateId,
    pub hazard_id: HazardId,
    pub position_id: PositionId,
    pub suggested: RiskLevels,
    pub final_levels: RiskLevels,
    pub accepted_unmodified: bool,
    /// |NR(final) − NR(suggested)| / NR(suggested), as a percentage.
    pub deviation_pct: f64,
    pub override_justification: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// What the caller knows when a human finalises a suggested evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInput {
    pub hazard_id: HazardId,
    pub position_id: PositionId,
    pub suggested: RiskLevels,
    pub final_levels: RiskLevels,
    #[serde(default)]
    pub override_justification: Option<String>,
}

/// Relative NR change. 1 when the suggestion was 0 and the final is
/// not; 0 when both are 0.
pub fn deviation_fraction(suggested: &RiskLevels, final_levels: &RiskLevels) -> f64 {
    let s = suggested.risk() as f64;
    let f = final_levels.risk() as f64;
    if s == 0.0 {
        if f > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (f - s).abs() / s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateStats {
    pub applications_count: u32,
    pub acceptance_rate: f64,
}

/// Statistics over one template's full history.
pub fn template_stats(history: &[ApplicationRecord]) -> TemplateStats {
    let count = history.len();
    let accepted = history.iter().filter(|r| r.accepted_unmodified).count();
    TemplateStats {
        applications_count: count as u32,
        acceptance_rate: if count == 0 {
            0.0
        } else {
            accepted as f64 / count as f64
        },
    }
}

/// Build the record for one application and the template with its
/// statistics recomputed over `history` plus the new record.
/// `history` is the template's prior log in append order.
pub fn record_application(
    template: &Template,
    history: &[ApplicationRecord],
    input: &ApplicationInput,
    recorded_at: DateTime<Utc>,
) -> Result<(ApplicationRecord, Template), ValidationError> {
    input.suggested.validate()?;
    input.final_levels.validate()?;

    let accepted_unmodified = input.suggested == input.final_levels;
    let record = ApplicationRecord {
        record_id: Uuid::new_v4().to_string(),
        company_id: template.company_id.clone(),
        template_id: template.template_id.clone(),
        hazard_id: input.hazard_id.clone(),
        position_id: input.position_id.clone(),
        suggested: input.suggested,
        final_levels: input.final_levels,
        accepted_unmodified,
        deviation_pct: deviation_fraction(&input.suggested, &input.final_levels) * 100.0,
        override_justification: input
            .override_justification
            .as_ref()
            .map(|j| j.trim().to_string())
            .filter(|j| !j.is_empty()),
        recorded_at,
    };

    let mut full: Vec<ApplicationRecord> = history
        .iter()
        .filter(|r| r.template_id == template.template_id)
        .cloned()
        .collect();
    full.push(record.clone());
    let stats = template_stats(&full);

    let mut updated = template.clone();
    updated.applications_count = stats.applications_count;
    updated.acceptance_rate = stats.acceptance_rate;
    updated.updated_at = recorded_at;

    Ok((record, updated))
}

/// Final levels that evaluators keep choosing instead of the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverridePattern {
    pub template_id: TemplateId,
    pub levels: RiskLevels,
    pub occurrences: usize,
    /// Overrides considered (most recent, capped by the window).
    pub sample_size: usize,
    pub frequency_pct: f64,
}

/// Group the most recent overrides by exact final levels; the largest
/// group is a pattern when it reaches the configured share. Ties go to
/// the group seen most recently. `history` is in append order.
///
/// Overrides that already match the template's current defaults count
/// toward the sample but never form a pattern, so a revised template is
/// not revised again by the evidence that moved it.
pub fn detect_override_pattern(
    template: &Template,
    history: &[ApplicationRecord],
    config: &LearningConfig,
) -> Option<OverridePattern> {
    let template_id = template.template_id.as_str();
    let window = config.pattern_window;
    let recent: Vec<&ApplicationRecord> = history
        .iter()
        .rev()
        .filter(|r| r.template_id == template_id && !r.accepted_unmodified)
        .take(window)
        .collect();
    if recent.is_empty() || recent.len() < config.pattern_min_sample {
        return None;
    }

    // First-seen order is most-recent-first, so a strict `>` keeps the
    // most recent group on ties.
    let mut groups: Vec<(RiskLevels, usize)> = Vec::new();
    for record in &recent {
        match groups.iter_mut().find(|(levels, _)| *levels == record.final_levels) {
            Some((_, count)) => *count += 1,
            None => groups.push((record.final_levels, 1)),
        }
    }
    let (levels, occurrences) = groups
        .into_iter()
        .filter(|(levels, _)| *levels != template.default_levels)
        .fold(None, |best: Option<(RiskLevels, usize)>, (levels, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((levels, count)),
        })?;

    let share = occurrences as f64 / recent.len() as f64;
    if share < config.pattern_min_share {
        return None;
    }
    Some(OverridePattern {
        template_id: template_id.to_string(),
        levels,
        occurrences,
        sample_size: recent.len(),
        frequency_pct: share * 100.0,
    })
}

/// Overwrite the template defaults with a detected pattern and note the
/// revision in its justification. Statistics are left for the next
/// recording to recompute.
pub fn apply_override_pattern(
    template: &Template,
    pattern: &OverridePattern,
    now: DateTime<Utc>,
) -> Result<Template, ValidationError> {
    pattern.levels.validate()?;

    let mut revised = template.clone();
    revised.default_levels = pattern.levels;
    revised.justification = format!(
        "{} [auto-revised {}: {} -> {} after {} of {} overrides ({:.0}%)]",
        template.justification,
        now.format("%Y-%m-%d"),
        template.default_levels,
        pattern.levels,
        pattern.occurrences,
        pattern.sample_size,
        pattern.frequency_pct
    );
    revised.updated_at = now;
    Ok(revised)
}
