//! The control engine — one facade over evaluation, templates and learning.
//!
//! RULES:
//!   - Position evaluation is pure: it never touches the store.
//!   - Every write goes through the store inside a single transaction,
//!     together with its audit event.
//!   - A template is only ever read or changed on behalf of the company
//!     that owns it.

use crate::{
    catalog::{ExamCatalog, HazardCatalog, StaticCatalog},
    config::ControlConfig,
    error::{ControlError, ControlResult},
    event::{AuditEntry, ControlEvent},
    hazard::{HazardCategory, HazardExposure},
    inconsistency::{detect_inconsistencies, InconsistencyReport, InconsistencySeverity},
    learning::{self, ApplicationInput, ApplicationRecord, OverridePattern},
    position::{self, PositionEvaluation, PositionProfile},
    risk_level::RiskLevels,
    store::TemplateStore,
    suggestion::{self, Suggestion},
    template::{seed_templates, Template},
    types::HazardId,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of an auto-revision attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RevisionOutcome {
    Revised {
        template: Template,
        pattern: OverridePattern,
    },
    /// Overrides are not yet concentrated enough to act on.
    NoPattern,
}

pub struct ControlEngine {
    config: ControlConfig,
    catalog: Box<dyn HazardCatalog>,
    exams: ExamCatalog,
    store: TemplateStore,
}

impl ControlEngine {
    pub fn new(
        config: ControlConfig,
        catalog: Box<dyn HazardCatalog>,
        exams: ExamCatalog,
        store: TemplateStore,
    ) -> Self {
        Self {
            config,
            catalog,
            exams,
            store,
        }
    }

    /// Build a fully wired engine from the JSON files under `data_dir`.
    /// Migrates the store before handing it over.
    pub fn build(data_dir: &str, store: TemplateStore) -> anyhow::Result<Self> {
        let config = ControlConfig::load(data_dir)?;
        let catalog = StaticCatalog::load(data_dir)?;
        let exams = ExamCatalog::load(data_dir)?;
        store.migrate()?;
        log::info!(
            "control engine ready: {} catalog hazards, store {}",
            catalog.len(),
            store.path().unwrap_or(":memory:")
        );
        Ok(Self::new(config, Box::new(catalog), exams, store))
    }

    /// In-memory store with migrations applied (used in tests).
    pub fn in_memory(
        config: ControlConfig,
        catalog: Box<dyn HazardCatalog>,
    ) -> ControlResult<Self> {
        let store = TemplateStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(config, catalog, ExamCatalog::default(), store))
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn exams(&self) -> &ExamCatalog {
        &self.exams
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    // ── Evaluation ─────────────────────────────────────────────

    pub fn evaluate_position(
        &self,
        profile: &PositionProfile,
    ) -> ControlResult<PositionEvaluation> {
        Ok(position::evaluate_position(
            profile,
            self.catalog.as_ref(),
            &self.config,
        )?)
    }

    // ── Templates ──────────────────────────────────────────────

    /// Give `company_id` one default template per category it lacks.
    /// Returns only the templates created by this call.
    pub fn seed_company_templates(&self, company_id: &str) -> ControlResult<Vec<Template>> {
        self.store.in_transaction(|store| {
            let existing: Vec<HazardCategory> = store
                .templates_for_company(company_id)?
                .iter()
                .map(|t| t.category)
                .collect();
            let now = Utc::now();
            let seeded = seed_templates(company_id, &existing, now)?;
            if seeded.is_empty() {
                return Ok(seeded);
            }
            for t in &seeded {
                store.insert_template(t)?;
            }
            Self::emit(
                store,
                ControlEvent::TemplatesSeeded {
                    company_id: company_id.to_string(),
                    template_ids: seeded.iter().map(|t| t.template_id.clone()).collect(),
                },
            )?;
            log::info!("seeded {} templates for company {company_id}", seeded.len());
            Ok(seeded)
        })
    }

    pub fn create_template(
        &self,
        company_id: &str,
        category: HazardCategory,
        levels: RiskLevels,
        justification: &str,
        name_patterns: Vec<String>,
    ) -> ControlResult<Template> {
        let template = Template::new(
            company_id,
            category,
            levels,
            justification,
            name_patterns,
            Utc::now(),
        )?;
        self.store.in_transaction(|store| {
            store.insert_template(&template)?;
            Self::emit(
                store,
                ControlEvent::TemplateCreated {
                    company_id: company_id.to_string(),
                    template_id: template.template_id.clone(),
                    levels,
                },
            )
        })?;
        Ok(template)
    }

    pub fn templates(&self, company_id: &str) -> ControlResult<Vec<Template>> {
        self.store.templates_for_company(company_id)
    }

    /// Suggested levels for each newly selected hazard, from this
    /// company's templates only.
    pub fn suggest(
        &self,
        company_id: &str,
        hazards: &[HazardExposure],
    ) -> ControlResult<Vec<Suggestion>> {
        let templates = self.store.templates_for_company(company_id)?;
        let suggestions = suggestion::suggest(company_id, hazards, &templates);
        for s in suggestions.iter().filter(|s| s.needs_review) {
            log::debug!(
                "suggestion for '{}' needs review: {}",
                s.hazard_name,
                s.review_reasons.join("; ")
            );
        }
        Ok(suggestions)
    }

    // ── Learning ───────────────────────────────────────────────

    /// Append one application and recompute the template's statistics
    /// from its full history, atomically.
    pub fn record_application(
        &self,
        company_id: &str,
        template_id: &str,
        input: &ApplicationInput,
    ) -> ControlResult<(ApplicationRecord, Template)> {
        self.store.in_transaction(|store| {
            let template = Self::owned_template(store, company_id, template_id)?;
            let history = store.applications_for_template(template_id)?;
            let (record, updated) =
                learning::record_application(&template, &history, input, Utc::now())?;
            store.append_application(&record)?;
            store.update_template(&updated)?;
            Self::emit(
                store,
                ControlEvent::ApplicationRecorded {
                    company_id: company_id.to_string(),
                    template_id: template_id.to_string(),
                    record_id: record.record_id.clone(),
                    hazard_id: record.hazard_id.clone(),
                    position_id: record.position_id.clone(),
                    accepted_unmodified: record.accepted_unmodified,
                    deviation_pct: record.deviation_pct,
                },
            )?;
            log::info!(
                "template {template_id}: {} applications, {:.0}% accepted",
                updated.applications_count,
                updated.acceptance_rate * 100.0
            );
            Ok((record, updated))
        })
    }

    pub fn detect_override_pattern(
        &self,
        company_id: &str,
        template_id: &str,
    ) -> ControlResult<Option<OverridePattern>> {
        let template = Self::owned_template(&self.store, company_id, template_id)?;
        let history = self.store.applications_for_template(template_id)?;
        Ok(learning::detect_override_pattern(
            &template,
            &history,
            &self.config.learning,
        ))
    }

    /// Move a template's defaults to the dominant override pattern.
    /// A rejected revision leaves the template untouched and is recorded
    /// in the audit log before the error is returned.
    pub fn auto_revise_template(
        &self,
        company_id: &str,
        template_id: &str,
    ) -> ControlResult<RevisionOutcome> {
        let revised = self.store.in_transaction(|store| {
            let template = Self::owned_template(store, company_id, template_id)?;
            let history = store.applications_for_template(template_id)?;
            let Some(pattern) =
                learning::detect_override_pattern(&template, &history, &self.config.learning)
            else {
                return Ok(RevisionOutcome::NoPattern);
            };
            let revised = learning::apply_override_pattern(&template, &pattern, Utc::now())?;
            store.update_template(&revised)?;
            Self::emit(
                store,
                ControlEvent::TemplateRevised {
                    company_id: company_id.to_string(),
                    template_id: template_id.to_string(),
                    previous: template.default_levels,
                    revised: revised.default_levels,
                    frequency_pct: pattern.frequency_pct,
                },
            )?;
            log::info!(
                "template {template_id} revised {} -> {} ({:.0}% of overrides)",
                template.default_levels,
                revised.default_levels,
                pattern.frequency_pct
            );
            Ok(RevisionOutcome::Revised {
                template: revised,
                pattern,
            })
        });

        if let Err(ControlError::Validation(err)) = &revised {
            log::warn!("template {template_id}: auto-revision rejected: {err}");
            self.store.in_transaction(|store| {
                Self::emit(
                    store,
                    ControlEvent::RevisionRejected {
                        company_id: company_id.to_string(),
                        template_id: template_id.to_string(),
                        reason: err.to_string(),
                    },
                )
            })?;
        }
        revised
    }

    /// Hazards whose final NR varies widely across this company's
    /// positions. A hazard is written to the audit log when it is first
    /// flagged or its severity changes; repeated reports add nothing.
    pub fn company_inconsistencies(
        &self,
        company_id: &str,
    ) -> ControlResult<Vec<InconsistencyReport>> {
        let history = self.store.applications_for_company(company_id)?;
        let reports = detect_inconsistencies(&history, &self.config.learning);
        if reports.is_empty() {
            return Ok(reports);
        }
        self.store.in_transaction(|store| {
            let flagged = Self::flagged_severities(store, company_id)?;
            for r in &reports {
                if flagged.get(&r.hazard_id) == Some(&r.severity) {
                    continue;
                }
                log::info!(
                    "company {company_id}: hazard {} inconsistent (CV {:.2}, {:?})",
                    r.hazard_id,
                    r.coefficient_of_variation,
                    r.severity
                );
                Self::emit(
                    store,
                    ControlEvent::InconsistencyFlagged {
                        company_id: company_id.to_string(),
                        hazard_id: r.hazard_id.clone(),
                        coefficient_of_variation: r.coefficient_of_variation,
                        severity: r.severity,
                    },
                )?;
            }
            Ok(())
        })?;
        Ok(reports)
    }

    /// Latest audited severity per hazard.
    fn flagged_severities(
        store: &TemplateStore,
        company_id: &str,
    ) -> ControlResult<HashMap<HazardId, InconsistencySeverity>> {
        let mut latest = HashMap::new();
        for entry in store.audit_log(company_id)? {
            if let ControlEvent::InconsistencyFlagged {
                hazard_id, severity, ..
            } = entry.event()?
            {
                latest.insert(hazard_id, severity);
            }
        }
        Ok(latest)
    }

    pub fn audit_log(&self, company_id: &str) -> ControlResult<Vec<AuditEntry>> {
        self.store.audit_log(company_id)
    }

    // ── Internals ──────────────────────────────────────────────

    fn owned_template(
        store: &TemplateStore,
        company_id: &str,
        template_id: &str,
    ) -> ControlResult<Template> {
        let template = store
            .get_template(template_id)?
            .ok_or_else(|| ControlError::TemplateNotFound {
                template_id: template_id.to_string(),
            })?;
        if template.company_id != company_id {
            return Err(ControlError::CompanyMismatch {
                template_id: template_id.to_string(),
                owner: template.company_id,
                requested: company_id.to_string(),
            });
        }
        Ok(template)
    }

    fn emit(store: &TemplateStore, event: ControlEvent) -> ControlResult<()> {
        let entry = AuditEntry::from_event(&event, Utc::now())?;
        store.append_event(&entry)
    }
}
