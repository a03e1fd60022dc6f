//! Audit events — every change to a company's templates or learning log.
//!
//! RULE: Every engine write appends its event in the same transaction.
//! Events are serialized to JSON into `audit_event` and are never
//! updated or deleted.

use crate::{
    inconsistency::InconsistencySeverity,
    risk_level::RiskLevels,
    types::{CompanyId, HazardId, PositionId, TemplateId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    TemplatesSeeded {
        company_id: CompanyId,
        template_ids: Vec<TemplateId>,
    },
    TemplateCreated {
        company_id: CompanyId,
        template_id: TemplateId,
        levels: RiskLevels,
    },
    ApplicationRecorded {
        company_id: CompanyId,
        template_id: TemplateId,
        record_id: String,
        hazard_id: HazardId,
        position_id: PositionId,
        accepted_unmodified: bool,
        deviation_pct: f64,
    },
    TemplateRevised {
        company_id: CompanyId,
        template_id: TemplateId,
        previous: RiskLevels,
        revised: RiskLevels,
        frequency_pct: f64,
    },
    RevisionRejected {
        company_id: CompanyId,
        template_id: TemplateId,
        reason: String,
    },
    InconsistencyFlagged {
        company_id: CompanyId,
        hazard_id: HazardId,
        coefficient_of_variation: f64,
        severity: InconsistencySeverity,
    },
}

impl ControlEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ControlEvent::TemplatesSeeded { .. } => "templates_seeded",
            ControlEvent::TemplateCreated { .. } => "template_created",
            ControlEvent::ApplicationRecorded { .. } => "application_recorded",
            ControlEvent::TemplateRevised { .. } => "template_revised",
            ControlEvent::RevisionRejected { .. } => "revision_rejected",
            ControlEvent::InconsistencyFlagged { .. } => "inconsistency_flagged",
        }
    }

    pub fn company_id(&self) -> &str {
        match self {
            ControlEvent::TemplatesSeeded { company_id, .. }
            | ControlEvent::TemplateCreated { company_id, .. }
            | ControlEvent::ApplicationRecorded { company_id, .. }
            | ControlEvent::TemplateRevised { company_id, .. }
            | ControlEvent::RevisionRejected { company_id, .. }
            | ControlEvent::InconsistencyFlagged { company_id, .. } => company_id,
        }
    }
}

/// Persisted form of an event (one `audit_event` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Option<i64>,
    pub company_id: CompanyId,
    pub event_type: String,
    pub payload: String, // JSON-serialized ControlEvent
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_event(event: &ControlEvent, created_at: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            company_id: event.company_id().to_string(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_string(event)?,
            created_at,
        })
    }

    pub fn event(&self) -> serde_json::Result<ControlEvent> {
        serde_json::from_str(&self.payload)
    }
}
