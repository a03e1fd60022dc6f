//! Risk template queries.

use super::{parse_timestamp, TemplateStore};
use crate::{
    error::{ControlError, ControlResult},
    hazard::HazardCategory,
    risk_level::RiskLevels,
    template::Template,
};
use rusqlite::{params, OptionalExtension, Row};

/// Column-for-column image of a `risk_template` row.
struct TemplateRow {
    template_id: String,
    company_id: String,
    category: String,
    nd: u32,
    ne: u32,
    nc: u32,
    justification: String,
    name_patterns: String,
    applications_count: u32,
    acceptance_rate: f64,
    created_at: String,
    updated_at: String,
}

const TEMPLATE_COLUMNS: &str = "template_id, company_id, category, nd, ne, nc, justification,
     name_patterns, applications_count, acceptance_rate, created_at, updated_at";

impl TemplateRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            template_id: r.get(0)?,
            company_id: r.get(1)?,
            category: r.get(2)?,
            nd: r.get(3)?,
            ne: r.get(4)?,
            nc: r.get(5)?,
            justification: r.get(6)?,
            name_patterns: r.get(7)?,
            applications_count: r.get(8)?,
            acceptance_rate: r.get(9)?,
            created_at: r.get(10)?,
            updated_at: r.get(11)?,
        })
    }

    fn into_template(self) -> ControlResult<Template> {
        let category = HazardCategory::from_key(&self.category).ok_or_else(|| {
            ControlError::Other(anyhow::anyhow!(
                "Template '{}' has unknown category '{}'",
                self.template_id,
                self.category
            ))
        })?;
        Ok(Template {
            category,
            default_levels: RiskLevels::new(self.nd, self.ne, self.nc)?,
            name_patterns: serde_json::from_str(&self.name_patterns)?,
            applications_count: self.applications_count,
            acceptance_rate: self.acceptance_rate,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            template_id: self.template_id,
            company_id: self.company_id,
            justification: self.justification,
        })
    }
}

impl TemplateStore {
    pub fn insert_template(&self, t: &Template) -> ControlResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO risk_template ({TEMPLATE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                &t.template_id,
                &t.company_id,
                t.category.key(),
                t.default_levels.nd,
                t.default_levels.ne,
                t.default_levels.nc,
                &t.justification,
                serde_json::to_string(&t.name_patterns)?,
                t.applications_count,
                t.acceptance_rate,
                t.created_at.to_rfc3339(),
                t.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Overwrite the mutable fields of an existing template.
    pub fn update_template(&self, t: &Template) -> ControlResult<()> {
        let changed = self.conn.execute(
            "UPDATE risk_template
             SET nd=?2, ne=?3, nc=?4, justification=?5, name_patterns=?6,
                 applications_count=?7, acceptance_rate=?8, updated_at=?9
             WHERE template_id=?1",
            params![
                &t.template_id,
                t.default_levels.nd,
                t.default_levels.ne,
                t.default_levels.nc,
                &t.justification,
                serde_json::to_string(&t.name_patterns)?,
                t.applications_count,
                t.acceptance_rate,
                t.updated_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(ControlError::TemplateNotFound {
                template_id: t.template_id.clone(),
            });
        }
        Ok(())
    }

    pub fn get_template(&self, template_id: &str) -> ControlResult<Option<Template>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM risk_template WHERE template_id=?1"),
                params![template_id],
                TemplateRow::from_row,
            )
            .optional()?;
        row.map(TemplateRow::into_template).transpose()
    }

    /// A company's templates, oldest first.
    pub fn templates_for_company(&self, company_id: &str) -> ControlResult<Vec<Template>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM risk_template
             WHERE company_id=?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![company_id], TemplateRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TemplateRow::into_template).collect()
    }
}
