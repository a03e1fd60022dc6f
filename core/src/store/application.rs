//! Application log queries. Insert and read only; the schema rejects
//! updates and deletes.

use super::{parse_timestamp, TemplateStore};
use crate::{error::ControlResult, learning::ApplicationRecord, risk_level::RiskLevels};
use rusqlite::{params, Row};

struct ApplicationRow {
    record_id: String,
    company_id: String,
    template_id: String,
    hazard_id: String,
    position_id: String,
    suggested: (u32, u32, u32),
    final_levels: (u32, u32, u32),
    accepted_unmodified: bool,
    deviation_pct: f64,
    override_justification: Option<String>,
    recorded_at: String,
}

const APPLICATION_COLUMNS: &str = "record_id, company_id, template_id, hazard_id, position_id,
     suggested_nd, suggested_ne, suggested_nc, final_nd, final_ne, final_nc,
     accepted_unmodified, deviation_pct, override_justification, recorded_at";

impl ApplicationRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            record_id: r.get(0)?,
            company_id: r.get(1)?,
            template_id: r.get(2)?,
            hazard_id: r.get(3)?,
            position_id: r.get(4)?,
            suggested: (r.get(5)?, r.get(6)?, r.get(7)?),
            final_levels: (r.get(8)?, r.get(9)?, r.get(10)?),
            accepted_unmodified: r.get::<_, i32>(11)? != 0,
            deviation_pct: r.get(12)?,
            override_justification: r.get(13)?,
            recorded_at: r.get(14)?,
        })
    }

    fn into_record(self) -> ControlResult<ApplicationRecord> {
        let (snd, sne, snc) = self.suggested;
        let (fnd, fne, fnc) = self.final_levels;
        Ok(ApplicationRecord {
            record_id: self.record_id,
            company_id: self.company_id,
            template_id: self.template_id,
            hazard_id: self.hazard_id,
            position_id: self.position_id,
            suggested: RiskLevels::new(snd, sne, snc)?,
            final_levels: RiskLevels::new(fnd, fne, fnc)?,
            accepted_unmodified: self.accepted_unmodified,
            deviation_pct: self.deviation_pct,
            override_justification: self.override_justification,
            recorded_at: parse_timestamp(&self.recorded_at)?,
        })
    }
}

impl TemplateStore {
    pub fn append_application(&self, rec: &ApplicationRecord) -> ControlResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO application_record ({APPLICATION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                &rec.record_id,
                &rec.company_id,
                &rec.template_id,
                &rec.hazard_id,
                &rec.position_id,
                rec.suggested.nd,
                rec.suggested.ne,
                rec.suggested.nc,
                rec.final_levels.nd,
                rec.final_levels.ne,
                rec.final_levels.nc,
                rec.accepted_unmodified as i32,
                rec.deviation_pct,
                &rec.override_justification,
                rec.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// One template's history in append order.
    pub fn applications_for_template(
        &self,
        template_id: &str,
    ) -> ControlResult<Vec<ApplicationRecord>> {
        self.query_applications(
            &format!(
                "SELECT {APPLICATION_COLUMNS} FROM application_record
                 WHERE template_id=?1 ORDER BY seq ASC"
            ),
            template_id,
        )
    }

    /// Every application recorded for a company, in append order.
    pub fn applications_for_company(
        &self,
        company_id: &str,
    ) -> ControlResult<Vec<ApplicationRecord>> {
        self.query_applications(
            &format!(
                "SELECT {APPLICATION_COLUMNS} FROM application_record
                 WHERE company_id=?1 ORDER BY seq ASC"
            ),
            company_id,
        )
    }

    fn query_applications(&self, sql: &str, key: &str) -> ControlResult<Vec<ApplicationRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![key], ApplicationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ApplicationRow::into_record).collect()
    }
}
