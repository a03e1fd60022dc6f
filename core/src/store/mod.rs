//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Engine code calls store methods — it never executes SQL directly.

use crate::{
    error::{ControlError, ControlResult},
    event::AuditEntry,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
mod application;
mod template;

pub struct TemplateStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl TemplateStore {
    pub fn open(path: &str) -> ControlResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ControlResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ControlResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_templates.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_audit_log.sql"))?;
        Ok(())
    }

    /// Run `f` inside one IMMEDIATE transaction. Any error rolls back
    /// everything `f` wrote.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Self) -> ControlResult<T>,
    ) -> ControlResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Audit log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &AuditEntry) -> ControlResult<()> {
        self.conn.execute(
            "INSERT INTO audit_event (company_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.company_id,
                entry.event_type,
                entry.payload,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn audit_log(&self, company_id: &str) -> ControlResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, company_id, event_type, payload, created_at
             FROM audit_event WHERE company_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, company_id, event_type, payload, created_at)| {
                Ok(AuditEntry {
                    id: Some(id),
                    company_id,
                    event_type,
                    payload,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}

fn parse_timestamp(raw: &str) -> ControlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ControlError::Other(anyhow::anyhow!("Bad timestamp '{raw}': {e}")))
}
