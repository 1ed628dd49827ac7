//! Alerts repository.

use rusqlite::{params, Connection};
use vigil_core::{Alert, AlertKind, AlertSeverity, EntityKind};

use crate::error::Result;
use crate::models::StoredAlert;
use crate::repository::messages::{format_datetime, parse_datetime};

/// Repository for persisted alerts.
pub struct AlertsRepo;

impl AlertsRepo {
    /// Insert an emitted alert.
    pub fn insert(conn: &Connection, alert: &Alert) -> Result<i64> {
        conn.execute(
            "INSERT INTO alerts (kind, entity_kind, entity_id, severity, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                alert.kind.as_str(),
                alert.entity.kind.as_str(),
                alert.entity.id,
                alert.severity.as_str(),
                alert.message,
                format_datetime(alert.timestamp),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent alerts, newest first.
    pub fn recent(conn: &Connection, limit: i64) -> Result<Vec<StoredAlert>> {
        let mut stmt = conn.prepare(
            "SELECT id, kind, entity_kind, entity_id, severity, message, created_at
             FROM alerts ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let alerts = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, kind, entity_kind, entity_id, severity, message, created)| {
                Some(StoredAlert {
                    id,
                    kind: AlertKind::parse(&kind)?,
                    entity_kind: EntityKind::parse(&entity_kind)?,
                    entity_id,
                    severity: AlertSeverity::parse(&severity)?,
                    message,
                    created_at: parse_datetime(&created),
                })
            })
            .collect();
        Ok(alerts)
    }

    /// Count total persisted alerts.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
        Ok(count)
    }
}
