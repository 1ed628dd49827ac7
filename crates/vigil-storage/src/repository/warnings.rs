//! Warning counter repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use vigil_core::EntityRef;

use crate::error::Result;
use crate::models::WarningRecord;
use crate::repository::messages::{format_datetime, parse_datetime};

/// Repository for per-entity behavioral warning counts.
pub struct WarningsRepo;

impl WarningsRepo {
    /// Current warning count for an entity; zero when never warned.
    pub fn count(conn: &Connection, entity: EntityRef) -> Result<u64> {
        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM warnings WHERE entity_kind = ?1 AND entity_id = ?2",
                params![entity.kind.as_str(), entity.id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    /// Adds one warning and returns the new count.
    pub fn increment(conn: &Connection, entity: EntityRef, now: DateTime<Utc>) -> Result<u64> {
        conn.execute(
            "INSERT INTO warnings (entity_kind, entity_id, count, updated_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(entity_kind, entity_id)
             DO UPDATE SET count = count + 1, updated_at = ?3",
            params![entity.kind.as_str(), entity.id, format_datetime(now)],
        )?;
        Self::count(conn, entity)
    }

    /// Resets an entity's warning count.
    pub fn reset(conn: &Connection, entity: EntityRef) -> Result<()> {
        conn.execute(
            "DELETE FROM warnings WHERE entity_kind = ?1 AND entity_id = ?2",
            params![entity.kind.as_str(), entity.id],
        )?;
        Ok(())
    }

    /// All warning records, most-warned first.
    pub fn all(conn: &Connection) -> Result<Vec<WarningRecord>> {
        let mut stmt = conn.prepare(
            "SELECT entity_kind, entity_id, count, updated_at
             FROM warnings ORDER BY count DESC",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(kind, id, count, updated)| {
                Some(WarningRecord {
                    entity_kind: vigil_core::EntityKind::parse(&kind)?,
                    entity_id: id,
                    count: count.max(0) as u64,
                    updated_at: parse_datetime(&updated),
                })
            })
            .collect();
        Ok(records)
    }
}
