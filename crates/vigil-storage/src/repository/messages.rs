//! Messages repository.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use vigil_core::{EntityKind, EntityRef, Event, MessageKind};

use crate::error::Result;

/// Formats a timestamp for storage.
///
/// Fixed-width UTC RFC 3339 so that lexicographic comparison in SQL matches
/// chronological order.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp, tolerating the space-separated legacy form.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Repository for message operations.
pub struct MessagesRepo;

impl MessagesRepo {
    /// Insert a canonical event as a message row.
    pub fn insert(conn: &Connection, event: &Event) -> Result<i64> {
        let content = if event.text.is_empty() {
            None
        } else {
            Some(event.text.as_str())
        };
        conn.execute(
            "INSERT INTO messages (user_id, group_id, kind, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.user_id,
                event.group_id,
                event.kind.as_str(),
                content,
                format_datetime(event.timestamp),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get an entity's messages at or after the cutoff, oldest first.
    pub fn fetch_since(
        conn: &Connection,
        entity: EntityRef,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let column = match entity.kind {
            EntityKind::User => "user_id",
            EntityKind::Group => "group_id",
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT user_id, group_id, kind, content, created_at
             FROM messages WHERE {column} = ?1 AND created_at >= ?2
             ORDER BY created_at ASC"
        ))?;

        let events = stmt
            .query_map(params![entity.id, format_datetime(cutoff)], |row| {
                Ok(Event {
                    user_id: row.get(0)?,
                    group_id: row.get(1)?,
                    kind: row
                        .get::<_, String>(2)
                        .ok()
                        .and_then(|s| MessageKind::parse(&s))
                        .unwrap_or_default(),
                    text: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    timestamp: parse_datetime(&row.get::<_, String>(4)?),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(events)
    }

    /// Count total messages.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::run_migrations(&conn).unwrap();
        conn
    }

    fn event(user: i64, group: Option<i64>, ts: DateTime<Utc>, text: &str) -> Event {
        Event {
            user_id: user,
            group_id: group,
            timestamp: ts,
            kind: MessageKind::Text,
            text: text.to_string(),
        }
    }

    #[test]
    fn insert_and_fetch_since_roundtrip() {
        let conn = conn();
        let base = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        for i in 0..3 {
            MessagesRepo::insert(
                &conn,
                &event(1, Some(100), base + chrono::Duration::hours(i), "hello"),
            )
            .unwrap();
        }
        // Different group: excluded from the group query.
        MessagesRepo::insert(&conn, &event(1, Some(200), base, "other")).unwrap();

        let events =
            MessagesRepo::fetch_since(&conn, EntityRef::group(100), base).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(events[0].text, "hello");

        // Cutoff is inclusive; anything strictly newer than the last event
        // yields nothing.
        let events = MessagesRepo::fetch_since(
            &conn,
            EntityRef::group(100),
            base + chrono::Duration::hours(2),
        )
        .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn media_messages_store_null_content() {
        let conn = conn();
        let base = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut media = event(5, None, base, "");
        media.kind = MessageKind::Photo;
        MessagesRepo::insert(&conn, &media).unwrap();

        let events = MessagesRepo::fetch_since(&conn, EntityRef::user(5), base).unwrap();
        assert_eq!(events[0].kind, MessageKind::Photo);
        assert_eq!(events[0].text, "");
    }

    #[test]
    fn datetime_format_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap();
        assert_eq!(parse_datetime(&format_datetime(ts)), ts);
        assert_eq!(
            parse_datetime("2024-06-15 12:30:45"),
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap()
        );
    }
}
