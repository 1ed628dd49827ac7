//! Sensitive words repository.

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::error::Result;

/// Repository for the sensitive word collection.
pub struct KeywordsRepo;

impl KeywordsRepo {
    /// Load the full persisted keyword set.
    pub fn load_all(conn: &Connection) -> Result<BTreeSet<String>> {
        let mut stmt = conn.prepare("SELECT word FROM sensitive_words")?;
        let words = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(words)
    }

    /// Persist a keyword. Inserting an existing word is a no-op.
    pub fn insert(conn: &Connection, word: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO sensitive_words (word) VALUES (?1)",
            [word],
        )?;
        Ok(())
    }

    /// Delete a keyword. Deleting an absent word is a no-op.
    pub fn delete(conn: &Connection, word: &str) -> Result<()> {
        conn.execute("DELETE FROM sensitive_words WHERE word = ?1", [word])?;
        Ok(())
    }
}
