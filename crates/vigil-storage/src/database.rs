//! High-level database interface.
//!
//! `Database` owns the connection and implements the engine's boundary
//! traits, so one handle can serve as the keyword backend, event history,
//! warning ledger, and durable alert sink at once.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::info;
use vigil_core::{
    Alert, AlertSink, EngineError, EntityRef, Event, EventHistory, KeywordBackend, WarningLedger,
};

use crate::error::Result;
use crate::models::{StoredAlert, WarningRecord};
use crate::pool::ConnectionPool;
use crate::repository::{AlertsRepo, KeywordsRepo, MessagesRepo, WarningsRepo};

/// High-level database interface for Vigil.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    // === Messages ===

    /// Persist a canonical event.
    pub fn insert_message(&self, event: &Event) -> Result<i64> {
        let conn = self.pool.get()?;
        MessagesRepo::insert(&conn, event)
    }

    /// Get an entity's messages at or after the cutoff, oldest first.
    pub fn messages_since(&self, entity: EntityRef, cutoff: DateTime<Utc>) -> Result<Vec<Event>> {
        let conn = self.pool.get()?;
        MessagesRepo::fetch_since(&conn, entity, cutoff)
    }

    /// Count total persisted messages.
    pub fn message_count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        MessagesRepo::count(&conn)
    }

    // === Keywords ===

    /// Load the persisted sensitive word set.
    pub fn load_keywords(&self) -> Result<BTreeSet<String>> {
        let conn = self.pool.get()?;
        KeywordsRepo::load_all(&conn)
    }

    // === Warnings ===

    /// All warning records, most-warned first.
    pub fn warning_records(&self) -> Result<Vec<WarningRecord>> {
        let conn = self.pool.get()?;
        WarningsRepo::all(&conn)
    }

    /// Reset an entity's warning count.
    pub fn reset_warnings(&self, entity: EntityRef) -> Result<()> {
        let conn = self.pool.get()?;
        WarningsRepo::reset(&conn, entity)
    }

    // === Alerts ===

    /// Most recent persisted alerts, newest first.
    pub fn recent_alerts(&self, limit: i64) -> Result<Vec<StoredAlert>> {
        let conn = self.pool.get()?;
        AlertsRepo::recent(&conn, limit)
    }
}

impl KeywordBackend for Database {
    fn load_all(&self) -> vigil_core::Result<BTreeSet<String>> {
        self.load_keywords().map_err(EngineError::persistence)
    }

    fn persist_add(&self, word: &str) -> vigil_core::Result<()> {
        let conn = self.pool.get().map_err(EngineError::persistence)?;
        KeywordsRepo::insert(&conn, word).map_err(EngineError::persistence)
    }

    fn persist_remove(&self, word: &str) -> vigil_core::Result<()> {
        let conn = self.pool.get().map_err(EngineError::persistence)?;
        KeywordsRepo::delete(&conn, word).map_err(EngineError::persistence)
    }
}

impl EventHistory for Database {
    fn fetch_since(
        &self,
        entity: EntityRef,
        cutoff: DateTime<Utc>,
    ) -> vigil_core::Result<Vec<Event>> {
        self.messages_since(entity, cutoff)
            .map_err(EngineError::persistence)
    }
}

impl WarningLedger for Database {
    fn warning_count(&self, entity: EntityRef) -> vigil_core::Result<u64> {
        let conn = self.pool.get().map_err(EngineError::persistence)?;
        WarningsRepo::count(&conn, entity).map_err(EngineError::persistence)
    }

    fn record_warning(&self, entity: EntityRef) -> vigil_core::Result<u64> {
        let conn = self.pool.get().map_err(EngineError::persistence)?;
        WarningsRepo::increment(&conn, entity, Utc::now()).map_err(EngineError::persistence)
    }
}

impl AlertSink for Database {
    fn publish(&self, alert: &Alert) -> vigil_core::Result<()> {
        let conn = self.pool.get().map_err(EngineError::persistence)?;
        AlertsRepo::insert(&conn, alert)
            .map(|_| ())
            .map_err(EngineError::persistence)
    }
}
