//! Storage row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::{AlertKind, AlertSeverity, EntityKind};

/// A persisted alert row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAlert {
    /// Row id.
    pub id: i64,
    /// What rule fired.
    pub kind: AlertKind,
    /// Kind of entity the alert targets.
    pub entity_kind: EntityKind,
    /// Id of the targeted entity.
    pub entity_id: i64,
    /// Alert severity.
    pub severity: AlertSeverity,
    /// Human-readable description.
    pub message: String,
    /// When the alert was evaluated.
    pub created_at: DateTime<Utc>,
}

/// A persisted warning counter row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningRecord {
    /// Kind of entity being warned.
    pub entity_kind: EntityKind,
    /// Id of the warned entity.
    pub entity_id: i64,
    /// Accumulated warning count.
    pub count: u64,
    /// When the count last changed.
    pub updated_at: DateTime<Utc>,
}
