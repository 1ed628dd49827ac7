//! Threshold-triggered alerting.
//!
//! Two independent rules: low group activity over the last 24 hours, and
//! accumulated behavioral warnings on an entity. Each check is stateless
//! and idempotent per call; the engine layers a cooldown on top so an
//! unchanged condition does not re-publish on every event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::EntityRef;
use crate::window::WindowStats;

/// Kind of emitted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A group's 24h message count fell below the activity threshold.
    LowActivity,
    /// An entity's accumulated warning count crossed the risk threshold.
    BehavioralRisk,
}

impl AlertKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowActivity => "low_activity",
            AlertKind::BehavioralRisk => "behavioral_risk",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low_activity" => Some(AlertKind::LowActivity),
            "behavioral_risk" => Some(AlertKind::BehavioralRisk),
            _ => None,
        }
    }
}

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Needs attention.
    Warning,
    /// Needs action.
    Critical,
}

impl AlertSeverity {
    /// Returns the severity name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }

    /// Parses a severity from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(AlertSeverity::Info),
            "warning" => Some(AlertSeverity::Warning),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

/// An emitted notification describing a threshold breach.
///
/// Ownership passes to the notification boundary; the engine does not track
/// resolution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// What rule fired.
    pub kind: AlertKind,
    /// The entity the alert is about.
    pub entity: EntityRef,
    /// How urgent it is.
    pub severity: AlertSeverity,
    /// Human-readable description.
    pub message: String,
    /// When the alert was evaluated.
    pub timestamp: DateTime<Utc>,
}

/// Fire-and-forget delivery to a notification channel.
///
/// Publish failures are logged by the engine, never retried, and never
/// block event ingestion.
pub trait AlertSink: Send + Sync {
    /// Delivers one alert.
    fn publish(&self, alert: &Alert) -> Result<()>;
}

/// Static thresholds for the two alert rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// A 24h group message count below this fires low-activity.
    pub low_activity_messages: u64,
    /// A warning count above this fires behavioral-risk.
    pub warning_count: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_activity_messages: 10,
            warning_count: 3,
        }
    }
}

/// Applies static thresholds to aggregator and bookkeeping outputs.
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    /// Creates an evaluator with the given thresholds.
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    /// Checks a group's 24h activity. `stats` is the group's 24h window,
    /// `None` meaning no events at all (which counts as zero activity).
    pub fn check_activity(
        &self,
        group: EntityRef,
        stats: Option<&WindowStats>,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let (messages, active_users) = match stats {
            Some(stats) => (stats.total_messages, stats.distinct_counterparts()),
            None => (0, 0),
        };
        if messages >= self.thresholds.low_activity_messages {
            return None;
        }

        Some(Alert {
            kind: AlertKind::LowActivity,
            entity: group,
            severity: AlertSeverity::Warning,
            message: format!(
                "Low group activity: {messages} messages from {active_users} active users in the last 24h"
            ),
            timestamp: now,
        })
    }

    /// Checks an entity's accumulated warning count. Accumulation happens
    /// elsewhere; this only reads the current value.
    pub fn check_behavior(
        &self,
        entity: EntityRef,
        warning_count: u64,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if warning_count <= self.thresholds.warning_count {
            return None;
        }

        Some(Alert {
            kind: AlertKind::BehavioralRisk,
            entity,
            severity: AlertSeverity::Critical,
            message: format!("Abnormal behavior for {entity}: {warning_count} warnings"),
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::{BTreeMap, BTreeSet};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn stats(messages: u64, users: u64) -> WindowStats {
        WindowStats {
            total_messages: messages,
            by_kind: BTreeMap::new(),
            active_counterparts: (1..=users as i64).collect::<BTreeSet<_>>(),
            daily: BTreeMap::new(),
            last_active: now(),
        }
    }

    #[test]
    fn quiet_group_fires_low_activity() {
        let evaluator = AlertEvaluator::default();
        let stats = stats(8, 5);

        let alert = evaluator
            .check_activity(EntityRef::group(100), Some(&stats), now())
            .unwrap();
        assert_eq!(alert.kind, AlertKind::LowActivity);
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert!(alert.message.contains("8 messages"));
        assert!(alert.message.contains("5 active users"));
    }

    #[test]
    fn active_group_stays_silent() {
        let evaluator = AlertEvaluator::default();
        let stats = stats(10, 4);
        assert!(evaluator
            .check_activity(EntityRef::group(100), Some(&stats), now())
            .is_none());
    }

    #[test]
    fn silent_group_counts_as_zero_activity() {
        let evaluator = AlertEvaluator::default();
        let alert = evaluator
            .check_activity(EntityRef::group(100), None, now())
            .unwrap();
        assert!(alert.message.contains("0 messages"));
    }

    #[test]
    fn behavior_alert_fires_strictly_above_threshold() {
        let evaluator = AlertEvaluator::default();
        let user = EntityRef::user(7);

        assert!(evaluator.check_behavior(user, 3, now()).is_none());
        let alert = evaluator.check_behavior(user, 4, now()).unwrap();
        assert_eq!(alert.kind, AlertKind::BehavioralRisk);
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert!(alert.message.contains("4 warnings"));
    }

    #[test]
    fn evaluation_is_idempotent_per_call() {
        let evaluator = AlertEvaluator::default();
        let stats = stats(2, 1);
        let a = evaluator.check_activity(EntityRef::group(1), Some(&stats), now());
        let b = evaluator.check_activity(EntityRef::group(1), Some(&stats), now());
        assert_eq!(a, b);
    }

    #[test]
    fn kind_and_severity_roundtrip() {
        assert_eq!(AlertKind::parse("low_activity"), Some(AlertKind::LowActivity));
        assert_eq!(
            AlertKind::parse(AlertKind::BehavioralRisk.as_str()),
            Some(AlertKind::BehavioralRisk)
        );
        assert_eq!(AlertSeverity::parse("critical"), Some(AlertSeverity::Critical));
        assert_eq!(AlertSeverity::parse("fatal"), None);
    }

    #[test]
    fn alert_serialization() {
        let evaluator = AlertEvaluator::default();
        let alert = evaluator
            .check_activity(EntityRef::group(9), None, now())
            .unwrap();
        let json = serde_json::to_string(&alert).unwrap();
        let back: Alert = serde_json::from_str(&json).unwrap();
        assert_eq!(alert, back);
    }
}
