//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::alert::AlertThresholds;
use crate::keywords::MatchPolicy;

/// Tunable parameters for the analytics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Case handling for sensitive-content matching.
    pub match_policy: MatchPolicy,
    /// Most recent messages sampled for risk classification.
    pub risk_sample_size: usize,
    /// Thresholds for the alert rules.
    pub thresholds: AlertThresholds,
    /// Seconds to suppress a repeat of the same (entity, alert kind).
    pub alert_cooldown_secs: i64,
    /// Reporting timezone for daily buckets, seconds east of UTC.
    pub utc_offset_secs: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::CaseSensitive,
            risk_sample_size: 100,
            thresholds: AlertThresholds::default(),
            alert_cooldown_secs: 3600,
            utc_offset_secs: 0,
        }
    }
}
