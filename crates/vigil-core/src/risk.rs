//! Risk classification from sensitive-content ratios.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::window::RiskSample;

/// Discrete risk level derived from an entity's sensitive-hit ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No sensitive content in the sample.
    #[default]
    Normal,
    /// Ratio in (0, 0.2].
    Low,
    /// Ratio in (0.2, 0.5].
    Medium,
    /// Ratio above 0.5.
    High,
}

impl RiskLevel {
    /// Classifies a sensitive-hit ratio.
    ///
    /// Boundaries are inclusive on the lower side of each band: exactly 0.2
    /// is `Low`, exactly 0.5 is `Medium`.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.5 {
            RiskLevel::High
        } else if ratio > 0.2 {
            RiskLevel::Medium
        } else if ratio > 0.0 {
            RiskLevel::Low
        } else {
            RiskLevel::Normal
        }
    }

    /// Returns the level name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "normal",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Parses a level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(RiskLevel::Normal),
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Derived assessment over an entity's recent message sample.
///
/// Recomputed on demand; not an independent source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Messages sampled (most recent, capped).
    pub sampled: u64,
    /// Sampled messages that contained sensitive keywords.
    pub flagged: u64,
    /// `flagged / sampled`, zero when nothing was sampled.
    pub ratio: f64,
    /// Discrete classification of the ratio.
    pub level: RiskLevel,
}

impl RiskAssessment {
    /// Builds an assessment from a window sample.
    ///
    /// `flagged > sampled` indicates a bug upstream and is surfaced as
    /// [`EngineError::Invariant`].
    pub fn from_sample(sample: RiskSample) -> Result<Self> {
        if sample.flagged > sample.sampled {
            return Err(EngineError::Invariant(format!(
                "flagged count {} exceeds sampled count {}",
                sample.flagged, sample.sampled
            )));
        }

        let ratio = if sample.sampled == 0 {
            0.0
        } else {
            sample.flagged as f64 / sample.sampled as f64
        };

        Ok(Self {
            sampled: sample.sampled,
            flagged: sample.flagged,
            ratio,
            level: RiskLevel::from_ratio(ratio),
        })
    }
}
