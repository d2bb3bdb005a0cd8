//! Risk scoring outputs: findings, scores, bands, fleet ranking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::Signal;

// ============================================================================
// Rules and findings
// ============================================================================

/// Which rule a finding violated.
///
/// Variant order is the final tie-break when sorting findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Latest value strictly above the signal's fixed ceiling
    HardThreshold,
    /// Least-squares slope over the window above the rising limit
    RisingTrend,
    /// Latest value deviates from the window mean by more than the limit (fraction)
    BaselineDeviation,
    /// Window mean above the sustained ceiling
    SustainedElevation,
    /// Repeated excursions above a spike level, graded by count and density
    SpikeFrequency,
    /// Latest value past the wear onset, weighted by progress to full wear
    Wear,
}

impl RuleKind {
    pub fn is_hard(self) -> bool {
        matches!(self, RuleKind::HardThreshold)
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::HardThreshold => write!(f, "hard_threshold"),
            RuleKind::RisingTrend => write!(f, "rising_trend"),
            RuleKind::BaselineDeviation => write!(f, "baseline_deviation"),
            RuleKind::SustainedElevation => write!(f, "sustained_elevation"),
            RuleKind::SpikeFrequency => write!(f, "spike_frequency"),
            RuleKind::Wear => write!(f, "wear"),
        }
    }
}

/// One explained cause contributing to an asset's risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub signal: Signal,
    /// Value the rule looked at: the latest reading, the slope, the
    /// fractional deviation, the window mean, or the spike count depending
    /// on `rule`
    pub observed: f64,
    pub rule: RuleKind,
    /// The limit that `observed` crossed
    pub limit: f64,
    /// Points contributed to the score
    pub weight: f64,
    pub message: String,
}

impl AnomalyFinding {
    /// Ordering used for the finding list: heaviest first, then signal name,
    /// then rule kind.
    pub fn severity_order(a: &Self, b: &Self) -> Ordering {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.signal.as_str().cmp(b.signal.as_str()))
            .then_with(|| a.rule.cmp(&b.rule))
    }
}

// ============================================================================
// Bands
// ============================================================================

/// Categorical risk classification. Ordered Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBand::Low => write!(f, "Low"),
            RiskBand::Medium => write!(f, "Medium"),
            RiskBand::High => write!(f, "High"),
        }
    }
}

// ============================================================================
// Scores and ranking
// ============================================================================

/// Per-asset risk evaluation, recomputed from the current window on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub asset_id: String,
    pub score: f64,
    pub band: RiskBand,
    /// Most severe first; the head is the primary cited cause
    pub findings: Vec<AnomalyFinding>,
    /// Samples in the window the score was computed over
    pub window_len: usize,
    /// Timestamp of the latest scored sample
    pub as_of: DateTime<Utc>,
}

impl RiskScore {
    pub fn primary_cause(&self) -> Option<&AnomalyFinding> {
        self.findings.first()
    }
}

/// One row of the fleet priority list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAsset {
    /// 1-based position in the ranking
    pub rank: usize,
    pub asset_id: String,
    pub risk: RiskScore,
}

/// Number of assets per band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl BandCounts {
    pub fn record(&mut self, band: RiskBand) {
        match band {
            RiskBand::Low => self.low += 1,
            RiskBand::Medium => self.medium += 1,
            RiskBand::High => self.high += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// Fleet-wide maintenance priority list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetRanking {
    /// Score descending, asset id ascending on ties
    pub entries: Vec<RankedAsset>,
    pub counts: BandCounts,
}

impl FleetRanking {
    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.asset_id.as_str())
    }
}
