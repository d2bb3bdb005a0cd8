//! Rolling-window trend output

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Signal;

/// Slope classification against a per-signal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

/// Rolling statistics for one signal over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTrend {
    pub mean: f64,
    /// Least-squares slope, units per sample
    pub slope: f64,
    /// `(latest - mean) / mean`; `None` when the mean is zero
    pub deviation_from_baseline: Option<f64>,
    pub latest: f64,
    pub direction: TrendDirection,
}

/// Trend analyzer result for one asset window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendSummary {
    /// Fewer samples than the analyzer needs. Not an error.
    Insufficient { samples: usize, required: usize },
    Computed {
        samples: usize,
        signals: BTreeMap<Signal, SignalTrend>,
    },
}

impl TrendSummary {
    pub fn signal(&self, signal: Signal) -> Option<&SignalTrend> {
        match self {
            TrendSummary::Insufficient { .. } => None,
            TrendSummary::Computed { signals, .. } => signals.get(&signal),
        }
    }
}
