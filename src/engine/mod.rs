//! Risk Engine - validation, rolling history, trend analysis, and scoring
//!
//! ## Data flow
//!
//! ```text
//! RawSample ──► validator ──► HistoryStore (per-asset ring buffer)
//!                                  │
//!                                  ▼ window(trend_window)
//!                          trend ──► scorer ──► classifier ──► RiskScore
//!                                                    │
//!                          all assets (rayon) ───────┴──► FleetRanking
//! ```
//!
//! Everything here is synchronous and in-memory. The only shared mutable
//! state is the history store and the hot-swappable scoring policy.

pub mod anomaly;
pub mod classifier;
pub mod history;
pub mod scorer;
pub mod stats;
pub mod trend;
pub mod validator;

pub use anomaly::AnomalyKind;
pub use history::{AssetHistory, HistorySnapshot, HistoryStore, RingBuffer};
pub use stats::{EngineStats, InjectionCounts, RejectionCounts};
pub use validator::ValidationError;

use arc_swap::ArcSwap;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig, Envelope, ScoringPolicy};
use crate::types::{FleetRanking, PerSignal, RawSample, RiskScore, Sample, TrendSummary};
use stats::StatsCounters;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sample rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("insufficient data for asset '{0}'")]
    NoData(String),

    #[error("asset '{0}' not found")]
    NotFound(String),
}

// ============================================================================
// Query Results
// ============================================================================

/// Everything known about one asset right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSnapshot {
    pub asset_id: String,
    pub latest: Sample,
    pub risk: RiskScore,
    pub trend: TrendSummary,
    /// Samples currently retained
    pub history_len: usize,
    /// Samples accepted since the asset was first seen
    pub total_accepted: u64,
}

// ============================================================================
// Engine
// ============================================================================

pub struct RiskEngine {
    history: HistoryStore,
    envelopes: PerSignal<Envelope>,
    policy: ArcSwap<ScoringPolicy>,
    trend_window: usize,
    default_query_limit: usize,
    stats: StatsCounters,
}

impl RiskEngine {
    /// Build an engine from an already-validated config.
    pub fn new(config: EngineConfig) -> Self {
        info!(
            capacity = config.history.capacity,
            trend_window = config.history.trend_window,
            "Risk engine initialized"
        );
        Self {
            history: HistoryStore::new(config.history.capacity),
            envelopes: config.envelope,
            policy: ArcSwap::from_pointee(config.policy),
            trend_window: config.history.trend_window,
            default_query_limit: config.history.default_query_limit,
            stats: StatsCounters::default(),
        }
    }

    /// Validate one raw sample and append it to its asset's history.
    pub fn ingest(&self, raw: &RawSample) -> Result<Sample, EngineError> {
        let result = self.history.validate_and_append(raw, &self.envelopes);
        self.record_outcome(raw.asset_id().unwrap_or("<unknown>"), result)
    }

    fn record_outcome(
        &self,
        asset_id: &str,
        result: Result<Sample, ValidationError>,
    ) -> Result<Sample, EngineError> {
        match result {
            Ok(sample) => {
                self.stats.record_accepted();
                debug!(asset = %sample.asset_id, ts = %sample.timestamp, "Sample accepted");
                Ok(sample)
            }
            Err(e) => {
                self.stats.record_rejected(&e);
                warn!(
                    asset = asset_id,
                    field = %e.field(),
                    rule = e.rule(),
                    error = %e,
                    "Sample rejected"
                );
                Err(EngineError::Rejected(e))
            }
        }
    }

    /// Synthesize a faulty sample from the asset's latest reading and ingest it.
    ///
    /// The baseline read and the append happen under the asset's lock, so a
    /// concurrent ingest cannot slip in between.
    pub fn inject_anomaly(&self, asset_id: &str, kind: AnomalyKind) -> Result<Sample, EngineError> {
        let result = self
            .history
            .derive_and_append(asset_id, &self.envelopes, |baseline| kind.apply(baseline))
            .ok_or_else(|| EngineError::NotFound(asset_id.to_string()))?;

        let sample = self.record_outcome(asset_id, result)?;
        self.stats.record_injected(kind);
        info!(asset = %asset_id, anomaly = %kind, "Anomaly injected");
        Ok(sample)
    }

    /// Current risk score over the trend window.
    pub fn score(&self, asset_id: &str) -> Result<RiskScore, EngineError> {
        let window = self.history.window(asset_id, self.trend_window);
        scorer::score_window(asset_id, &window, &self.policy.load())
    }

    /// Latest sample, risk, and trend for one asset.
    ///
    /// Window and counters come from one lock acquisition, so they always
    /// describe the same history state.
    pub fn query_asset(&self, asset_id: &str) -> Result<AssetSnapshot, EngineError> {
        let snapshot = self
            .history
            .snapshot(asset_id, self.trend_window)
            .ok_or_else(|| EngineError::NotFound(asset_id.to_string()))?;
        let latest = snapshot
            .window
            .last()
            .cloned()
            .ok_or_else(|| EngineError::NotFound(asset_id.to_string()))?;

        let policy = self.policy.load_full();
        let risk = scorer::score_window(asset_id, &snapshot.window, &policy)?;
        let trend = trend::analyze(&snapshot.window, &policy.signals);

        Ok(AssetSnapshot {
            asset_id: asset_id.to_string(),
            latest,
            risk,
            trend,
            history_len: snapshot.len,
            total_accepted: snapshot.total_accepted,
        })
    }

    /// Score every asset in parallel and rank them.
    ///
    /// All assets are scored against the same policy snapshot.
    pub fn query_fleet(&self) -> FleetRanking {
        let policy = self.policy.load_full();
        let scores: Vec<RiskScore> = self
            .history
            .asset_ids()
            .par_iter()
            .filter_map(|id| {
                let window = self.history.window(id, self.trend_window);
                scorer::score_window(id, &window, &policy).ok()
            })
            .collect();
        classifier::rank(scores)
    }

    /// The most recent `limit` samples (default from config), oldest first.
    pub fn window(&self, asset_id: &str, limit: Option<usize>) -> Result<Vec<Sample>, EngineError> {
        if !self.history.contains(asset_id) {
            return Err(EngineError::NotFound(asset_id.to_string()));
        }
        Ok(self
            .history
            .window(asset_id, limit.unwrap_or(self.default_query_limit)))
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot(self.history.asset_count())
    }

    /// Active scoring policy.
    pub fn policy(&self) -> Arc<ScoringPolicy> {
        self.policy.load_full()
    }

    /// Replace the scoring policy. Scoring passes already running keep the
    /// policy they loaded.
    pub fn replace_policy(&self, policy: ScoringPolicy) -> Result<(), ConfigError> {
        policy.check().map_err(ConfigError::Validation)?;
        info!(
            medium = policy.bands.medium,
            high = policy.bands.high,
            "Scoring policy replaced"
        );
        self.policy.store(Arc::new(policy));
        Ok(())
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn trend_window(&self) -> usize {
        self.trend_window
    }
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("assets", &self.history.asset_count())
            .field("capacity", &self.history.capacity())
            .field("trend_window", &self.trend_window)
            .finish_non_exhaustive()
    }
}
