//! Connected Ops: Fleet Telemetry Risk Engine
//!
//! Validates streaming vehicle telemetry, keeps a bounded rolling history per
//! asset, and turns it into explainable maintenance risk scores.
//!
//! ## Architecture
//!
//! - **Validator**: shape, physical envelope, and ordering checks per sample
//! - **History Store**: fixed-capacity ring buffer per asset, sharded map
//! - **Trend Analyzer**: rolling mean, least-squares slope, baseline deviation
//! - **Risk Scorer**: hard ceilings plus trend rules, weighted and explained
//! - **Classifier**: Low / Medium / High bands and the fleet priority list
//! - **Emulator**: synthetic cruise telemetry with random fault episodes
//! - **API**: Axum JSON endpoints over the engine

pub mod api;
pub mod config;
pub mod emulator;
pub mod engine;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, EngineConfig, ScoringPolicy};

// Re-export the engine surface
pub use engine::{
    AnomalyKind, AssetSnapshot, EngineError, EngineStats, HistoryStore, RiskEngine,
    ValidationError,
};

// Re-export commonly used types
pub use types::{
    AnomalyFinding, BandCounts, FleetRanking, RawSample, RiskBand, RiskScore, RuleKind, Sample,
    Signal, TrendSummary,
};

pub use emulator::TelemetryEmulator;
