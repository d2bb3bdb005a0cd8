//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Every value here can be
//! overridden from `connected_ops.toml` unless noted otherwise.

// ============================================================================
// Config loading
// ============================================================================

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "CONNECTED_OPS_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "connected_ops.toml";

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8000";

// ============================================================================
// History
// ============================================================================

/// Samples retained per asset.
///
/// 120 samples at 1 Hz = 2 minutes of recent context.
pub const HISTORY_CAPACITY: usize = 120;

/// Upper bound accepted for `history.capacity`.
pub const MAX_HISTORY_CAPACITY: usize = 10_000;

/// Samples the trend analyzer reads from the tail of the history.
pub const TREND_WINDOW: usize = 30;

/// Minimum window length that yields a trend. Not configurable.
pub const MIN_TREND_SAMPLES: usize = 3;

/// Default `limit` for the sample window query.
pub const QUERY_LIMIT: usize = 600;

// ============================================================================
// Scoring
// ============================================================================

/// Score at or above which an asset is Medium risk.
pub const BAND_MEDIUM: f64 = 3.0;

/// Score at or above which an asset is High risk.
pub const BAND_HIGH: f64 = 6.0;

/// Points per hard-threshold breach.
pub const HARD_WEIGHT: f64 = 3.0;

/// Default density period for spike-frequency rules (seconds).
pub const SPIKE_PERIOD_SECS: f64 = 30.0;

/// Spikes per period needed for a Medium spike-frequency finding.
pub const SPIKE_MEDIUM_DENSITY: f64 = 1.0;

/// Spikes per period needed for a High spike-frequency finding.
pub const SPIKE_HIGH_DENSITY: f64 = 2.0;

// ============================================================================
// Emulator
// ============================================================================

/// Per-step probability that a fault episode starts.
pub const EMULATOR_FAULT_PROBABILITY: f64 = 0.02;

/// Shortest fault episode (steps).
pub const EMULATOR_FAULT_MIN_STEPS: u32 = 45;

/// Longest fault episode (steps).
pub const EMULATOR_FAULT_MAX_STEPS: u32 = 120;

/// Simulated seconds per emulator step (drives engine-hour accumulation).
pub const EMULATOR_STEP_SECONDS: f64 = 1.0;

/// Wall-clock delay between emulator steps (ms).
pub const EMULATOR_INTERVAL_MS: u64 = 1_000;
