//! Engine Configuration - envelopes, scoring policy, and history sizing as TOML values
//!
//! Each struct implements `Default` with the calibrated demo values, so the
//! engine behaves identically with or without a config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::{PerSignal, Signal};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one engine process.
///
/// Load with [`EngineConfig::load`], which searches:
/// 1. an explicit path (CLI `--config`)
/// 2. `$CONNECTED_OPS_CONFIG`
/// 3. `./connected_ops.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rolling history sizing
    #[serde(default)]
    pub history: HistoryConfig,

    /// Physical envelope per signal (validator stage 2)
    #[serde(default)]
    pub envelope: PerSignal<Envelope>,

    /// Weighted rule table for the risk scorer
    #[serde(default)]
    pub policy: ScoringPolicy,

    /// Synthetic telemetry generator tuning
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path must load cleanly. The env var and the local file
    /// fall back to the next source with a warning, as an unreadable
    /// optional file should not keep the service down.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded engine config from --config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from {}", defaults::CONFIG_ENV_VAR);
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from env, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./{}", defaults::CONFIG_FILE_NAME);
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::CONFIG_FILE_NAME);
                }
            }
        }

        info!("No {} found, using built-in defaults", defaults::CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Two-pass: unknown keys are reported as warnings first, then the
    /// document is deserialized and validated.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate sizing, envelopes, and the scoring policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let h = &self.history;
        if h.capacity < defaults::MIN_TREND_SAMPLES || h.capacity > defaults::MAX_HISTORY_CAPACITY {
            errors.push(format!(
                "history.capacity ({}) must be within {}..={}",
                h.capacity,
                defaults::MIN_TREND_SAMPLES,
                defaults::MAX_HISTORY_CAPACITY
            ));
        }
        if h.trend_window < defaults::MIN_TREND_SAMPLES {
            errors.push(format!(
                "history.trend_window ({}) must be >= {}",
                h.trend_window,
                defaults::MIN_TREND_SAMPLES
            ));
        }
        if h.trend_window > h.capacity {
            errors.push(format!(
                "history.trend_window ({}) must not exceed history.capacity ({})",
                h.trend_window, h.capacity
            ));
        }
        if h.default_query_limit == 0 {
            errors.push("history.default_query_limit must be > 0".to_string());
        }

        for (signal, env) in self.envelope.iter() {
            if !env.min.is_finite() || !env.max.is_finite() {
                errors.push(format!(
                    "envelope.{signal}: bounds must be finite (got min={}, max={})",
                    env.min, env.max
                ));
            } else if env.min >= env.max {
                errors.push(format!(
                    "envelope.{signal}: min ({:.3}) must be < max ({:.3})",
                    env.min, env.max
                ));
            }
        }

        if let Err(policy_errors) = self.policy.check() {
            errors.extend(policy_errors);
        }

        let e = &self.emulator;
        if !(0.0..=1.0).contains(&e.fault_probability) {
            errors.push(format!(
                "emulator.fault_probability ({}) must be within 0..=1",
                e.fault_probability
            ));
        }
        if e.fault_min_steps == 0 || e.fault_min_steps > e.fault_max_steps {
            errors.push(format!(
                "emulator.fault_min_steps ({}) must be > 0 and <= fault_max_steps ({})",
                e.fault_min_steps, e.fault_max_steps
            ));
        }
        if !(e.step_seconds.is_finite() && e.step_seconds > 0.0) {
            errors.push("emulator.step_seconds must be > 0".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {err}", path = .0.display(), err = .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({path}): {err}", path = .0.display(), err = .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Ring-buffer capacity per asset (samples)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Tail length handed to the trend analyzer (samples)
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// `limit` used by the sample window query when none is given
    #[serde(default = "default_query_limit")]
    pub default_query_limit: usize,
}

fn default_capacity() -> usize { defaults::HISTORY_CAPACITY }
fn default_trend_window() -> usize { defaults::TREND_WINDOW }
fn default_query_limit() -> usize { defaults::QUERY_LIMIT }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            trend_window: default_trend_window(),
            default_query_limit: default_query_limit(),
        }
    }
}

// ============================================================================
// Physical Envelope
// ============================================================================

/// Inclusive absolute range a signal must fall within to be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min: f64,
    pub max: f64,
}

impl Envelope {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for PerSignal<Envelope> {
    fn default() -> Self {
        Self {
            coolant_temp_f: Envelope::new(-40.0, 300.0),
            intake_air_temp_f: Envelope::new(-40.0, 300.0),
            engine_rpm: Envelope::new(0.0, 10_000.0),
            speed_mph: Envelope::new(0.0, 200.0),
            vibration_score: Envelope::new(0.0, 20.0),
            engine_hours: Envelope::new(0.0, 1_000_000.0),
        }
    }
}

// ============================================================================
// Scoring Policy
// ============================================================================

/// Weighted rule table read by the risk scorer.
///
/// The numeric weights are demo calibration, not structure: tune them here
/// rather than in code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    #[serde(default)]
    pub bands: BandThresholds,

    #[serde(default)]
    pub signals: PerSignal<SignalRule>,
}

impl ScoringPolicy {
    pub fn rule(&self, signal: Signal) -> &SignalRule {
        self.signals.get(signal)
    }

    /// Internal consistency check. Also used by the policy replace endpoint.
    pub fn check(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let b = &self.bands;
        if !b.medium.is_finite() || !b.high.is_finite() {
            errors.push(format!(
                "policy.bands: values must be finite (got medium={}, high={})",
                b.medium, b.high
            ));
        } else if b.medium <= 0.0 || b.high <= b.medium {
            errors.push(format!(
                "policy.bands: require 0 < medium ({:.2}) < high ({:.2})",
                b.medium, b.high
            ));
        }

        for (signal, rule) in self.signals.iter() {
            let name = format!("policy.signals.{signal}");
            for (field, weight) in [
                ("hard_weight", rule.hard_weight),
                ("trend_weight", rule.trend_weight),
                ("sustained_weight", rule.sustained_weight),
            ] {
                if !weight.is_finite() || weight < 0.0 {
                    errors.push(format!("{name}.{field} must be a finite value >= 0 (got {weight})"));
                }
            }
            for (field, limit) in [
                ("ceiling", rule.ceiling),
                ("sustained_mean_ceiling", rule.sustained_mean_ceiling),
            ] {
                if let Some(v) = limit {
                    if !v.is_finite() {
                        errors.push(format!("{name}.{field} must be finite (got {v})"));
                    }
                }
            }
            for (field, limit) in [
                ("rising_slope", rule.rising_slope),
                ("deviation_pct", rule.deviation_pct),
            ] {
                if let Some(v) = limit {
                    if !v.is_finite() || v <= 0.0 {
                        errors.push(format!("{name}.{field} must be a finite value > 0 (got {v})"));
                    }
                }
            }
            if let Some(spike) = &rule.spike {
                spike.check(&name, &mut errors);
            }
            if let Some(wear) = &rule.wear {
                wear.check(&name, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl SpikeRule {
    fn check(&self, name: &str, errors: &mut Vec<String>) {
        if !self.level.is_finite() {
            errors.push(format!("{name}.spike.level must be finite (got {})", self.level));
        }
        if !self.period_secs.is_finite() || self.period_secs <= 0.0 {
            errors.push(format!("{name}.spike.period_secs must be > 0 (got {})", self.period_secs));
        }
        if self.medium_count == 0 || self.high_count < self.medium_count {
            errors.push(format!(
                "{name}.spike: require 0 < medium_count ({}) <= high_count ({})",
                self.medium_count, self.high_count
            ));
        }
        if !(self.medium_density >= 0.0 && self.high_density >= self.medium_density) {
            errors.push(format!(
                "{name}.spike: require 0 <= medium_density ({}) <= high_density ({})",
                self.medium_density, self.high_density
            ));
        }
        for (field, weight) in [
            ("low_weight", self.low_weight),
            ("medium_weight", self.medium_weight),
            ("high_weight", self.high_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                errors.push(format!("{name}.spike.{field} must be a finite value >= 0 (got {weight})"));
            }
        }
    }
}

impl WearRule {
    fn check(&self, name: &str, errors: &mut Vec<String>) {
        if !(self.onset.is_finite() && self.full.is_finite() && self.onset < self.full) {
            errors.push(format!(
                "{name}.wear: require finite onset ({}) < full ({})",
                self.onset, self.full
            ));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            errors.push(format!("{name}.wear.weight must be a finite value >= 0 (got {})", self.weight));
        }
    }
}

/// Lower bounds (inclusive) of the Medium and High bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    #[serde(default = "default_band_medium")]
    pub medium: f64,
    #[serde(default = "default_band_high")]
    pub high: f64,
}

fn default_band_medium() -> f64 { defaults::BAND_MEDIUM }
fn default_band_high() -> f64 { defaults::BAND_HIGH }

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            medium: default_band_medium(),
            high: default_band_high(),
        }
    }
}

/// Scoring rules for one signal. `None` disables the corresponding rule.
///
/// A `[policy.signals.<name>]` table replaces the built-in rule for that
/// signal as a whole; fields left out of the table are disabled, not
/// inherited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalRule {
    /// Hard ceiling; a latest value strictly above it is a breach
    pub ceiling: Option<f64>,
    /// Points per hard breach
    pub hard_weight: f64,
    /// Slope (units per sample) above which a rising trend is flagged
    pub rising_slope: Option<f64>,
    /// |deviation from window mean| (fraction) above which the latest value is flagged
    pub deviation_pct: Option<f64>,
    /// Points for a rising-trend or deviation finding
    pub trend_weight: f64,
    /// Window mean above which the signal is considered persistently elevated
    pub sustained_mean_ceiling: Option<f64>,
    /// Points for a sustained-elevation finding
    pub sustained_weight: f64,
    /// Repeated excursions above a spike level within the window
    pub spike: Option<SpikeRule>,
    /// Accumulated wear, scaled between an onset and a full-wear value
    pub wear: Option<WearRule>,
}

/// Spike-frequency rule: samples at or above `level` are spikes, and the
/// finding's weight grows with how many there are and how tightly they
/// cluster.
///
/// Density is spikes per `period_secs` over the span from the first to the
/// last spike (a span shorter than one period counts as one period).
/// `High` needs `high_count` spikes at `high_density`, `Medium` needs
/// `medium_count` at `medium_density`, and any spike is at least `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeRule {
    pub level: f64,
    #[serde(default = "default_spike_period")]
    pub period_secs: f64,
    pub medium_count: u32,
    pub high_count: u32,
    #[serde(default = "default_medium_density")]
    pub medium_density: f64,
    #[serde(default = "default_high_density")]
    pub high_density: f64,
    pub low_weight: f64,
    pub medium_weight: f64,
    pub high_weight: f64,
}

fn default_spike_period() -> f64 { defaults::SPIKE_PERIOD_SECS }
fn default_medium_density() -> f64 { defaults::SPIKE_MEDIUM_DENSITY }
fn default_high_density() -> f64 { defaults::SPIKE_HIGH_DENSITY }

/// Wear rule: contributes `weight * (value - onset) / (full - onset)`,
/// clamped to `[0, weight]`, once the latest value passes `onset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WearRule {
    pub onset: f64,
    pub full: f64,
    pub weight: f64,
}

impl Default for SignalRule {
    fn default() -> Self {
        Self {
            ceiling: None,
            hard_weight: defaults::HARD_WEIGHT,
            rising_slope: None,
            deviation_pct: None,
            trend_weight: 1.0,
            sustained_mean_ceiling: None,
            sustained_weight: 1.0,
            spike: None,
            wear: None,
        }
    }
}

impl SignalRule {
    fn hard(ceiling: f64) -> Self {
        Self {
            ceiling: Some(ceiling),
            ..Self::default()
        }
    }
}

impl Default for PerSignal<SignalRule> {
    fn default() -> Self {
        Self {
            coolant_temp_f: SignalRule {
                rising_slope: Some(0.5),
                deviation_pct: Some(0.10),
                trend_weight: 2.0,
                sustained_mean_ceiling: Some(210.0),
                sustained_weight: 2.0,
                spike: Some(SpikeRule {
                    level: 230.0,
                    period_secs: 30.0,
                    medium_count: 2,
                    high_count: 4,
                    medium_density: defaults::SPIKE_MEDIUM_DENSITY,
                    high_density: defaults::SPIKE_HIGH_DENSITY,
                    low_weight: 1.0,
                    medium_weight: 2.0,
                    high_weight: 3.0,
                }),
                ..SignalRule::hard(240.0)
            },
            intake_air_temp_f: SignalRule {
                rising_slope: Some(0.5),
                deviation_pct: Some(0.25),
                sustained_mean_ceiling: Some(90.0),
                ..SignalRule::hard(180.0)
            },
            engine_rpm: SignalRule {
                deviation_pct: Some(0.35),
                ..SignalRule::hard(6_500.0)
            },
            speed_mph: SignalRule::hard(80.0),
            vibration_score: SignalRule {
                rising_slope: Some(0.05),
                deviation_pct: Some(0.75),
                spike: Some(SpikeRule {
                    level: 2.8,
                    period_secs: 60.0,
                    medium_count: 3,
                    high_count: 5,
                    medium_density: defaults::SPIKE_MEDIUM_DENSITY,
                    high_density: defaults::SPIKE_HIGH_DENSITY,
                    low_weight: 0.5,
                    medium_weight: 1.0,
                    high_weight: 2.0,
                }),
                ..SignalRule::hard(1.5)
            },
            engine_hours: SignalRule {
                wear: Some(WearRule {
                    onset: 1_000.0,
                    full: 2_000.0,
                    weight: 1.0,
                }),
                ..SignalRule::default()
            },
        }
    }
}

// ============================================================================
// Emulator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Per-step probability of starting a fault episode
    #[serde(default = "default_fault_probability")]
    pub fault_probability: f64,
    #[serde(default = "default_fault_min_steps")]
    pub fault_min_steps: u32,
    #[serde(default = "default_fault_max_steps")]
    pub fault_max_steps: u32,
    /// Simulated seconds per step
    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,
}

fn default_fault_probability() -> f64 { defaults::EMULATOR_FAULT_PROBABILITY }
fn default_fault_min_steps() -> u32 { defaults::EMULATOR_FAULT_MIN_STEPS }
fn default_fault_max_steps() -> u32 { defaults::EMULATOR_FAULT_MAX_STEPS }
fn default_step_seconds() -> f64 { defaults::EMULATOR_STEP_SECONDS }

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            fault_probability: default_fault_probability(),
            fault_min_steps: default_fault_min_steps(),
            fault_max_steps: default_fault_max_steps(),
            step_seconds: default_step_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_policy_matches_demo_calibration() {
        let p = ScoringPolicy::default();
        assert_eq!(p.rule(Signal::CoolantTempF).ceiling, Some(240.0));
        assert_eq!(p.rule(Signal::IntakeAirTempF).ceiling, Some(180.0));
        assert_eq!(p.rule(Signal::VibrationScore).ceiling, Some(1.5));
        assert_eq!(p.rule(Signal::CoolantTempF).hard_weight, 3.0);
        assert!(p.rule(Signal::EngineHours).ceiling.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [history]
            capacity = 50

            [envelope.coolant_temp_f]
            min = -20.0
            max = 280.0
            "#,
        )
        .unwrap();
        assert_eq!(config.history.capacity, 50);
        assert_eq!(config.history.trend_window, defaults::TREND_WINDOW);
        assert_eq!(config.envelope.coolant_temp_f, Envelope::new(-20.0, 280.0));
        assert_eq!(config.envelope.engine_rpm, Envelope::new(0.0, 10_000.0));
    }

    #[test]
    fn test_trend_window_larger_than_capacity_rejected() {
        let mut config = EngineConfig::default();
        config.history.capacity = 10;
        config.history.trend_window = 20;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("trend_window")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_inverted_bands_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.bands = BandThresholds { medium: 6.0, high: 3.0 };
        assert!(policy.check().is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.signals.coolant_temp_f.hard_weight = -1.0;
        let errors = policy.check().unwrap_err();
        assert!(errors[0].contains("coolant_temp_f.hard_weight"));
    }

    #[test]
    fn test_bad_spike_and_wear_rules_rejected() {
        let mut policy = ScoringPolicy::default();
        if let Some(spike) = policy.signals.coolant_temp_f.spike.as_mut() {
            spike.high_count = 1;
        }
        policy.signals.engine_hours.wear = Some(WearRule {
            onset: 2_000.0,
            full: 1_000.0,
            weight: 1.0,
        });
        let errors = policy.check().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("coolant_temp_f.spike")));
        assert!(errors.iter().any(|e| e.contains("engine_hours.wear")));
    }

    #[test]
    fn test_spike_table_in_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [policy.signals.speed_mph]
            ceiling = 80.0

            [policy.signals.speed_mph.spike]
            level = 78.0
            medium_count = 2
            high_count = 3
            low_weight = 0.5
            medium_weight = 1.0
            high_weight = 1.5
            "#,
        )
        .unwrap();
        let spike = config.policy.signals.speed_mph.spike.unwrap();
        assert_eq!(spike.level, 78.0);
        assert_eq!(spike.period_secs, defaults::SPIKE_PERIOD_SECS);
        assert_eq!(spike.high_density, defaults::SPIKE_HIGH_DENSITY);
    }

    #[test]
    fn test_toml_roundtrip_preserves_policy() {
        let config = EngineConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
