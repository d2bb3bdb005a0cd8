//! Config validation: unknown-key detection with Levenshtein suggestions
//! and cross-field range checks.
//!
//! The raw TOML is first walked as a `toml::Value` tree and every dotted key
//! is compared with the known schema; unknown keys become warnings with a
//! "did you mean?" hint. Serde deserialization runs afterwards, so a typo
//! never breaks an otherwise valid file.

use std::collections::HashSet;

use crate::types::Signal;

/// A non-fatal config warning (typo, rule that can never fire).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

const SERVER_KEYS: &[&str] = &["addr"];
const HISTORY_KEYS: &[&str] = &["capacity", "trend_window", "default_query_limit"];
const ENVELOPE_KEYS: &[&str] = &["min", "max"];
const BAND_KEYS: &[&str] = &["medium", "high"];
const RULE_KEYS: &[&str] = &[
    "ceiling",
    "hard_weight",
    "rising_slope",
    "deviation_pct",
    "trend_weight",
    "sustained_mean_ceiling",
    "sustained_weight",
    "spike",
    "wear",
];
const SPIKE_KEYS: &[&str] = &[
    "level",
    "period_secs",
    "medium_count",
    "high_count",
    "medium_density",
    "high_density",
    "low_weight",
    "medium_weight",
    "high_weight",
];
const WEAR_KEYS: &[&str] = &["onset", "full", "weight"];
const EMULATOR_KEYS: &[&str] = &[
    "fault_probability",
    "fault_min_steps",
    "fault_max_steps",
    "step_seconds",
];

/// Returns the complete set of valid dotted key paths for `EngineConfig`.
///
/// Must track the struct hierarchy in `engine_config.rs`.
pub fn known_config_keys() -> HashSet<String> {
    let mut keys = HashSet::new();

    let mut section = |name: &str, fields: &[&str]| {
        keys.insert(name.to_string());
        for f in fields {
            keys.insert(format!("{name}.{f}"));
        }
    };

    section("server", SERVER_KEYS);
    section("history", HISTORY_KEYS);
    section("emulator", EMULATOR_KEYS);
    section("envelope", &[]);
    section("policy", &[]);
    section("policy.bands", BAND_KEYS);
    section("policy.signals", &[]);
    for signal in Signal::ALL {
        section(&format!("envelope.{signal}"), ENVELOPE_KEYS);
        section(&format!("policy.signals.{signal}"), RULE_KEYS);
        section(&format!("policy.signals.{signal}.spike"), SPIKE_KEYS);
        section(&format!("policy.signals.{signal}.wear"), WEAR_KEYS);
    }

    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3. Ties go to the
/// lexicographically smaller key so the hint is stable across runs.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Warnings for every key in `raw_toml` that the schema does not know.
///
/// Syntax errors yield no warnings here; serde reports them afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Cross-Field Range Validation
// ============================================================================

/// Check policy limits against the signal envelopes.
///
/// Returns `(errors, warnings)`. A hard ceiling below the envelope minimum
/// would flag every admitted sample and is an error; a limit that no
/// admitted value can exceed is only suspicious.
pub fn validate_physical_ranges(
    config: &super::EngineConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (signal, rule) in config.policy.signals.iter() {
        let env = config.envelope.get(signal);

        if let Some(ceiling) = rule.ceiling {
            if ceiling < env.min {
                errors.push(format!(
                    "policy.signals.{signal}.ceiling = {ceiling:.2} is below envelope.{signal}.min ({:.2}); every sample would breach",
                    env.min
                ));
            } else if ceiling >= env.max {
                warnings.push(ValidationWarning {
                    field: format!("policy.signals.{signal}.ceiling"),
                    message: format!(
                        "policy.signals.{signal}.ceiling = {ceiling:.2} is at or above envelope max ({:.2}) and can never fire",
                        env.max
                    ),
                    suggestion: None,
                });
            }
        }

        if let (Some(sustained), Some(ceiling)) = (rule.sustained_mean_ceiling, rule.ceiling) {
            if sustained >= ceiling {
                warnings.push(ValidationWarning {
                    field: format!("policy.signals.{signal}.sustained_mean_ceiling"),
                    message: format!(
                        "policy.signals.{signal}.sustained_mean_ceiling = {sustained:.2} is not below the hard ceiling ({ceiling:.2})"
                    ),
                    suggestion: None,
                });
            }
        }
    }

    if signal_has_rules(config, Signal::EngineHours) {
        warnings.push(ValidationWarning {
            field: "policy.signals.engine_hours".to_string(),
            message: "engine_hours is not trended; only its hard ceiling is evaluated".to_string(),
            suggestion: None,
        });
    }

    (errors, warnings)
}

fn signal_has_rules(config: &super::EngineConfig, signal: Signal) -> bool {
    let rule = config.policy.rule(signal);
    rule.rising_slope.is_some() || rule.deviation_pct.is_some() || rule.sustained_mean_ceiling.is_some()
}

// ============================================================================
// Tests
// ============================================================================
