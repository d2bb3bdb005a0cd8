//! Synthetic anomaly injection
//!
//! Derives a faulty sample from an asset's latest accepted reading so that
//! demos and tests can drive an asset into a known risk state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::Sample;

/// Fault scenarios that can be injected on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyKind {
    #[serde(alias = "coolant_overheat")]
    CoolantOverheat,
    #[serde(alias = "vibration_spike")]
    VibrationSpike,
    #[serde(alias = "speed_anomaly")]
    SpeedAnomaly,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 3] = [
        AnomalyKind::CoolantOverheat,
        AnomalyKind::VibrationSpike,
        AnomalyKind::SpeedAnomaly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyKind::CoolantOverheat => "coolant-overheat",
            AnomalyKind::VibrationSpike => "vibration-spike",
            AnomalyKind::SpeedAnomaly => "speed-anomaly",
        }
    }

    /// Apply the fault to a copy of `baseline`.
    ///
    /// The timestamp moves to now, or stays at the baseline's timestamp if
    /// the clock is behind it, so the result always passes ordering checks.
    /// Engine hours are carried over unchanged.
    pub fn apply(self, baseline: &Sample) -> Sample {
        let mut sample = baseline.clone();
        sample.timestamp = Utc::now().max(baseline.timestamp);

        match self {
            AnomalyKind::CoolantOverheat => {
                sample.coolant_temp_f = sample.coolant_temp_f.max(250.0);
                sample.vibration_score += 0.2;
            }
            AnomalyKind::VibrationSpike => {
                sample.vibration_score = (sample.vibration_score + 2.0).max(3.5);
            }
            AnomalyKind::SpeedAnomaly => {
                sample.speed_mph = sample.speed_mph.max(83.0);
                sample.engine_rpm = sample.engine_rpm.max(3200.0);
            }
        }
        sample
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "coolant-overheat" => Ok(AnomalyKind::CoolantOverheat),
            "vibration-spike" => Ok(AnomalyKind::VibrationSpike),
            "speed-anomaly" => Ok(AnomalyKind::SpeedAnomaly),
            _ => Err(format!(
                "unknown anomaly type '{s}' (expected one of: coolant-overheat, vibration-spike, speed-anomaly)"
            )),
        }
    }
}
