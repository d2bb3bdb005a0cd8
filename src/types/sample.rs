//! Telemetry sample types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Signals
// ============================================================================

/// The fixed set of numeric signals every sample carries.
///
/// Serialized by wire name (`coolant_temp_f`, `engine_rpm`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Engine coolant temperature (°F)
    CoolantTempF,
    /// Intake air temperature (°F)
    IntakeAirTempF,
    /// Engine speed (rev/min)
    EngineRpm,
    /// Road speed (mph)
    SpeedMph,
    /// Dimensionless vibration score (0 = smooth)
    VibrationScore,
    /// Cumulative engine hours, monotonically non-decreasing
    EngineHours,
}

impl Signal {
    /// All signals in wire order. Validation walks fields in this order.
    pub const ALL: [Signal; 6] = [
        Signal::CoolantTempF,
        Signal::IntakeAirTempF,
        Signal::EngineRpm,
        Signal::SpeedMph,
        Signal::VibrationScore,
        Signal::EngineHours,
    ];

    /// Signals that carry trend information. Engine hours only ever rise.
    pub const TRENDED: [Signal; 5] = [
        Signal::CoolantTempF,
        Signal::IntakeAirTempF,
        Signal::EngineRpm,
        Signal::SpeedMph,
        Signal::VibrationScore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::CoolantTempF => "coolant_temp_f",
            Signal::IntakeAirTempF => "intake_air_temp_f",
            Signal::EngineRpm => "engine_rpm",
            Signal::SpeedMph => "speed_mph",
            Signal::VibrationScore => "vibration_score",
            Signal::EngineHours => "engine_hours",
        }
    }

    /// Display unit, used in finding messages.
    pub fn unit(self) -> &'static str {
        match self {
            Signal::CoolantTempF | Signal::IntakeAirTempF => "°F",
            Signal::EngineRpm => "rpm",
            Signal::SpeedMph => "mph",
            Signal::VibrationScore => "",
            Signal::EngineHours => "h",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Per-signal table
// ============================================================================

/// One value per signal, addressable by [`Signal`].
///
/// Used for configuration tables (envelopes, scoring rules) so that TOML
/// sections read `[policy.signals.coolant_temp_f]`. Signals omitted from a
/// table keep their `Default` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de>, PerSignal<T>: Default"))]
pub struct PerSignal<T> {
    pub coolant_temp_f: T,
    pub intake_air_temp_f: T,
    pub engine_rpm: T,
    pub speed_mph: T,
    pub vibration_score: T,
    pub engine_hours: T,
}

impl<T> PerSignal<T> {
    pub fn get(&self, signal: Signal) -> &T {
        match signal {
            Signal::CoolantTempF => &self.coolant_temp_f,
            Signal::IntakeAirTempF => &self.intake_air_temp_f,
            Signal::EngineRpm => &self.engine_rpm,
            Signal::SpeedMph => &self.speed_mph,
            Signal::VibrationScore => &self.vibration_score,
            Signal::EngineHours => &self.engine_hours,
        }
    }

    pub fn get_mut(&mut self, signal: Signal) -> &mut T {
        match signal {
            Signal::CoolantTempF => &mut self.coolant_temp_f,
            Signal::IntakeAirTempF => &mut self.intake_air_temp_f,
            Signal::EngineRpm => &mut self.engine_rpm,
            Signal::SpeedMph => &mut self.speed_mph,
            Signal::VibrationScore => &mut self.vibration_score,
            Signal::EngineHours => &mut self.engine_hours,
        }
    }

    /// Iterate `(signal, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Signal, &T)> {
        Signal::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

// ============================================================================
// Raw sample (untrusted)
// ============================================================================

/// A telemetry record as delivered by the transport or the emulator.
///
/// Every field is optional and untyped so that the validator decides what is
/// missing or malformed and can name the field in its rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(default, alias = "asset_id", skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Value>,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub ts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coolant_temp_f: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake_air_temp_f: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_rpm: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mph: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration_score: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_hours: Option<Value>,
}

impl RawSample {
    pub fn signal(&self, signal: Signal) -> Option<&Value> {
        match signal {
            Signal::CoolantTempF => self.coolant_temp_f.as_ref(),
            Signal::IntakeAirTempF => self.intake_air_temp_f.as_ref(),
            Signal::EngineRpm => self.engine_rpm.as_ref(),
            Signal::SpeedMph => self.speed_mph.as_ref(),
            Signal::VibrationScore => self.vibration_score.as_ref(),
            Signal::EngineHours => self.engine_hours.as_ref(),
        }
    }

    /// Asset id if present as a string. Used to route the record to its
    /// history before full validation.
    pub fn asset_id(&self) -> Option<&str> {
        self.vehicle_id.as_ref().and_then(Value::as_str)
    }
}

impl From<&Sample> for RawSample {
    fn from(s: &Sample) -> Self {
        Self {
            vehicle_id: Some(Value::from(s.asset_id.clone())),
            ts: Some(Value::from(s.timestamp.to_rfc3339())),
            coolant_temp_f: Some(Value::from(s.coolant_temp_f)),
            intake_air_temp_f: Some(Value::from(s.intake_air_temp_f)),
            engine_rpm: Some(Value::from(s.engine_rpm)),
            speed_mph: Some(Value::from(s.speed_mph)),
            vibration_score: Some(Value::from(s.vibration_score)),
            engine_hours: Some(Value::from(s.engine_hours)),
        }
    }
}

// ============================================================================
// Validated sample
// ============================================================================

/// One validated telemetry reading. Immutable once admitted to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "vehicle_id")]
    pub asset_id: String,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub coolant_temp_f: f64,
    pub intake_air_temp_f: f64,
    pub engine_rpm: f64,
    pub speed_mph: f64,
    pub vibration_score: f64,
    pub engine_hours: f64,
}

impl Sample {
    pub fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::CoolantTempF => self.coolant_temp_f,
            Signal::IntakeAirTempF => self.intake_air_temp_f,
            Signal::EngineRpm => self.engine_rpm,
            Signal::SpeedMph => self.speed_mph,
            Signal::VibrationScore => self.vibration_score,
            Signal::EngineHours => self.engine_hours,
        }
    }

    pub fn set(&mut self, signal: Signal, value: f64) {
        match signal {
            Signal::CoolantTempF => self.coolant_temp_f = value,
            Signal::IntakeAirTempF => self.intake_air_temp_f = value,
            Signal::EngineRpm => self.engine_rpm = value,
            Signal::SpeedMph => self.speed_mph = value,
            Signal::VibrationScore => self.vibration_score = value,
            Signal::EngineHours => self.engine_hours = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_wire_names_match_serde() {
        for signal in Signal::ALL {
            let json = serde_json::to_string(&signal).unwrap();
            assert_eq!(json, format!("\"{}\"", signal.as_str()));
        }
    }

    #[test]
    fn test_raw_sample_accepts_asset_id_alias() {
        let raw: RawSample = serde_json::from_str(
            r#"{"asset_id": "truck-7", "ts": "2024-01-01T00:00:00Z", "engine_rpm": "fast"}"#,
        )
        .unwrap();
        assert_eq!(raw.asset_id(), Some("truck-7"));
        assert_eq!(raw.signal(Signal::EngineRpm), Some(&Value::from("fast")));
        assert!(raw.signal(Signal::SpeedMph).is_none());
    }

    #[test]
    fn test_sample_serializes_with_wire_names() {
        let sample = Sample {
            asset_id: "corolla_2019".to_string(),
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
            coolant_temp_f: 195.0,
            intake_air_temp_f: 70.0,
            engine_rpm: 2400.0,
            speed_mph: 70.0,
            vibration_score: 0.8,
            engine_hours: 12.5,
        };
        let v = serde_json::to_value(&sample).unwrap();
        assert_eq!(v["vehicle_id"], "corolla_2019");
        assert!(v["ts"].is_string());
        assert_eq!(v["coolant_temp_f"], 195.0);
    }
}
