//! Sample Validator - admits raw telemetry records into history
//!
//! Three stages, in order, stopping at the first failure:
//!
//! 1. **Shape**: asset id (non-empty string), timestamp (RFC 3339) and every
//!    signal present as a finite number
//! 2. **Envelope**: every signal inside its inclusive physical range
//! 3. **Ordering**: timestamp and engine hours not below the asset's last
//!    accepted sample (equal values pass)
//!
//! Validation is a pure check. Appending the result is the caller's job.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::config::Envelope;
use crate::types::{PerSignal, RawSample, Sample, Signal};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' must be {expected}, got {found}")]
    Type {
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("{field} = {value} is outside its envelope [{min}, {max}]")]
    OutOfRange {
        field: Signal,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} went backwards: previous {previous}, got {value}")]
    Ordering {
        field: String,
        previous: String,
        value: String,
    },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> String {
        match self {
            Self::MissingField { field } | Self::Type { field, .. } | Self::Ordering { field, .. } => {
                field.clone()
            }
            Self::OutOfRange { field, .. } => field.as_str().to_string(),
        }
    }

    /// Stable rule name, used in API responses and rejection counters.
    pub fn rule(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::Type { .. } => "type",
            Self::OutOfRange { .. } => "out_of_range",
            Self::Ordering { .. } => "ordering",
        }
    }

    /// Offending value, when there was one.
    pub fn value(&self) -> Option<Value> {
        match self {
            Self::MissingField { .. } => None,
            Self::Type { found, .. } => Some(Value::from(found.clone())),
            Self::OutOfRange { value, .. } => Some(Value::from(*value)),
            Self::Ordering { value, .. } => Some(Value::from(value.clone())),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validate `raw` against the envelopes and the asset's previous sample.
pub fn validate(
    raw: &RawSample,
    previous: Option<&Sample>,
    envelopes: &PerSignal<Envelope>,
) -> Result<Sample, ValidationError> {
    let sample = parse_shape(raw)?;
    check_envelopes(&sample, envelopes)?;
    if let Some(prev) = previous {
        check_ordering(prev, &sample)?;
    }
    Ok(sample)
}

/// Stage 1: presence and types.
fn parse_shape(raw: &RawSample) -> Result<Sample, ValidationError> {
    let asset_id = match required("vehicle_id", raw.vehicle_id.as_ref())? {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::String(_) => {
            return Err(ValidationError::Type {
                field: "vehicle_id".to_string(),
                expected: "a non-empty string",
                found: "empty string".to_string(),
            })
        }
        other => return Err(type_error("vehicle_id", "a string", other)),
    };

    let timestamp = match required("ts", raw.ts.as_ref())? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ValidationError::Type {
                field: "ts".to_string(),
                expected: "an RFC 3339 timestamp",
                found: format!("\"{s}\""),
            })?,
        other => return Err(type_error("ts", "an RFC 3339 timestamp", other)),
    };

    let mut sample = Sample {
        asset_id,
        timestamp,
        coolant_temp_f: 0.0,
        intake_air_temp_f: 0.0,
        engine_rpm: 0.0,
        speed_mph: 0.0,
        vibration_score: 0.0,
        engine_hours: 0.0,
    };

    for signal in Signal::ALL {
        let value = required(signal.as_str(), raw.signal(signal))?;
        let number = value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| type_error(signal.as_str(), "a finite number", value))?;
        sample.set(signal, number);
    }

    Ok(sample)
}

/// Stage 2: absolute physical envelopes, inclusive on both ends.
pub fn check_envelopes(sample: &Sample, envelopes: &PerSignal<Envelope>) -> Result<(), ValidationError> {
    for (signal, env) in envelopes.iter() {
        let value = sample.get(signal);
        if !env.contains(value) {
            return Err(ValidationError::OutOfRange {
                field: signal,
                value,
                min: env.min,
                max: env.max,
            });
        }
    }
    Ok(())
}

/// Stage 3: per-asset monotonicity of timestamp and engine hours.
pub fn check_ordering(previous: &Sample, sample: &Sample) -> Result<(), ValidationError> {
    if sample.timestamp < previous.timestamp {
        return Err(ValidationError::Ordering {
            field: "ts".to_string(),
            previous: previous.timestamp.to_rfc3339(),
            value: sample.timestamp.to_rfc3339(),
        });
    }
    if sample.engine_hours < previous.engine_hours {
        return Err(ValidationError::Ordering {
            field: Signal::EngineHours.as_str().to_string(),
            previous: previous.engine_hours.to_string(),
            value: sample.engine_hours.to_string(),
        });
    }
    Ok(())
}

fn required<'a>(field: &str, value: Option<&'a Value>) -> Result<&'a Value, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::MissingField {
            field: field.to_string(),
        }),
        Some(v) => Ok(v),
    }
}

fn type_error(field: &str, expected: &'static str, found: &Value) -> ValidationError {
    ValidationError::Type {
        field: field.to_string(),
        expected,
        found: json_kind(found).to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelopes() -> PerSignal<Envelope> {
        PerSignal::default()
    }

    fn raw(value: serde_json::Value) -> RawSample {
        serde_json::from_value(value).unwrap()
    }

    fn good() -> serde_json::Value {
        json!({
            "vehicle_id": "truck-1",
            "ts": "2024-06-01T10:00:00Z",
            "coolant_temp_f": 195.0,
            "intake_air_temp_f": 70.0,
            "engine_rpm": 2100.0,
            "speed_mph": 55.0,
            "vibration_score": 1.2,
            "engine_hours": 1000.0
        })
    }

    #[test]
    fn test_valid_sample_accepted() {
        let sample = validate(&raw(good()), None, &envelopes()).unwrap();
        assert_eq!(sample.asset_id, "truck-1");
        assert_eq!(sample.engine_rpm, 2100.0);
    }

    #[test]
    fn test_missing_field_named() {
        let mut v = good();
        v.as_object_mut().unwrap().remove("speed_mph");
        let err = validate(&raw(v), None, &envelopes()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "speed_mph".into() });
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut v = good();
        v["engine_hours"] = serde_json::Value::Null;
        let err = validate(&raw(v), None, &envelopes()).unwrap_err();
        assert_eq!(err.rule(), "missing_field");
        assert_eq!(err.field(), "engine_hours");
    }

    #[test]
    fn test_non_numeric_signal_is_type_error() {
        let mut v = good();
        v["engine_rpm"] = json!("2100");
        let err = validate(&raw(v), None, &envelopes()).unwrap_err();
        assert_eq!(err.rule(), "type");
        assert_eq!(err.field(), "engine_rpm");
    }

    #[test]
    fn test_bad_timestamp_is_type_error() {
        let mut v = good();
        v["ts"] = json!("yesterday");
        let err = validate(&raw(v), None, &envelopes()).unwrap_err();
        assert_eq!(err.field(), "ts");
        assert_eq!(err.rule(), "type");
    }

    #[test]
    fn test_empty_asset_id_rejected() {
        let mut v = good();
        v["vehicle_id"] = json!("  ");
        let err = validate(&raw(v), None, &envelopes()).unwrap_err();
        assert_eq!(err.field(), "vehicle_id");
    }

    #[test]
    fn test_shape_checked_before_range() {
        // coolant out of range, rpm missing: the shape failure wins
        let mut v = good();
        v["coolant_temp_f"] = json!(900.0);
        v.as_object_mut().unwrap().remove("engine_rpm");
        let err = validate(&raw(v), None, &envelopes()).unwrap_err();
        assert_eq!(err.rule(), "missing_field");
    }

    #[test]
    fn test_out_of_range_names_field() {
        let mut v = good();
        v["vibration_score"] = json!(25.0);
        let err = validate(&raw(v), None, &envelopes()).unwrap_err();
        match err {
            ValidationError::OutOfRange { field, value, max, .. } => {
                assert_eq!(field, Signal::VibrationScore);
                assert_eq!(value, 25.0);
                assert_eq!(max, 20.0);
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_bounds_inclusive() {
        let mut v = good();
        v["coolant_temp_f"] = json!(300.0);
        v["engine_rpm"] = json!(0.0);
        assert!(validate(&raw(v), None, &envelopes()).is_ok());
    }

    #[test]
    fn test_timestamp_going_backwards_rejected() {
        let prev = validate(&raw(good()), None, &envelopes()).unwrap();
        let mut v = good();
        v["ts"] = json!("2024-06-01T09:59:59Z");
        let err = validate(&raw(v), Some(&prev), &envelopes()).unwrap_err();
        assert_eq!(err.rule(), "ordering");
        assert_eq!(err.field(), "ts");
    }

    #[test]
    fn test_engine_hours_going_backwards_rejected() {
        let prev = validate(&raw(good()), None, &envelopes()).unwrap();
        let mut v = good();
        v["ts"] = json!("2024-06-01T10:00:01Z");
        v["engine_hours"] = json!(999.5);
        let err = validate(&raw(v), Some(&prev), &envelopes()).unwrap_err();
        assert_eq!(err.field(), "engine_hours");
    }

    #[test]
    fn test_equal_timestamp_and_hours_accepted() {
        let prev = validate(&raw(good()), None, &envelopes()).unwrap();
        assert!(validate(&raw(good()), Some(&prev), &envelopes()).is_ok());
    }
}
