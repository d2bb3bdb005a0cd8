//! Ingestion and injection counters since process start

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::anomaly::AnomalyKind;
use super::validator::ValidationError;

/// Rejected samples per validation rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    pub missing_field: u64,
    #[serde(rename = "type")]
    pub type_error: u64,
    pub out_of_range: u64,
    pub ordering: u64,
}

impl RejectionCounts {
    pub fn total(&self) -> u64 {
        self.missing_field + self.type_error + self.out_of_range + self.ordering
    }
}

/// Injected anomalies per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InjectionCounts {
    pub coolant_overheat: u64,
    pub vibration_spike: u64,
    pub speed_anomaly: u64,
}

impl InjectionCounts {
    pub fn get(&self, kind: AnomalyKind) -> u64 {
        match kind {
            AnomalyKind::CoolantOverheat => self.coolant_overheat,
            AnomalyKind::VibrationSpike => self.vibration_spike,
            AnomalyKind::SpeedAnomaly => self.speed_anomaly,
        }
    }
}

/// Point-in-time snapshot returned by the stats query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub accepted: u64,
    pub rejected: RejectionCounts,
    pub injected: InjectionCounts,
    /// Assets with at least one accepted sample
    pub assets: usize,
}

/// Lock-free counters owned by the engine.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    accepted: AtomicU64,
    missing_field: AtomicU64,
    type_error: AtomicU64,
    out_of_range: AtomicU64,
    ordering: AtomicU64,
    coolant_overheat: AtomicU64,
    vibration_spike: AtomicU64,
    speed_anomaly: AtomicU64,
}

impl StatsCounters {
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, err: &ValidationError) {
        let counter = match err {
            ValidationError::MissingField { .. } => &self.missing_field,
            ValidationError::Type { .. } => &self.type_error,
            ValidationError::OutOfRange { .. } => &self.out_of_range,
            ValidationError::Ordering { .. } => &self.ordering,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_injected(&self, kind: AnomalyKind) {
        let counter = match kind {
            AnomalyKind::CoolantOverheat => &self.coolant_overheat,
            AnomalyKind::VibrationSpike => &self.vibration_spike,
            AnomalyKind::SpeedAnomaly => &self.speed_anomaly,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, assets: usize) -> EngineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EngineStats {
            accepted: load(&self.accepted),
            rejected: RejectionCounts {
                missing_field: load(&self.missing_field),
                type_error: load(&self.type_error),
                out_of_range: load(&self.out_of_range),
                ordering: load(&self.ordering),
            },
            injected: InjectionCounts {
                coolant_overheat: load(&self.coolant_overheat),
                vibration_spike: load(&self.vibration_spike),
                speed_anomaly: load(&self.speed_anomaly),
            },
            assets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = StatsCounters::default();
        counters.record_accepted();
        counters.record_accepted();
        counters.record_rejected(&ValidationError::MissingField { field: "ts".into() });
        counters.record_injected(AnomalyKind::VibrationSpike);

        let stats = counters.snapshot(1);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected.missing_field, 1);
        assert_eq!(stats.rejected.total(), 1);
        assert_eq!(stats.injected.get(AnomalyKind::VibrationSpike), 1);
        assert_eq!(stats.assets, 1);
    }

    #[test]
    fn test_stats_wire_names() {
        let v = serde_json::to_value(EngineStats::default()).unwrap();
        assert!(v["rejected"].get("type").is_some());
        assert!(v["injected"].get("vibration-spike").is_some());
    }
}
