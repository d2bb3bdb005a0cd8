//! Trend Analyzer - rolling mean, slope, and deviation per signal

use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::config::{defaults, SignalRule};
use crate::types::{PerSignal, Sample, Signal, SignalTrend, TrendDirection, TrendSummary};

/// Summarize the window for every trended signal.
///
/// Fewer than three samples yields [`TrendSummary::Insufficient`]. The
/// per-signal `rising_slope` doubles as the stable band for the direction;
/// signals without one always report `Stable`.
pub fn analyze(window: &[Sample], rules: &PerSignal<SignalRule>) -> TrendSummary {
    if window.len() < defaults::MIN_TREND_SAMPLES {
        return TrendSummary::Insufficient {
            samples: window.len(),
            required: defaults::MIN_TREND_SAMPLES,
        };
    }

    let signals: BTreeMap<Signal, SignalTrend> = Signal::TRENDED
        .into_iter()
        .map(|signal| {
            let values: Vec<f64> = window.iter().map(|s| s.get(signal)).collect();
            (signal, signal_trend(&values, rules.get(signal).rising_slope))
        })
        .collect();

    TrendSummary::Computed {
        samples: window.len(),
        signals,
    }
}

fn signal_trend(values: &[f64], threshold: Option<f64>) -> SignalTrend {
    let mean = values.mean();
    let slope = least_squares_slope(values);
    let latest = values.last().copied().unwrap_or(mean);

    SignalTrend {
        mean,
        slope,
        deviation_from_baseline: deviation(latest, mean),
        latest,
        direction: direction(slope, threshold),
    }
}

/// Least-squares slope of value against sample index (units per sample).
pub fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator.abs() < 1e-10 {
        return 0.0;
    }
    numerator / denominator
}

/// `(latest - mean) / mean`, or `None` when the mean is zero.
fn deviation(latest: f64, mean: f64) -> Option<f64> {
    if mean.abs() < f64::EPSILON {
        None
    } else {
        Some((latest - mean) / mean)
    }
}

fn direction(slope: f64, threshold: Option<f64>) -> TrendDirection {
    match threshold {
        Some(t) if slope > t => TrendDirection::Rising,
        Some(t) if slope < -t => TrendDirection::Falling,
        _ => TrendDirection::Stable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn window(coolant: &[f64]) -> Vec<Sample> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        coolant
            .iter()
            .enumerate()
            .map(|(i, &c)| Sample {
                asset_id: "t".to_string(),
                timestamp: t0 + Duration::seconds(i as i64),
                coolant_temp_f: c,
                intake_air_temp_f: 70.0,
                engine_rpm: 2100.0,
                speed_mph: 0.0,
                vibration_score: 1.2,
                engine_hours: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_two_samples_insufficient() {
        let summary = analyze(&window(&[190.0, 191.0]), &PerSignal::default());
        assert_eq!(summary, TrendSummary::Insufficient { samples: 2, required: 3 });
    }

    #[test]
    fn test_flat_window_is_stable() {
        let summary = analyze(&window(&[195.0; 5]), &PerSignal::default());
        let coolant = summary.signal(Signal::CoolantTempF).unwrap();
        assert!((coolant.mean - 195.0).abs() < 1e-9);
        assert!(coolant.slope.abs() < 1e-9);
        assert_eq!(coolant.deviation_from_baseline, Some(0.0));
        assert_eq!(coolant.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_linear_rise_slope() {
        let summary = analyze(&window(&[190.0, 192.0, 194.0, 196.0]), &PerSignal::default());
        let coolant = summary.signal(Signal::CoolantTempF).unwrap();
        assert!((coolant.slope - 2.0).abs() < 1e-9);
        assert_eq!(coolant.direction, TrendDirection::Rising);
        assert_eq!(coolant.latest, 196.0);
    }

    #[test]
    fn test_falling_beyond_threshold() {
        let summary = analyze(&window(&[200.0, 198.0, 196.0]), &PerSignal::default());
        assert_eq!(
            summary.signal(Signal::CoolantTempF).unwrap().direction,
            TrendDirection::Falling
        );
    }

    #[test]
    fn test_zero_mean_has_no_deviation() {
        let summary = analyze(&window(&[195.0; 3]), &PerSignal::default());
        assert_eq!(summary.signal(Signal::SpeedMph).unwrap().deviation_from_baseline, None);
    }

    #[test]
    fn test_engine_hours_not_trended() {
        let summary = analyze(&window(&[195.0; 3]), &PerSignal::default());
        assert!(summary.signal(Signal::EngineHours).is_none());
    }

    #[test]
    fn test_slope_of_single_value_is_zero() {
        assert_eq!(least_squares_slope(&[5.0]), 0.0);
        assert_eq!(least_squares_slope(&[]), 0.0);
    }

    #[test]
    fn test_no_slope_threshold_reports_stable() {
        let mut samples = window(&[195.0; 5]);
        for (i, s) in samples.iter_mut().enumerate() {
            s.engine_rpm = 2000.0 + 40.0 * i as f64;
        }
        let summary = analyze(&samples, &PerSignal::default());
        let rpm = summary.signal(Signal::EngineRpm).unwrap();
        assert!((rpm.slope - 40.0).abs() < 1e-9);
        assert_eq!(rpm.direction, TrendDirection::Stable);
    }
}
