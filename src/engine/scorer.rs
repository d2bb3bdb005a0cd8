//! Risk Scorer - fuses hard thresholds and trend rules into one score
//!
//! Precedence per signal:
//!
//! 1. Hard ceiling breached by the latest sample: one finding at the hard
//!    weight, and nothing else is evaluated for that signal
//! 2. Otherwise, with a computed trend: a rising-trend finding, or failing
//!    that a baseline-deviation finding (at most one of the two)
//! 3. Independently of step 2: sustained elevation of the window mean
//! 4. Spike frequency over the window, graded Low / Medium / High
//! 5. Wear, scaled by how far the latest value is past its onset
//!
//! Steps 4 and 5 need no trend, so they also apply to engine hours and to
//! windows shorter than the trend minimum. The total is the plain sum of
//! finding weights, uncapped.

use crate::config::{ScoringPolicy, SignalRule, SpikeRule, WearRule};
use crate::types::{
    AnomalyFinding, RiskScore, RuleKind, Sample, Signal, SignalTrend, TrendDirection, TrendSummary,
};

use super::classifier::classify;
use super::trend;
use super::EngineError;

/// Score one asset from its trend window (oldest first).
///
/// Pure over its inputs. An empty window is [`EngineError::NoData`].
pub fn score_window(
    asset_id: &str,
    window: &[Sample],
    policy: &ScoringPolicy,
) -> Result<RiskScore, EngineError> {
    let latest = window
        .last()
        .ok_or_else(|| EngineError::NoData(asset_id.to_string()))?;
    let summary = trend::analyze(window, &policy.signals);

    let mut findings = Vec::new();
    for (signal, rule) in policy.signals.iter() {
        evaluate_signal(signal, rule, window, &summary, &mut findings);
    }
    findings.sort_by(AnomalyFinding::severity_order);

    let score: f64 = findings.iter().map(|f| f.weight).sum();
    Ok(RiskScore {
        asset_id: asset_id.to_string(),
        score,
        band: classify(score, &policy.bands),
        findings,
        window_len: window.len(),
        as_of: latest.timestamp,
    })
}

fn evaluate_signal(
    signal: Signal,
    rule: &SignalRule,
    window: &[Sample],
    summary: &TrendSummary,
    findings: &mut Vec<AnomalyFinding>,
) {
    let Some(latest) = window.last() else {
        return;
    };
    let value = latest.get(signal);
    let unit = signal.unit();

    if let Some(ceiling) = rule.ceiling {
        if value > ceiling {
            findings.push(AnomalyFinding {
                signal,
                observed: value,
                rule: RuleKind::HardThreshold,
                limit: ceiling,
                weight: rule.hard_weight,
                message: format!("{signal} {value:.1}{unit} above hard limit {ceiling:.1}{unit}"),
            });
            return;
        }
    }

    findings.extend(rule.spike.and_then(|spike| spike_finding(signal, &spike, window)));
    findings.extend(rule.wear.and_then(|wear| wear_finding(signal, &wear, value)));

    let Some(trend) = summary.signal(signal) else {
        return;
    };

    if let Some(finding) = trend_finding(signal, rule, trend) {
        findings.push(finding);
    }

    if let Some(ceiling) = rule.sustained_mean_ceiling {
        if trend.mean > ceiling {
            findings.push(AnomalyFinding {
                signal,
                observed: trend.mean,
                rule: RuleKind::SustainedElevation,
                limit: ceiling,
                weight: rule.sustained_weight,
                message: format!(
                    "{signal} window mean {:.1}{unit} above {ceiling:.1}{unit}",
                    trend.mean
                ),
            });
        }
    }
}

/// Rising trend wins over baseline deviation when both fire.
fn trend_finding(signal: Signal, rule: &SignalRule, trend: &SignalTrend) -> Option<AnomalyFinding> {
    let unit = signal.unit();

    if let Some(limit) = rule.rising_slope {
        if trend.direction == TrendDirection::Rising && trend.slope > limit {
            return Some(AnomalyFinding {
                signal,
                observed: trend.slope,
                rule: RuleKind::RisingTrend,
                limit,
                weight: rule.trend_weight,
                message: format!(
                    "{signal} rising {:.3}{unit}/sample (limit {limit:.3})",
                    trend.slope
                ),
            });
        }
    }

    match (rule.deviation_pct, trend.deviation_from_baseline) {
        (Some(limit), Some(dev)) if dev.abs() > limit => Some(AnomalyFinding {
            signal,
            observed: dev,
            rule: RuleKind::BaselineDeviation,
            limit,
            weight: rule.trend_weight,
            message: format!(
                "{signal} {:.1}{unit} is {:+.0}% from window mean {:.1}{unit} (limit ±{:.0}%)",
                trend.latest,
                dev * 100.0,
                trend.mean,
                limit * 100.0
            ),
        }),
        _ => None,
    }
}

fn spike_finding(signal: Signal, rule: &SpikeRule, window: &[Sample]) -> Option<AnomalyFinding> {
    let spikes: Vec<&Sample> = window.iter().filter(|s| s.get(signal) >= rule.level).collect();
    let (first, last) = (spikes.first()?, spikes.last()?);

    let count = spikes.len();
    let span_secs = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0;
    let density = count as f64 / (span_secs / rule.period_secs).max(1.0);

    let (grade, weight) = if count >= rule.high_count as usize && density >= rule.high_density {
        ("high", rule.high_weight)
    } else if count >= rule.medium_count as usize && density >= rule.medium_density {
        ("medium", rule.medium_weight)
    } else {
        ("low", rule.low_weight)
    };

    let unit = signal.unit();
    Some(AnomalyFinding {
        signal,
        observed: count as f64,
        rule: RuleKind::SpikeFrequency,
        limit: rule.level,
        weight,
        message: format!(
            "{count} {signal} spike(s) at or above {:.1}{unit}, {density:.1} per {:.0}s ({grade})",
            rule.level, rule.period_secs
        ),
    })
}

fn wear_finding(signal: Signal, rule: &WearRule, value: f64) -> Option<AnomalyFinding> {
    if value <= rule.onset {
        return None;
    }
    let progress = ((value - rule.onset) / (rule.full - rule.onset)).clamp(0.0, 1.0);
    let unit = signal.unit();
    Some(AnomalyFinding {
        signal,
        observed: value,
        rule: RuleKind::Wear,
        limit: rule.onset,
        weight: rule.weight * progress,
        message: format!(
            "{signal} {value:.0}{unit} past wear onset {:.0}{unit} ({:.0}% of full wear)",
            rule.onset,
            progress * 100.0
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskBand;
    use chrono::{Duration, TimeZone, Utc};

    fn steady(n: usize) -> Vec<Sample> {
        spaced(n, 1)
    }

    fn spaced(n: usize, secs: i64) -> Vec<Sample> {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Sample {
                asset_id: "w".to_string(),
                timestamp: t0 + Duration::seconds(i as i64 * secs),
                coolant_temp_f: 195.0,
                intake_air_temp_f: 70.0,
                engine_rpm: 2100.0,
                speed_mph: 60.0,
                vibration_score: 1.2,
                engine_hours: 50.0,
            })
            .collect()
    }

    #[test]
    fn test_empty_window_is_no_data() {
        let err = score_window("X", &[], &ScoringPolicy::default()).unwrap_err();
        assert!(matches!(err, EngineError::NoData(id) if id == "X"));
    }

    #[test]
    fn test_steady_window_scores_zero() {
        let risk = score_window("w", &steady(5), &ScoringPolicy::default()).unwrap();
        assert_eq!(risk.score, 0.0);
        assert_eq!(risk.band, RiskBand::Low);
        assert!(risk.findings.is_empty());
        assert_eq!(risk.window_len, 5);
    }

    #[test]
    fn test_hard_breach_suppresses_trend_rules() {
        let mut window = steady(5);
        window[4].coolant_temp_f = 245.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert_eq!(risk.findings.len(), 1);
        assert_eq!(risk.findings[0].rule, RuleKind::HardThreshold);
        assert_eq!(risk.findings[0].signal, Signal::CoolantTempF);
        assert_eq!(risk.score, 3.0);
        assert_eq!(risk.band, RiskBand::Medium);
    }

    #[test]
    fn test_single_sample_only_hard_rules() {
        let mut window = steady(1);
        window[0].vibration_score = 2.0;
        window[0].speed_mph = 85.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert_eq!(risk.score, 6.0);
        assert_eq!(risk.band, RiskBand::High);
        // equal weights: ordered by signal name
        assert_eq!(risk.primary_cause().unwrap().signal, Signal::SpeedMph);
    }

    #[test]
    fn test_rising_trend_preferred_over_deviation() {
        let mut window = steady(5);
        for (i, s) in window.iter_mut().enumerate() {
            s.coolant_temp_f = 180.0 + 8.0 * i as f64;
        }
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        let coolant: Vec<_> = risk
            .findings
            .iter()
            .filter(|f| f.signal == Signal::CoolantTempF)
            .collect();
        assert_eq!(coolant.len(), 1);
        assert_eq!(coolant[0].rule, RuleKind::RisingTrend);
        assert_eq!(coolant[0].weight, 2.0);
    }

    #[test]
    fn test_sustained_elevation() {
        let mut window = steady(4);
        for s in &mut window {
            s.coolant_temp_f = 220.0;
        }
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert_eq!(risk.findings.len(), 1);
        assert_eq!(risk.findings[0].rule, RuleKind::SustainedElevation);
        assert_eq!(risk.score, 2.0);
    }

    #[test]
    fn test_deviation_drop_flagged() {
        let mut window = steady(5);
        window[4].engine_rpm = 900.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        let rpm = risk
            .findings
            .iter()
            .find(|f| f.signal == Signal::EngineRpm)
            .unwrap();
        assert_eq!(rpm.rule, RuleKind::BaselineDeviation);
        assert!(rpm.observed < 0.0);
    }

    #[test]
    fn test_findings_sorted_by_weight() {
        let mut window = steady(5);
        for s in &mut window {
            s.intake_air_temp_f = 95.0;
        }
        window[4].vibration_score = 1.8;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert_eq!(risk.findings[0].signal, Signal::VibrationScore);
        assert!(risk.findings.windows(2).all(|w| w[0].weight >= w[1].weight));
    }

    #[test]
    fn test_score_is_pure() {
        let mut window = steady(6);
        window[5].coolant_temp_f = 250.0;
        let policy = ScoringPolicy::default();
        let a = score_window("w", &window, &policy).unwrap();
        let b = score_window("w", &window, &policy).unwrap();
        assert_eq!(a, b);
    }

    fn coolant_only(risk: &RiskScore) -> Vec<&AnomalyFinding> {
        risk.findings
            .iter()
            .filter(|f| f.signal == Signal::CoolantTempF)
            .collect()
    }

    #[test]
    fn test_clustered_coolant_spikes_grade_high() {
        // symmetric around the window centre so the slope stays flat
        let mut window = steady(20);
        for i in 8..12 {
            window[i].coolant_temp_f = 232.0;
        }
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        let coolant = coolant_only(&risk);
        assert_eq!(coolant.len(), 1, "{coolant:?}");
        assert_eq!(coolant[0].rule, RuleKind::SpikeFrequency);
        assert_eq!(coolant[0].observed, 4.0);
        assert_eq!(coolant[0].weight, 3.0);
        assert_eq!(risk.band, RiskBand::Medium);
    }

    #[test]
    fn test_pair_of_close_spikes_grades_medium() {
        let mut window = steady(20);
        window[8].coolant_temp_f = 231.0;
        window[11].coolant_temp_f = 231.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        let coolant = coolant_only(&risk);
        assert_eq!(coolant.len(), 1);
        assert_eq!(coolant[0].rule, RuleKind::SpikeFrequency);
        assert_eq!(coolant[0].weight, 2.0);
    }

    #[test]
    fn test_spread_out_spikes_grade_low() {
        // 10 s apart: two spikes 170 s apart are under one per 30 s
        let mut window = spaced(20, 10);
        window[1].coolant_temp_f = 231.0;
        window[18].coolant_temp_f = 231.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        let coolant = coolant_only(&risk);
        assert_eq!(coolant.len(), 1);
        assert_eq!(coolant[0].weight, 1.0);
        assert!(coolant[0].message.contains("low"));
    }

    #[test]
    fn test_past_vibration_spike_counts_after_recovery() {
        let mut window = steady(20);
        window[9].vibration_score = 3.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert_eq!(risk.findings.len(), 1, "{:?}", risk.findings);
        let finding = &risk.findings[0];
        assert_eq!(finding.signal, Signal::VibrationScore);
        assert_eq!(finding.rule, RuleKind::SpikeFrequency);
        assert_eq!(finding.observed, 1.0);
        assert_eq!(finding.limit, 2.8);
        assert_eq!(finding.weight, 0.5);
    }

    #[test]
    fn test_spike_in_latest_sample_over_ceiling_only_cites_breach() {
        let mut window = steady(10);
        window[3].coolant_temp_f = 235.0;
        window[9].coolant_temp_f = 241.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        let coolant = coolant_only(&risk);
        assert_eq!(coolant.len(), 1);
        assert_eq!(coolant[0].rule, RuleKind::HardThreshold);
    }

    #[test]
    fn test_engine_wear_scales_between_onset_and_full() {
        let mut window = steady(1);
        window[0].engine_hours = 900.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert!(risk.findings.is_empty());

        window[0].engine_hours = 1_500.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert_eq!(risk.findings.len(), 1);
        assert_eq!(risk.findings[0].rule, RuleKind::Wear);
        assert_eq!(risk.findings[0].signal, Signal::EngineHours);
        assert!((risk.score - 0.5).abs() < 1e-9);
        assert_eq!(risk.band, RiskBand::Low);

        window[0].engine_hours = 5_000.0;
        let risk = score_window("w", &window, &ScoringPolicy::default()).unwrap();
        assert!((risk.score - 1.0).abs() < 1e-9);
    }
}
