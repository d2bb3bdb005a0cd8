//! Risk Classifier - score to band, and fleet ranking

use std::cmp::Ordering;

use crate::config::BandThresholds;
use crate::types::{BandCounts, FleetRanking, RankedAsset, RiskBand, RiskScore};

/// Map a score to its band. Lower bounds are inclusive; anything below
/// `medium` (including NaN) is Low.
pub fn classify(score: f64, bands: &BandThresholds) -> RiskBand {
    if score >= bands.high {
        RiskBand::High
    } else if score >= bands.medium {
        RiskBand::Medium
    } else {
        RiskBand::Low
    }
}

/// Order scores descending, ties by asset id ascending, and count bands.
///
/// The result does not depend on the input order.
pub fn rank(mut scores: Vec<RiskScore>) -> FleetRanking {
    scores.sort_by(fleet_order);

    let mut counts = BandCounts::default();
    let entries = scores
        .into_iter()
        .enumerate()
        .map(|(i, risk)| {
            counts.record(risk.band);
            RankedAsset {
                rank: i + 1,
                asset_id: risk.asset_id.clone(),
                risk,
            }
        })
        .collect();

    FleetRanking { entries, counts }
}

fn fleet_order(a: &RiskScore, b: &RiskScore) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.asset_id.cmp(&b.asset_id))
}
