//! Checks on a single normalized metric against its baseline, peers and
//! history.

use super::reference::BenchmarkData;
use super::display_value;
use crate::models::{Claim, ClaimType, NormalizedMetric};
use crate::pipeline::normalize::unit_matches;

/// Severity per standard deviation: z ≥ 2 reaches the top band.
pub const SEVERITY_PER_SD: f64 = 0.35;

/// Baseline deviations below one standard deviation are not reported.
const MIN_BASELINE_Z: f64 = 1.0;

/// Peer and trend deviations above this many standard deviations.
pub const OUTLIER_Z: f64 = 2.0;

/// Metrics read below this confidence are reported.
pub const LOW_CONFIDENCE: f64 = 0.50;

const LOW_CONFIDENCE_SEVERITY_SCALE: f64 = 0.5;

/// Trend spread floor when no peer std-dev is known.
const MIN_TREND_SPREAD: f64 = 1.0;
const TREND_SPREAD_RATIO: f64 = 0.25;

pub fn z_severity(z: f64) -> f64 {
    (SEVERITY_PER_SD * z).min(1.0)
}

/// Severity bands on raw deviation (points for percentages, otherwise
/// percent of the baseline) when the peer spread is unknown.
pub fn band_severity(deviation: f64) -> Option<f64> {
    if deviation > 15.0 {
        Some(0.9)
    } else if deviation > 10.0 {
        Some(0.6)
    } else if deviation > 5.0 {
        Some(0.3)
    } else {
        None
    }
}

/// All metric-level claims for `metric`, in check order.
pub fn check_metric(metric: &NormalizedMetric, reference: &BenchmarkData) -> Vec<Claim> {
    let mut claims = Vec::new();

    // Comparisons need the canonical unit; a misread unit only lowers
    // confidence.
    if unit_matches(metric.metric_kind, &metric.unit) {
        claims.extend(baseline_deviation(metric, reference));
        claims.extend(peer_outlier(metric, reference));
        claims.extend(historical_inconsistency(metric, reference));
    }
    claims.extend(low_confidence(metric));
    claims
}

// ---------------------------------------------------------------------------
// [1] BASELINE deviation
// ---------------------------------------------------------------------------

fn baseline_deviation(metric: &NormalizedMetric, reference: &BenchmarkData) -> Option<Claim> {
    let baseline = metric.baseline?;
    let deviation = (metric.value - baseline).abs();

    let (severity, basis) = match reference.peer(metric.metric_kind) {
        Some(peer) => {
            let z = deviation / peer.std_dev;
            if z < MIN_BASELINE_Z {
                return None;
            }
            (z_severity(z), format!("z = {z:.2} against peer std-dev {}", peer.std_dev))
        }
        None => {
            let raw = if metric.unit == "pct" || baseline == 0.0 {
                deviation
            } else {
                deviation / baseline.abs() * 100.0
            };
            (band_severity(raw)?, format!("raw deviation {raw:.1}"))
        }
    };

    Some(
        Claim::new(
            ClaimType::BaselineDeviation,
            format!(
                "Reported {} of {} deviates from the verified baseline of {}",
                metric.metric_kind.label(),
                display_value(metric.value, &metric.unit),
                display_value(baseline, &metric.unit)
            ),
            severity,
        )
        .with_explanation(basis)
        .for_metric(&metric.metric_id),
    )
}

// ---------------------------------------------------------------------------
// [2] PEER outlier
// ---------------------------------------------------------------------------

fn peer_outlier(metric: &NormalizedMetric, reference: &BenchmarkData) -> Option<Claim> {
    let peer = reference.peer(metric.metric_kind)?;
    let z = (metric.value - peer.mean).abs() / peer.std_dev;
    if z <= OUTLIER_Z {
        return None;
    }

    Some(
        Claim::new(
            ClaimType::PeerOutlier,
            format!(
                "Reported {} of {} is an outlier against the peer mean of {}",
                metric.metric_kind.label(),
                display_value(metric.value, &metric.unit),
                display_value(peer.mean, &metric.unit)
            ),
            z_severity(z),
        )
        .with_explanation(format!("z = {z:.2}, peer std-dev {}", peer.std_dev))
        .for_metric(&metric.metric_id),
    )
}

// ---------------------------------------------------------------------------
// [3] HISTORICAL inconsistency
// ---------------------------------------------------------------------------

fn historical_inconsistency(metric: &NormalizedMetric, reference: &BenchmarkData) -> Option<Claim> {
    let (expected, slope) = reference.expected_next(metric.metric_kind)?;
    let spread = match reference.peer(metric.metric_kind) {
        Some(peer) => peer.std_dev,
        None => (slope.abs() * TREND_SPREAD_RATIO).max(MIN_TREND_SPREAD),
    };
    let z = (metric.value - expected).abs() / spread;
    if z <= OUTLIER_Z {
        return None;
    }

    Some(
        Claim::new(
            ClaimType::HistoricalInconsistency,
            format!(
                "Reported {} of {} breaks the historical trend, which projects {}",
                metric.metric_kind.label(),
                display_value(metric.value, &metric.unit),
                display_value((expected * 10.0).round() / 10.0, &metric.unit)
            ),
            z_severity(z),
        )
        .with_explanation(format!("z = {z:.2} against a spread of {spread}"))
        .for_metric(&metric.metric_id),
    )
}

// ---------------------------------------------------------------------------
// [4] LOW confidence
// ---------------------------------------------------------------------------

fn low_confidence(metric: &NormalizedMetric) -> Option<Claim> {
    if metric.confidence >= LOW_CONFIDENCE {
        return None;
    }
    Some(
        Claim::new(
            ClaimType::LowConfidenceMetric,
            format!(
                "Reported {} of {} was read with low confidence",
                metric.metric_kind.label(),
                display_value(metric.value, &metric.unit)
            ),
            LOW_CONFIDENCE_SEVERITY_SCALE * (1.0 - metric.confidence),
        )
        .with_explanation(format!("extraction confidence {:.2}", metric.confidence))
        .for_metric(&metric.metric_id),
    )
}
