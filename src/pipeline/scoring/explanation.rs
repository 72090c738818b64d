use std::collections::BTreeMap;

use crate::models::{
    Claim, ClaimContribution, ClaimType, ComponentExplanation, ExplanationTree, RiskLevel,
    ScoreComponent, SeverityFloor,
};

/// Confidence assumed for claim types missing from the confidence map.
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// Severity of a deviation at two peer standard deviations.
pub const TOP_BAND_SEVERITY: f64 = 0.70;

/// Below this confidence a top-band claim is not trusted to set the band.
pub const FLOOR_MIN_CONFIDENCE: f64 = 0.50;

/// Claim types whose top-band findings alone make a document high risk.
const FLOOR_CLAIM_TYPES: [ClaimType; 1] = [ClaimType::BaselineDeviation];

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Noisy-OR of claim impacts, scaled to 0-100.
pub fn component_score(contributors: &[ClaimContribution]) -> f64 {
    let survival: f64 = contributors.iter().map(|c| 1.0 - c.impact).product();
    (100.0 * (1.0 - survival)).clamp(0.0, 100.0)
}

pub fn contributions(
    claims: &[Claim],
    confidence_scores: &BTreeMap<ClaimType, f64>,
) -> BTreeMap<ScoreComponent, Vec<ClaimContribution>> {
    let mut by_component: BTreeMap<ScoreComponent, Vec<ClaimContribution>> =
        ScoreComponent::ALL.iter().map(|c| (*c, Vec::new())).collect();

    for claim in claims {
        let severity = claim.severity.clamp(0.0, 1.0);
        let confidence = confidence_scores
            .get(&claim.claim_type)
            .copied()
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0);
        by_component
            .entry(claim.claim_type.component())
            .or_default()
            .push(ClaimContribution {
                claim_text: claim.claim_text.clone(),
                claim_type: claim.claim_type,
                metric_id: claim.metric_id.clone(),
                severity,
                confidence,
                impact: severity * confidence,
            });
    }

    // Largest impact first; ties keep claim order
    for list in by_component.values_mut() {
        list.sort_by(|a, b| b.impact.total_cmp(&a.impact));
    }
    by_component
}

pub fn build_tree(
    weights: &BTreeMap<ScoreComponent, f64>,
    by_component: BTreeMap<ScoreComponent, Vec<ClaimContribution>>,
) -> ExplanationTree {
    let mut components = BTreeMap::new();
    let mut raw_total = 0.0;

    for (component, contributors) in by_component {
        let weight = weights.get(&component).copied().unwrap_or(0.0);
        let score = component_score(&contributors);
        let contribution = weight * score;
        raw_total += contribution;
        components.insert(
            component,
            ComponentExplanation {
                weight,
                score: round2(score),
                contribution: round2(contribution),
                contributors,
            },
        );
    }

    let weighted_total = round2(raw_total.clamp(0.0, 100.0));
    let severity_floor = top_band_claim(&components)
        .filter(|_| weighted_total < RiskLevel::HIGH_FROM)
        .map(|c| SeverityFloor {
            claim_text: c.claim_text.clone(),
            claim_type: c.claim_type,
            severity: c.severity,
            confidence: c.confidence,
            weighted_total,
            floor: RiskLevel::HIGH_FROM,
        });
    let total = severity_floor.as_ref().map_or(weighted_total, |f| f.floor);

    ExplanationTree {
        components,
        total,
        risk_level: RiskLevel::from_score(total),
        severity_floor,
    }
}

/// Highest-impact trusted top-band claim of a flooring type.
fn top_band_claim(
    components: &BTreeMap<ScoreComponent, ComponentExplanation>,
) -> Option<&ClaimContribution> {
    components
        .values()
        .flat_map(|c| c.contributors.iter())
        .filter(|c| FLOOR_CLAIM_TYPES.contains(&c.claim_type))
        .filter(|c| c.severity >= TOP_BAND_SEVERITY && c.confidence >= FLOOR_MIN_CONFIDENCE)
        .max_by(|a, b| a.impact.total_cmp(&b.impact))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(impact: f64) -> ClaimContribution {
        ClaimContribution {
            claim_text: format!("impact {impact}"),
            claim_type: ClaimType::PeerOutlier,
            metric_id: None,
            severity: impact,
            confidence: 1.0,
            impact,
        }
    }

    #[test]
    fn noisy_or_combines_impacts() {
        assert_eq!(component_score(&[]), 0.0);
        assert!((component_score(&[contribution(0.5)]) - 50.0).abs() < 1e-9);
        assert!((component_score(&[contribution(0.5), contribution(0.5)]) - 75.0).abs() < 1e-9);
        assert_eq!(component_score(&[contribution(1.0), contribution(0.2)]), 100.0);
    }

    #[test]
    fn missing_confidence_defaults_to_one() {
        let claims = [Claim::new(ClaimType::UnverifiedData, "No assurance", 0.7)];
        let map = contributions(&claims, &BTreeMap::new());
        let verification = &map[&ScoreComponent::ThirdPartyVerification];
        assert_eq!(verification[0].confidence, 1.0);
        assert_eq!(verification[0].impact, 0.7);
        assert!(map[&ScoreComponent::DataQuality].is_empty());
    }

    #[test]
    fn contributors_sorted_by_impact() {
        let claims = [
            Claim::new(ClaimType::PeerOutlier, "small", 0.2),
            Claim::new(ClaimType::BaselineDeviation, "large", 0.9),
        ];
        let map = contributions(&claims, &BTreeMap::new());
        let texts: Vec<&str> = map[&ScoreComponent::ClaimSeverity]
            .iter()
            .map(|c| c.claim_text.as_str())
            .collect();
        assert_eq!(texts, ["large", "small"]);
    }

    fn weights() -> BTreeMap<ScoreComponent, f64> {
        crate::pipeline::scoring::weights::default_weights()
    }

    #[test]
    fn top_band_baseline_deviation_floors_to_high() {
        let claims = [Claim::new(ClaimType::BaselineDeviation, "fell by 40% vs +5%", 1.0)];
        let confidence: BTreeMap<ClaimType, f64> = [(ClaimType::BaselineDeviation, 0.9)].into_iter().collect();
        let tree = build_tree(&weights(), contributions(&claims, &confidence));
        assert_eq!(tree.total, RiskLevel::HIGH_FROM);
        assert_eq!(tree.risk_level, RiskLevel::High);
        let floor = tree.severity_floor.unwrap();
        assert_eq!(floor.claim_text, "fell by 40% vs +5%");
        assert!((floor.weighted_total - 31.5).abs() < 1e-9);
    }

    #[test]
    fn floor_needs_top_band_and_trusted_confidence() {
        let mid_band = [Claim::new(ClaimType::BaselineDeviation, "mid", 0.6)];
        let tree = build_tree(&weights(), contributions(&mid_band, &BTreeMap::new()));
        assert!(tree.severity_floor.is_none());
        assert_eq!(tree.risk_level, RiskLevel::Low);

        let doubtful = [Claim::new(ClaimType::BaselineDeviation, "doubtful", 0.9)];
        let low: BTreeMap<ClaimType, f64> = [(ClaimType::BaselineDeviation, 0.4)].into_iter().collect();
        assert!(build_tree(&weights(), contributions(&doubtful, &low)).severity_floor.is_none());

        let other_type = [Claim::new(ClaimType::PeerOutlier, "outlier", 1.0)];
        assert!(build_tree(&weights(), contributions(&other_type, &BTreeMap::new())).severity_floor.is_none());
    }

    #[test]
    fn floor_is_not_recorded_when_weighted_sum_is_already_high() {
        let claims: Vec<Claim> = ClaimType::ALL.iter().map(|t| Claim::new(*t, t.as_str(), 1.0)).collect();
        let tree = build_tree(&weights(), contributions(&claims, &BTreeMap::new()));
        assert_eq!(tree.total, 100.0);
        assert!(tree.severity_floor.is_none());
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(84.126), 84.13);
        assert_eq!(round2(59.994), 59.99);
    }
}
