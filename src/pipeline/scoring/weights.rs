//! Component weights: defaults, sector and jurisdiction multipliers,
//! caller overrides.

use std::collections::BTreeMap;
use std::str::FromStr;

use super::ScoringError;
use crate::models::ScoreComponent;

pub const DEFAULT_WEIGHTS: [(ScoreComponent, f64); 4] = [
    (ScoreComponent::ClaimSeverity, 0.35),
    (ScoreComponent::DataQuality, 0.20),
    (ScoreComponent::HistoricalConsistency, 0.25),
    (ScoreComponent::ThirdPartyVerification, 0.20),
];

const SECTOR_MULTIPLIER: f64 = 1.2;
const JURISDICTION_MULTIPLIER: f64 = 1.25;

/// Sectors where claims and trends weigh more.
const HIGH_IMPACT_SECTORS: &[&str] = &["energy", "oil_gas", "oil_and_gas", "utilities", "mining"];
const FINANCIAL_SECTORS: &[&str] = &["financial", "financials", "financial_services", "banking"];
/// Jurisdictions with mandatory assurance regimes.
const ASSURANCE_JURISDICTIONS: &[&str] = &["EU", "UK", "GB"];

pub fn default_weights() -> BTreeMap<ScoreComponent, f64> {
    DEFAULT_WEIGHTS.into_iter().collect()
}

/// `Oil & Gas` → `oil_gas`
fn sector_key(industry: &str) -> String {
    let mut key = String::with_capacity(industry.len());
    for ch in industry.trim().chars() {
        if ch.is_alphanumeric() {
            key.extend(ch.to_lowercase());
        } else if !key.ends_with('_') && !key.is_empty() {
            key.push('_');
        }
    }
    key.trim_end_matches('_').to_string()
}

pub fn industry_multipliers(industry: &str) -> Vec<(ScoreComponent, f64)> {
    let key = sector_key(industry);
    if HIGH_IMPACT_SECTORS.contains(&key.as_str()) {
        vec![
            (ScoreComponent::ClaimSeverity, SECTOR_MULTIPLIER),
            (ScoreComponent::HistoricalConsistency, SECTOR_MULTIPLIER),
        ]
    } else if FINANCIAL_SECTORS.contains(&key.as_str()) {
        vec![(ScoreComponent::DataQuality, SECTOR_MULTIPLIER)]
    } else {
        Vec::new()
    }
}

pub fn jurisdiction_multipliers(jurisdiction: &str) -> Vec<(ScoreComponent, f64)> {
    let code = jurisdiction.trim().to_ascii_uppercase();
    if ASSURANCE_JURISDICTIONS.contains(&code.as_str()) {
        vec![(ScoreComponent::ThirdPartyVerification, JURISDICTION_MULTIPLIER)]
    } else {
        Vec::new()
    }
}

/// Validate a caller override. Components it leaves out weigh zero.
pub fn parse_override(
    raw: &BTreeMap<String, f64>,
) -> Result<BTreeMap<ScoreComponent, f64>, ScoringError> {
    let mut weights: BTreeMap<ScoreComponent, f64> =
        ScoreComponent::ALL.iter().map(|c| (*c, 0.0)).collect();
    for (name, weight) in raw {
        let component = ScoreComponent::from_str(name).map_err(|_| ScoringError::InvalidWeights {
            field: format!("weights.{name}"),
            reason: format!("unknown score component '{name}'"),
        })?;
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ScoringError::InvalidWeights {
                field: format!("weights.{name}"),
                reason: "weights must be finite and non-negative".into(),
            });
        }
        weights.insert(component, *weight);
    }
    if weights.values().sum::<f64>() <= 0.0 {
        return Err(ScoringError::InvalidWeights {
            field: "weights".into(),
            reason: "weights must have a positive sum".into(),
        });
    }
    Ok(weights)
}

/// Final component weights, summing to 1.
pub fn resolve_weights(
    base_override: Option<&BTreeMap<String, f64>>,
    industry: Option<&str>,
    jurisdiction: Option<&str>,
) -> Result<BTreeMap<ScoreComponent, f64>, ScoringError> {
    let mut weights = match base_override {
        Some(raw) => parse_override(raw)?,
        None => default_weights(),
    };

    let multipliers = industry
        .map(industry_multipliers)
        .unwrap_or_default()
        .into_iter()
        .chain(jurisdiction.map(jurisdiction_multipliers).unwrap_or_default());
    for (component, factor) in multipliers {
        if let Some(w) = weights.get_mut(&component) {
            *w *= factor;
        }
    }

    let total: f64 = weights.values().sum();
    for w in weights.values_mut() {
        *w /= total;
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(weights: &BTreeMap<ScoreComponent, f64>) -> f64 {
        weights.values().sum()
    }

    #[test]
    fn defaults_sum_to_one() {
        let w = resolve_weights(None, None, None).unwrap();
        assert!((sum(&w) - 1.0).abs() < 1e-9);
        assert_eq!(w[&ScoreComponent::ClaimSeverity], 0.35);
    }

    #[test]
    fn every_profile_sums_to_one() {
        for industry in [None, Some("Energy"), Some("Oil & Gas"), Some("financial"), Some("retail")] {
            for jurisdiction in [None, Some("eu"), Some("UK"), Some("US")] {
                let w = resolve_weights(None, industry, jurisdiction).unwrap();
                assert!((sum(&w) - 1.0).abs() < 1e-9, "{industry:?} {jurisdiction:?}");
            }
        }
    }

    #[test]
    fn energy_sector_boosts_severity_and_history() {
        let base = resolve_weights(None, None, None).unwrap();
        let energy = resolve_weights(None, Some("energy"), None).unwrap();
        assert!(energy[&ScoreComponent::ClaimSeverity] > base[&ScoreComponent::ClaimSeverity]);
        assert!(energy[&ScoreComponent::HistoricalConsistency] > base[&ScoreComponent::HistoricalConsistency]);
        assert!(energy[&ScoreComponent::DataQuality] < base[&ScoreComponent::DataQuality]);
    }

    #[test]
    fn eu_boosts_verification() {
        let base = resolve_weights(None, None, None).unwrap();
        let eu = resolve_weights(None, None, Some("EU")).unwrap();
        assert!(eu[&ScoreComponent::ThirdPartyVerification] > base[&ScoreComponent::ThirdPartyVerification]);
    }

    #[test]
    fn sector_keys() {
        assert_eq!(sector_key("Oil & Gas"), "oil_gas");
        assert_eq!(sector_key("  Financial Services "), "financial_services");
    }

    #[test]
    fn override_is_renormalised() {
        let raw: BTreeMap<String, f64> = [("claim_severity".to_string(), 2.0), ("data_quality".to_string(), 2.0)]
            .into_iter()
            .collect();
        let w = resolve_weights(Some(&raw), None, None).unwrap();
        assert_eq!(w[&ScoreComponent::ClaimSeverity], 0.5);
        assert_eq!(w[&ScoreComponent::ThirdPartyVerification], 0.0);
        assert!((sum(&w) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_overrides() {
        let cases: [(&[(&str, f64)], &str); 3] = [
            (&[("claim_severity", -0.1)], "weights.claim_severity"),
            (&[("esg_vibes", 0.5)], "weights.esg_vibes"),
            (&[("claim_severity", 0.0), ("data_quality", 0.0)], "weights"),
        ];
        for (pairs, field) in cases {
            let raw: BTreeMap<String, f64> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
            match resolve_weights(Some(&raw), None, None) {
                Err(ScoringError::InvalidWeights { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected invalid weights for {pairs:?}, got {other:?}"),
            }
        }
    }
}
