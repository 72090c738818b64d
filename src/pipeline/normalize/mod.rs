//! Stage 3: turns extracted text into canonical, typed metrics.
//!
//! Works sentence by sentence. Each catalog keyword claims the nearest
//! unclaimed quantity of a compatible dimension; a qualified sentence
//! (verified, assured, base year) reports a baseline instead of a claim.

pub mod catalog;
pub mod parser;
pub mod units;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::models::{MetricKind, NormalizedMetric};
use crate::pipeline::extraction::PAGE_BREAK;
use catalog::{dimension_of, find_mentions, Mention};
use parser::{scan_quantities, split_sentences, Quantity};
use units::{Dimension, Unit};

/// Quantities further than this from their keyword read as `FAR`.
pub const NEAR_WINDOW_CHARS: usize = 80;

pub mod confidence {
    pub const NEAR: f64 = 0.90;
    pub const FAR: f64 = 0.75;
    /// Unit missing or of the wrong dimension.
    pub const AMBIGUOUS: f64 = 0.30;
}

/// Values closer than this are the same reading.
const VALUE_EPSILON: f64 = 1e-9;

static BASELINE_QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:verified|assured|audited|independently|third[- ]party|baseline|base[- ]year)\b")
        .expect("static regex")
});
static REDUCTION_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:fell|fall(?:en|ing|s)?|decreas\w*|reduc\w*|cut|lower\w*|declin\w*|dropp?\w*|down)\b")
        .expect("static regex")
});
static INCREASE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:increas\w*|rose|ris(?:e|en|es|ing)|grew|grow\w*|up|higher)\b")
        .expect("static regex")
});

/// True when `unit` is the canonical unit of `kind`, so the value can be
/// compared against reference data.
pub fn unit_matches(kind: MetricKind, unit: &str) -> bool {
    match dimension_of(kind) {
        Dimension::Currency => units::currency_code(unit).is_some(),
        dimension => dimension.canonical_label() == unit,
    }
}

/// One keyword/quantity pairing before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
struct Reading {
    kind: MetricKind,
    value: f64,
    unit: String,
    confidence: f64,
    page: u32,
    is_baseline: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Metrics in order of appearance. Every call builds a fresh sequence.
    pub fn normalize(&self, document_id: Uuid, extracted_text: &str) -> Vec<NormalizedMetric> {
        let mut readings = Vec::new();
        for (index, page) in extracted_text.split(PAGE_BREAK).enumerate() {
            for sentence in split_sentences(page) {
                read_sentence(sentence, index as u32 + 1, &mut readings);
            }
        }

        let metrics = assemble(readings);
        tracing::info!(
            document_id = %document_id,
            metrics = metrics.len(),
            baselines = metrics.iter().filter(|m| m.baseline.is_some()).count(),
            "Normalization complete"
        );
        metrics
    }
}

fn read_sentence(sentence: &str, page: u32, out: &mut Vec<Reading>) {
    let mentions = find_mentions(sentence);
    if mentions.is_empty() {
        return;
    }

    let quantities: Vec<Quantity> = scan_quantities(sentence)
        .into_iter()
        .filter(|q| !mentions.iter().any(|m| q.overlaps(m.start, m.end)))
        .collect();
    let mut claimed = vec![false; quantities.len()];
    let is_baseline = BASELINE_QUALIFIER.is_match(sentence);

    for mention in &mentions {
        let dimension = dimension_of(mention.kind);
        let (index, confidence) = match nearest(&quantities, &claimed, mention, Some(dimension)) {
            Some(i) => {
                let distance = quantities[i].distance_to(mention.start, mention.end);
                let confidence = if distance > NEAR_WINDOW_CHARS {
                    confidence::FAR
                } else {
                    confidence::NEAR
                };
                (i, confidence)
            }
            None => match nearest(&quantities, &claimed, mention, None) {
                Some(i) => (i, confidence::AMBIGUOUS),
                None => continue,
            },
        };
        claimed[index] = true;

        let quantity = &quantities[index];
        let value = if mention.kind == MetricKind::CarbonReduction
            && !quantity.signed
            && quantity.unit == Some(Unit::Percent)
        {
            directed_change(sentence, quantity)
        } else {
            quantity.value
        };

        out.push(Reading {
            kind: mention.kind,
            value,
            unit: quantity
                .unit
                .map_or(dimension.canonical_label(), |u| u.label())
                .to_string(),
            confidence,
            page,
            is_baseline,
        });
    }
}

/// Index of the closest unclaimed quantity, optionally of one dimension.
fn nearest(
    quantities: &[Quantity],
    claimed: &[bool],
    mention: &Mention,
    dimension: Option<Dimension>,
) -> Option<usize> {
    quantities
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed[*i])
        .filter(|(_, q)| match dimension {
            Some(d) => q.unit.is_some_and(|u| u.dimension() == d),
            None => true,
        })
        .min_by_key(|(_, q)| q.distance_to(mention.start, mention.end))
        .map(|(i, _)| i)
}

/// Sign an unsigned emissions change by the closest direction word.
/// Negative means emissions went down.
fn directed_change(sentence: &str, quantity: &Quantity) -> f64 {
    let closest = |re: &Regex| {
        re.find_iter(sentence)
            .map(|m| quantity.distance_to(m.start(), m.end()))
            .min()
    };
    let magnitude = quantity.value.abs();
    match (closest(&REDUCTION_WORDS), closest(&INCREASE_WORDS)) {
        (Some(down), Some(up)) if up < down => magnitude,
        (Some(_), _) => -magnitude,
        (None, Some(_)) => magnitude,
        (None, None) => quantity.value,
    }
}

/// Assign ids, attach baselines and drop repeated identical readings.
fn assemble(readings: Vec<Reading>) -> Vec<NormalizedMetric> {
    let claimed_kinds: BTreeSet<MetricKind> = readings
        .iter()
        .filter(|r| !r.is_baseline)
        .map(|r| r.kind)
        .collect();
    let mut baselines: BTreeMap<MetricKind, f64> = BTreeMap::new();
    for reading in readings.iter().filter(|r| r.is_baseline) {
        baselines.entry(reading.kind).or_insert(reading.value);
    }

    let mut per_kind: BTreeMap<MetricKind, u32> = BTreeMap::new();
    let mut metrics: Vec<NormalizedMetric> = Vec::new();

    for reading in readings {
        if reading.is_baseline
            && (claimed_kinds.contains(&reading.kind) || per_kind.contains_key(&reading.kind))
        {
            continue;
        }
        let repeated = metrics.iter().any(|m| {
            m.metric_kind == reading.kind
                && m.unit == reading.unit
                && (m.value - reading.value).abs() < VALUE_EPSILON
        });
        if repeated {
            continue;
        }

        let count = per_kind.entry(reading.kind).or_insert(0);
        *count += 1;
        let metric_id = if *count == 1 {
            reading.kind.as_str().to_string()
        } else {
            format!("{}.{}", reading.kind, count)
        };

        metrics.push(NormalizedMetric {
            metric_id,
            metric_kind: reading.kind,
            value: reading.value,
            unit: reading.unit,
            baseline: baselines.get(&reading.kind).copied(),
            confidence: reading.confidence,
            source_page: Some(reading.page),
        });
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::GREENWASHING_REPORT;

    fn normalize(text: &str) -> Vec<NormalizedMetric> {
        Normalizer::new().normalize(Uuid::new_v4(), text)
    }

    fn only(text: &str) -> NormalizedMetric {
        let metrics = normalize(text);
        assert_eq!(metrics.len(), 1, "{metrics:?}");
        metrics.into_iter().next().unwrap()
    }

    #[test]
    fn greenwashing_report_metrics() {
        let metrics = normalize(GREENWASHING_REPORT);
        let ids: Vec<&str> = metrics.iter().map(|m| m.metric_id.as_str()).collect();
        assert_eq!(
            ids,
            ["carbon_reduction", "renewable_energy", "scope1_emissions", "scope2_emissions"]
        );

        let carbon = &metrics[0];
        assert_eq!(carbon.value, -40.0);
        assert_eq!(carbon.unit, "pct");
        assert_eq!(carbon.baseline, Some(5.0));
        assert_eq!(carbon.confidence, confidence::NEAR);
        assert_eq!(carbon.source_page, Some(1));

        assert_eq!(metrics[1].value, 85.0);
        assert_eq!(metrics[2].value, 12_000.0);
        assert_eq!(metrics[2].unit, "tCO2e");
        assert_eq!(metrics[3].value, 8_500.0);
    }

    #[test]
    fn source_page_follows_page_breaks() {
        let text = format!(
            "Introduction without figures{PAGE_BREAK}Scope 3 emissions were 41,000 tCO2e."
        );
        let m = only(&text);
        assert_eq!(m.metric_kind, MetricKind::Scope3Emissions);
        assert_eq!(m.source_page, Some(2));
    }

    #[test]
    fn differing_mentions_get_suffixed_ids() {
        let metrics = normalize(
            "Scope 3 emissions were 41,000 tCO2e.\nScope 3 emissions were 41,000 tCO2e.\nScope 3 emissions reached 45,000 tCO2e.",
        );
        let ids: Vec<&str> = metrics.iter().map(|m| m.metric_id.as_str()).collect();
        assert_eq!(ids, ["scope3_emissions", "scope3_emissions.2"]);
        assert_eq!(metrics[1].value, 45_000.0);
    }

    #[test]
    fn missing_unit_is_ambiguous() {
        let m = only("Interest cover stood at 4.1 for the year.");
        assert_eq!(m.metric_kind, MetricKind::InterestCover);
        assert_eq!(m.unit, "x");
        assert_eq!(m.confidence, confidence::AMBIGUOUS);
    }

    #[test]
    fn incompatible_unit_is_ambiguous() {
        let m = only("Renewable energy purchases totalled 500 MWh.");
        assert_eq!(m.metric_kind, MetricKind::RenewableEnergy);
        assert_eq!(m.unit, "MWh");
        assert_eq!(m.confidence, confidence::AMBIGUOUS);
        assert!(!unit_matches(m.metric_kind, &m.unit));
    }

    #[test]
    fn distant_quantity_has_reduced_confidence() {
        let m = only(
            "Renewable electricity, which we source from wind and solar contracts signed across all of our European sites, reached 62%.",
        );
        assert_eq!(m.value, 62.0);
        assert_eq!(m.confidence, confidence::FAR);
    }

    #[test]
    fn baseline_without_claim_becomes_metric() {
        let m = only("Our base year water consumption reduction was independently audited at 12%.");
        assert_eq!(m.metric_kind, MetricKind::WaterReduction);
        assert_eq!(m.value, 12.0);
        assert_eq!(m.baseline, Some(12.0));
    }

    #[test]
    fn explicit_sign_wins_over_direction_words() {
        let m = only("Carbon emissions fell, a change of +3% against target.");
        assert_eq!(m.value, 3.0);
        let m = only("Carbon emissions rose by 7% in 2024.");
        assert_eq!(m.value, 7.0);
    }

    #[test]
    fn units_are_canonical() {
        let metrics = normalize(
            "Energy consumption was 1.2 GWh.\nGreen capex totalled €120m in 2024.\nWater withdrawal reached 3 ML.\nNet debt/EBITDA was 3.2x.",
        );
        assert_eq!(metrics.len(), 4);
        assert!((metrics[0].value - 1200.0).abs() < 1e-9);
        assert_eq!(metrics[0].unit, "MWh");
        assert_eq!(metrics[1].value, 120e6);
        assert_eq!(metrics[1].unit, "EUR");
        assert!(unit_matches(MetricKind::GreenCapex, &metrics[1].unit));
        assert_eq!(metrics[2].value, 3000.0);
        assert_eq!(metrics[2].unit, "m3");
        assert_eq!(metrics[3].metric_kind, MetricKind::LeverageRatio);
        assert_eq!(metrics[3].value, 3.2);
    }

    #[test]
    fn renormalizing_is_deterministic() {
        assert_eq!(normalize(GREENWASHING_REPORT), normalize(GREENWASHING_REPORT));
    }

    #[test]
    fn text_without_keywords_yields_nothing() {
        assert!(normalize("Revenue grew 12% and headcount reached 4,000.").is_empty());
    }
}
