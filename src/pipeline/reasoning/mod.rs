//! Stage 4: surfaces suspicious or contradictory claims.
//!
//! Metric-level checks run per metric in metric order, then text-level
//! checks, then absence checks against the required disclosures.

pub mod metric_checks;
pub mod reference;
pub mod text_checks;

pub use reference::{BenchmarkData, ReferenceError};

use uuid::Uuid;

use crate::models::{Claim, ClaimType, NormalizedMetric};

/// Render a value with its unit the way claim texts show it.
pub fn display_value(value: f64, unit: &str) -> String {
    match unit {
        "pct" => format!("{value}%"),
        "x" => format!("{value}x"),
        _ => format!("{value} {unit}"),
    }
}

/// Claim counts per category, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimCounts {
    pub metric_level: usize,
    pub text_level: usize,
    pub absence: usize,
}

pub struct Reasoner {
    reference: BenchmarkData,
}

impl Reasoner {
    pub fn new(reference: BenchmarkData) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &BenchmarkData {
        &self.reference
    }

    /// Deterministic, ordered claims for a document.
    pub fn reason(
        &self,
        document_id: Uuid,
        metrics: &[NormalizedMetric],
        extracted_text: &str,
    ) -> Vec<Claim> {
        let metric_level: Vec<Claim> = metrics
            .iter()
            .flat_map(|m| metric_checks::check_metric(m, &self.reference))
            .collect();
        let text_level = text_checks::check_text(extracted_text, metrics);
        let absence = self.missing_disclosures(metrics);

        let counts = ClaimCounts {
            metric_level: metric_level.len(),
            text_level: text_level.len(),
            absence: absence.len(),
        };

        let mut claims: Vec<Claim> = metric_level
            .into_iter()
            .chain(text_level)
            .chain(absence)
            .collect();
        link_contradictions(&mut claims);

        tracing::info!(
            document_id = %document_id,
            metric_level = counts.metric_level,
            text_level = counts.text_level,
            absence = counts.absence,
            max_severity = claims.iter().map(|c| c.severity).fold(0.0, f64::max),
            "Reasoning complete"
        );
        claims
    }

    fn missing_disclosures(&self, metrics: &[NormalizedMetric]) -> Vec<Claim> {
        self.reference
            .required_disclosures
            .iter()
            .filter(|d| !metrics.iter().any(|m| m.metric_kind == d.metric_kind))
            .map(|d| {
                Claim::new(
                    ClaimType::MissingDisclosure,
                    format!("No {} reported", d.label),
                    d.severity,
                )
                .with_explanation(format!("{} is a required disclosure", d.metric_kind))
            })
            .collect()
    }
}

/// Make every cross-reference two-way and drop references to claims
/// that are not in the set.
pub fn link_contradictions(claims: &mut [Claim]) {
    let texts: Vec<String> = claims.iter().map(|c| c.claim_text.clone()).collect();
    for claim in claims.iter_mut() {
        claim.contradictions.retain(|t| texts.contains(t));
    }

    let mut missing: Vec<(usize, String)> = Vec::new();
    for claim in claims.iter() {
        for target in &claim.contradictions {
            for (j, other) in claims.iter().enumerate() {
                if &other.claim_text == target && !other.contradictions.contains(&claim.claim_text) {
                    missing.push((j, claim.claim_text.clone()));
                }
            }
        }
    }
    for (j, text) in missing {
        if !claims[j].contradictions.contains(&text) {
            claims[j].contradictions.push(text);
        }
    }
}
