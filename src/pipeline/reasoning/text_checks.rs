//! Checks over the report text: outcome assertions, conflicting figures,
//! certifications and assurance.

use std::sync::LazyLock;

use regex::Regex;

use super::display_value;
use crate::models::{Claim, ClaimType, MetricKind, NormalizedMetric};
use crate::pipeline::normalize::parser::split_sentences;

pub const UNSUPPORTED_ASSERTION_SEVERITY: f64 = 0.6;
pub const ASSERTION_CONTRADICTION_SEVERITY: f64 = 0.8;
pub const FIGURE_CONTRADICTION_SEVERITY: f64 = 0.7;
pub const EXPIRED_CERTIFICATION_SEVERITY: f64 = 0.6;
pub const UNVERIFIED_DATA_SEVERITY: f64 = 0.7;

/// Percentage figures further apart than this many points conflict.
const PCT_POINTS_TOLERANCE: f64 = 5.0;
/// Other figures conflict above this relative difference.
const RELATIVE_TOLERANCE: f64 = 0.10;

/// An outcome claim that a report must back with figures.
struct Assertion {
    pattern: Regex,
    supported_by: &'static [MetricKind],
    /// A supporting metric that proves the assertion wrong.
    contradicted_by: fn(&NormalizedMetric) -> bool,
}

fn emissions_went_up(metric: &NormalizedMetric) -> bool {
    metric.metric_kind == MetricKind::CarbonReduction
        && (metric.value > 0.0 || metric.baseline.is_some_and(|b| b > 0.0))
}

fn renewable_below_full(metric: &NormalizedMetric) -> bool {
    metric.metric_kind == MetricKind::RenewableEnergy && metric.unit == "pct" && metric.value < 100.0
}

fn never(_: &NormalizedMetric) -> bool {
    false
}

static ASSERTIONS: LazyLock<Vec<Assertion>> = LazyLock::new(|| {
    let pattern = |p: &str| Regex::new(&format!("(?i){p}")).expect("static regex");
    vec![
        Assertion {
            pattern: pattern(r"\b(?:carbon[- ]neutral(?:ity)?|net[- ]zero|climate[- ]positive|carbon[- ]negative)\b"),
            supported_by: &[
                MetricKind::CarbonReduction,
                MetricKind::Scope1Emissions,
                MetricKind::Scope2Emissions,
                MetricKind::Scope3Emissions,
            ],
            contradicted_by: emissions_went_up,
        },
        Assertion {
            pattern: pattern(r"\b(?:100\s?%\s+renewable|fully\s+renewable)\b"),
            supported_by: &[MetricKind::RenewableEnergy],
            contradicted_by: renewable_below_full,
        },
        Assertion {
            pattern: pattern(r"\bzero[- ]waste\b"),
            supported_by: &[MetricKind::WasteRecycling],
            contradicted_by: never,
        },
        Assertion {
            pattern: pattern(r"\bwater[- ](?:positive|neutral)\b"),
            supported_by: &[MetricKind::WaterReduction, MetricKind::WaterWithdrawal],
            contradicted_by: never,
        },
    ]
});

static CERTIFICATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ISO\s?\d{4,5}(?::\d{4})?|B[- ]?Corp|EMAS|SBTi|LEED|BREEAM)\b")
        .expect("static regex")
});
static EXPIRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:expired|lapsed|no longer valid|revoked|suspended|withdrawn)\b")
        .expect("static regex")
});
static ASSURANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:independent(?:ly)?|third[- ]party|external(?:ly)?|limited|reasonable)\s+(?:assurance|verif\w*|audit\w*|assured|verified|audited)\b|\b(?:assured|verified)\s+by\b",
    )
    .expect("static regex")
});

/// All text-level claims, in check order.
pub fn check_text(text: &str, metrics: &[NormalizedMetric]) -> Vec<Claim> {
    let sentences = split_sentences(text);
    let mut claims = Vec::new();
    claims.extend(outcome_assertions(&sentences, metrics));
    claims.extend(conflicting_figures(metrics));
    claims.extend(expired_certifications(&sentences));
    claims.extend(missing_assurance(text));
    claims
}

/// Claim text for a finding inside `sentence`. Contradictions point at
/// claim texts, so findings sharing a sentence carry the matched span.
fn anchored(sentence: &str, span: &str) -> String {
    format!("{sentence} [{span}]")
}

// ---------------------------------------------------------------------------
// [5] OUTCOME assertions
// ---------------------------------------------------------------------------

fn outcome_assertions(sentences: &[&str], metrics: &[NormalizedMetric]) -> Vec<Claim> {
    let mut claims: Vec<Claim> = Vec::new();

    for assertion in ASSERTIONS.iter() {
        let Some((sentence, phrase)) = sentences.iter().find_map(|s| {
            assertion.pattern.find(s).map(|m| (*s, m.as_str().to_lowercase()))
        }) else {
            continue;
        };

        let supporting: Vec<&NormalizedMetric> = metrics
            .iter()
            .filter(|m| assertion.supported_by.contains(&m.metric_kind))
            .collect();

        if supporting.is_empty() {
            claims.push(
                Claim::new(
                    ClaimType::UnsupportedAssertion,
                    anchored(sentence, &phrase),
                    UNSUPPORTED_ASSERTION_SEVERITY,
                )
                .with_explanation(format!("'{phrase}' is not backed by any reported metric")),
            );
            continue;
        }

        let Some(conflicting) = supporting
            .into_iter()
            .find(|m| (assertion.contradicted_by)(*m))
        else {
            continue;
        };

        let shown = match conflicting.baseline {
            Some(b) if conflicting.value <= 0.0 => format!("verified baseline {}", display_value(b, &conflicting.unit)),
            _ => display_value(conflicting.value, &conflicting.unit),
        };
        let figure_text = format!(
            "{} figure {} ({}) conflicts with the '{}' assertion",
            conflicting.metric_kind.label(),
            shown,
            conflicting.metric_id,
            phrase
        );

        let mut assertion_claim = Claim::new(
            ClaimType::InternalContradiction,
            anchored(sentence, &phrase),
            ASSERTION_CONTRADICTION_SEVERITY,
        )
        .with_explanation(format!("'{phrase}' is contradicted by reported figures"));
        assertion_claim.contradictions.push(figure_text.clone());

        let mut figure_claim = Claim::new(
            ClaimType::InternalContradiction,
            figure_text,
            ASSERTION_CONTRADICTION_SEVERITY,
        )
        .for_metric(&conflicting.metric_id);
        figure_claim.contradictions.push(assertion_claim.claim_text.clone());

        claims.push(assertion_claim);
        claims.push(figure_claim);
    }
    claims
}

// ---------------------------------------------------------------------------
// [6] CONFLICTING figures of the same kind
// ---------------------------------------------------------------------------

fn figures_conflict(a: &NormalizedMetric, b: &NormalizedMetric) -> bool {
    if a.unit != b.unit {
        return false;
    }
    let gap = (a.value - b.value).abs();
    if a.unit == "pct" {
        gap > PCT_POINTS_TOLERANCE
    } else {
        let scale = a.value.abs().max(b.value.abs());
        scale > 0.0 && gap / scale > RELATIVE_TOLERANCE
    }
}

fn conflicting_figures(metrics: &[NormalizedMetric]) -> Vec<Claim> {
    let text_of = |m: &NormalizedMetric| {
        format!(
            "Conflicting {} figure of {} ({})",
            m.metric_kind.label(),
            display_value(m.value, &m.unit),
            m.metric_id
        )
    };

    let mut claims = Vec::new();
    for (i, metric) in metrics.iter().enumerate() {
        let others: Vec<String> = metrics
            .iter()
            .enumerate()
            .filter(|(j, other)| {
                *j != i && other.metric_kind == metric.metric_kind && figures_conflict(metric, other)
            })
            .map(|(_, other)| text_of(other))
            .collect();
        if others.is_empty() {
            continue;
        }
        let mut claim = Claim::new(
            ClaimType::InternalContradiction,
            text_of(metric),
            FIGURE_CONTRADICTION_SEVERITY,
        )
        .with_explanation(format!(
            "{} mentions of {} disagree",
            others.len() + 1,
            metric.metric_kind.label()
        ))
        .for_metric(&metric.metric_id);
        claim.contradictions = others;
        claims.push(claim);
    }
    claims
}

// ---------------------------------------------------------------------------
// [7] EXPIRED certifications
// ---------------------------------------------------------------------------

fn expired_certifications(sentences: &[&str]) -> Vec<Claim> {
    let mut seen: Vec<String> = Vec::new();
    let mut claims = Vec::new();
    for sentence in sentences {
        if !EXPIRY.is_match(sentence) {
            continue;
        }
        for cert in CERTIFICATION.find_iter(sentence) {
            let name = cert.as_str().to_uppercase();
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());
            claims.push(
                Claim::new(
                    ClaimType::ExpiredCertification,
                    anchored(sentence, &name),
                    EXPIRED_CERTIFICATION_SEVERITY,
                )
                .with_explanation(format!("{name} is cited but marked as no longer valid")),
            );
        }
    }
    claims
}

// ---------------------------------------------------------------------------
// [8] MISSING assurance
// ---------------------------------------------------------------------------

fn missing_assurance(text: &str) -> Option<Claim> {
    if ASSURANCE.is_match(text) {
        return None;
    }
    Some(
        Claim::new(
            ClaimType::UnverifiedData,
            "No third-party assurance statement found",
            UNVERIFIED_DATA_SEVERITY,
        )
        .with_explanation("reported figures are not independently verified"),
    )
}
