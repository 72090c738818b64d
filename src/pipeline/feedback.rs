//! Feedback loop: advisory weight and threshold hints from analyst
//! corrections. Suggestions are returned to the caller and logged; they are
//! never applied to a stored score.

use crate::models::{OutcomeLabel, RiskLevel, RiskScore, ScoreComponent};

/// Corrections smaller than this many points produce no weight hints.
pub const MIN_ACTIONABLE_DELTA: f64 = 5.0;

/// Share of the explained score a component must carry to get a hint.
pub const MIN_COMPONENT_SHARE: f64 = 0.25;

#[derive(Debug, Clone, Copy)]
pub struct FeedbackAdvisor {
    enabled: bool,
}

impl FeedbackAdvisor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// `None` when learning is disabled or nothing is worth suggesting.
    pub fn suggest(
        &self,
        score: &RiskScore,
        corrected_score: Option<f64>,
        outcome: Option<OutcomeLabel>,
    ) -> Option<Vec<String>> {
        if !self.enabled {
            return None;
        }

        let mut hints = Vec::new();
        if let Some(corrected) = corrected_score {
            let delta = corrected - score.score;
            if delta.abs() >= MIN_ACTIONABLE_DELTA {
                hints.extend(weight_hints(score, delta));
                hints.extend(threshold_hint(score.risk_level, corrected));
            }
        }
        hints.extend(outcome.and_then(|label| outcome_hint(score, label)));

        tracing::info!(
            document_id = %score.document_id,
            score_id = %score.score_id,
            suggestions = hints.len(),
            "Feedback suggestions computed"
        );
        (!hints.is_empty()).then_some(hints)
    }
}

/// Shares of the explained score per component. Falls back to the weights
/// when nothing contributed.
fn component_shares(score: &RiskScore) -> Vec<(ScoreComponent, f64)> {
    let components = &score.explanation_tree.components;
    let total: f64 = components.values().map(|c| c.contribution).sum();
    if total > 0.0 {
        components
            .iter()
            .map(|(component, c)| (*component, c.contribution / total))
            .collect()
    } else {
        score
            .weight_breakdown
            .iter()
            .map(|(component, weight)| (*component, *weight))
            .collect()
    }
}

fn weight_hints(score: &RiskScore, delta: f64) -> Vec<String> {
    let (direction, error) = if delta < 0.0 {
        ("decreasing", "overestimate")
    } else {
        ("increasing", "underestimate")
    };

    component_shares(score)
        .into_iter()
        .filter(|(_, share)| *share >= MIN_COMPONENT_SHARE - 1e-9)
        .map(|(component, share)| {
            let weight = score.weight_breakdown.get(&component).copied().unwrap_or(0.0);
            format!(
                "Consider {direction} the {component} weight ({weight:.2}): it accounts for \
                 {:.1} of the {:.1}-point {error}",
                (delta * share).abs(),
                delta.abs()
            )
        })
        .collect()
}

fn threshold_hint(assessed: RiskLevel, corrected: f64) -> Option<String> {
    let corrected_level = RiskLevel::from_score(corrected);
    if corrected_level == assessed {
        return None;
    }
    let boundary = match (assessed, corrected_level) {
        (RiskLevel::Low, RiskLevel::Medium) | (RiskLevel::Medium, RiskLevel::Low) => {
            RiskLevel::MEDIUM_FROM
        }
        (RiskLevel::Low, RiskLevel::High) | (RiskLevel::High, RiskLevel::Low) => {
            return Some(format!(
                "Corrected score {corrected:.2} moves the document from {assessed} to \
                 {corrected_level}; review both the {} and {} band thresholds",
                RiskLevel::MEDIUM_FROM,
                RiskLevel::HIGH_FROM
            ));
        }
        _ => RiskLevel::HIGH_FROM,
    };
    Some(format!(
        "Corrected score {corrected:.2} moves the document from {assessed} to \
         {corrected_level}; review the {boundary} band threshold"
    ))
}

fn outcome_hint(score: &RiskScore, label: OutcomeLabel) -> Option<String> {
    let top_claim = score
        .explanation_tree
        .components
        .values()
        .flat_map(|c| c.contributors.iter())
        .max_by(|a, b| a.impact.total_cmp(&b.impact));

    match label {
        OutcomeLabel::FalsePositive => Some(match top_claim {
            Some(claim) => format!(
                "Marked as a false positive: review the {} check behind \"{}\"",
                claim.claim_type, claim.claim_text
            ),
            None => "Marked as a false positive with no contributing claims".to_string(),
        }),
        OutcomeLabel::FalseNegative => Some(
            "Marked as a false negative: check the extraction and disclosure coverage \
             for risks the reasoner missed"
                .to_string(),
        ),
        OutcomeLabel::ConfirmedRisk if score.risk_level != RiskLevel::High => Some(format!(
            "Risk confirmed on a {} assessment: the current weights may understate it",
            score.risk_level
        )),
        OutcomeLabel::ConfirmedRisk | OutcomeLabel::Inconclusive => None,
    }
}
