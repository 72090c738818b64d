//! Stage 5: weighted, explainable risk score.

pub mod explanation;
pub mod weights;

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Claim, ClaimType, ExplanationTree, RiskLevel, RiskScore, ScoreComponent};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Invalid weights ({field}): {reason}")]
    InvalidWeights { field: String, reason: String },
}

impl ScoringError {
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidWeights { field, .. } => field,
        }
    }
}

/// Caller-supplied scoring options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreOptions {
    pub industry: Option<String>,
    pub jurisdiction: Option<String>,
    pub weights: Option<BTreeMap<String, f64>>,
}

/// Scorer output before it is stored as a versioned `RiskScore`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreComputation {
    pub score: f64,
    pub risk_level: RiskLevel,
    pub weight_breakdown: BTreeMap<ScoreComponent, f64>,
    pub explanation_tree: ExplanationTree,
    pub industry: Option<String>,
    pub jurisdiction: Option<String>,
}

impl ScoreComputation {
    pub fn into_risk_score(self, document_id: Uuid, version: u32) -> RiskScore {
        RiskScore {
            document_id,
            score_id: Uuid::new_v4(),
            version,
            score: self.score,
            risk_level: self.risk_level,
            weight_breakdown: self.weight_breakdown,
            explanation_tree: self.explanation_tree,
            industry: self.industry,
            jurisdiction: self.jurisdiction,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic: identical inputs give identical output.
    pub fn score(
        &self,
        claims: &[Claim],
        confidence_scores: &BTreeMap<ClaimType, f64>,
        options: &ScoreOptions,
    ) -> Result<ScoreComputation, ScoringError> {
        let weight_breakdown = weights::resolve_weights(
            options.weights.as_ref(),
            options.industry.as_deref(),
            options.jurisdiction.as_deref(),
        )?;

        let by_component = explanation::contributions(claims, confidence_scores);
        let explanation_tree = explanation::build_tree(&weight_breakdown, by_component);

        Ok(ScoreComputation {
            score: explanation_tree.total,
            risk_level: explanation_tree.risk_level,
            weight_breakdown,
            explanation_tree,
            industry: options.industry.clone(),
            jurisdiction: options.jurisdiction.clone(),
        })
    }
}
