use serde::{Deserialize, Serialize};

use super::enums::ClaimType;

/// A suspicious or contradictory statement surfaced by the reasoner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub claim_text: String,
    pub claim_type: ClaimType,
    pub severity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Texts of the claims this one contradicts. Always symmetric.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contradictions: Vec<String>,
    /// Metric the claim was derived from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_id: Option<String>,
}

impl Claim {
    pub fn new(claim_type: ClaimType, claim_text: impl Into<String>, severity: f64) -> Self {
        Self {
            claim_text: claim_text.into(),
            claim_type,
            severity: severity.clamp(0.0, 1.0),
            explanation: None,
            contradictions: Vec::new(),
            metric_id: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn for_metric(mut self, metric_id: impl Into<String>) -> Self {
        self.metric_id = Some(metric_id.into());
        self
    }
}
