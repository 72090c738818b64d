use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ClaimType, RiskLevel, ScoreComponent};

/// A stored, versioned risk assessment of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    pub document_id: Uuid,
    pub score_id: Uuid,
    pub version: u32,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub weight_breakdown: BTreeMap<ScoreComponent, f64>,
    pub explanation_tree: ExplanationTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationTree {
    pub components: BTreeMap<ScoreComponent, ComponentExplanation>,
    pub total: f64,
    pub risk_level: RiskLevel,
    /// Set when a top-band claim lifted the weighted sum to the HIGH band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_floor: Option<SeverityFloor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityFloor {
    pub claim_text: String,
    pub claim_type: ClaimType,
    pub severity: f64,
    pub confidence: f64,
    /// Weighted sum before the floor.
    pub weighted_total: f64,
    pub floor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentExplanation {
    pub weight: f64,
    /// Component score in [0, 100].
    pub score: f64,
    /// weight × score, the points this component adds to the total.
    pub contribution: f64,
    pub contributors: Vec<ClaimContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimContribution {
    pub claim_text: String,
    pub claim_type: ClaimType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_id: Option<String>,
    pub severity: f64,
    pub confidence: f64,
    /// severity × confidence
    pub impact: f64,
}
