use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::OutcomeLabel;

/// Analyst outcome recorded against a stored risk score. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub feedback_id: Uuid,
    pub document_id: Uuid,
    pub score_id: Uuid,
    pub original_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_label: Option<OutcomeLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment_suggestions: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}
