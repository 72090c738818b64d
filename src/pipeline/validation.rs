//! Boundary payloads and their validation.
//!
//! Requests arrive as loosely typed JSON (strings for enums and ids). Each
//! `validate` turns one into the typed input of its stage, or names the
//! first offending field (`claims[2].severity`).

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use super::ingest::IngestError;
use crate::models::{Claim, ClaimType, ExtractionStrategy, MetricKind, NormalizedMetric, OutcomeLabel};

pub const MAX_FILENAME_CHARS: usize = 255;
pub const MAX_USER_NOTES_CHARS: usize = 4000;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn parse_document_id(raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::new("documentId", "must be a UUID"))
}

fn check_unit_interval(field: impl FnOnce() -> String, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(field(), "must be within 0-1"))
    }
}

fn parse_enum<T: FromStr>(field: impl FnOnce() -> String, raw: &str, expected: &str) -> Result<T, ValidationError> {
    T::from_str(raw).map_err(|_| ValidationError::new(field(), format!("unknown value '{raw}', expected {expected}")))
}

fn expected_values<T: ToString>(all: &[T]) -> String {
    all.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub filename: String,
    pub mime_type: String,
    /// Base64 file bytes.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestInput {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl IngestRequest {
    pub fn validate(self) -> Result<IngestInput, IngestOrValidation> {
        let filename = self.filename.trim();
        if filename.is_empty() {
            return Err(ValidationError::new("filename", "must not be empty").into());
        }
        if filename.chars().count() > MAX_FILENAME_CHARS {
            return Err(ValidationError::new(
                "filename",
                format!("must be at most {MAX_FILENAME_CHARS} characters"),
            )
            .into());
        }
        if self.mime_type.trim().is_empty() {
            return Err(ValidationError::new("mimeType", "must not be empty").into());
        }

        let content = self.content.trim();
        // Accept data URLs as produced by browser file readers
        let payload = match content.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => content,
        };
        if payload.is_empty() {
            return Err(IngestError::EmptyContent.into());
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| IngestError::InvalidEncoding(e.to_string()))?;

        Ok(IngestInput {
            filename: filename.to_string(),
            mime_type: self.mime_type.trim().to_string(),
            bytes,
        })
    }
}

/// Ingest payloads fail either on shape or on content.
#[derive(Error, Debug)]
pub enum IngestOrValidation {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

// ---------------------------------------------------------------------------
// Extract / Normalize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub document_id: String,
    #[serde(default)]
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractInput {
    pub document_id: Uuid,
    pub strategy: Option<ExtractionStrategy>,
}

impl ExtractRequest {
    pub fn validate(self) -> Result<ExtractInput, ValidationError> {
        let document_id = parse_document_id(&self.document_id)?;
        let strategy = self
            .strategy
            .as_deref()
            .map(|raw| {
                parse_enum(|| "strategy".into(), raw, &expected_values(ExtractionStrategy::ALL))
            })
            .transpose()?;
        Ok(ExtractInput { document_id, strategy })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeRequest {
    pub document_id: String,
    pub extracted_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeInput {
    pub document_id: Uuid,
    pub extracted_text: String,
}

impl NormalizeRequest {
    pub fn validate(self) -> Result<NormalizeInput, ValidationError> {
        Ok(NormalizeInput {
            document_id: parse_document_id(&self.document_id)?,
            extracted_text: self.extracted_text,
        })
    }
}

// ---------------------------------------------------------------------------
// Reason
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPayload {
    pub metric_id: String,
    /// Derived from the id prefix when absent.
    #[serde(default)]
    pub metric_kind: Option<String>,
    pub value: f64,
    pub unit: String,
    #[serde(default)]
    pub baseline: Option<f64>,
    pub confidence: f64,
    #[serde(default)]
    pub source_page: Option<u32>,
}

impl MetricPayload {
    fn validate(self, index: usize) -> Result<NormalizedMetric, ValidationError> {
        let field = |name: &str| format!("normalizedMetrics[{index}].{name}");
        if self.metric_id.trim().is_empty() {
            return Err(ValidationError::new(field("metricId"), "must not be empty"));
        }
        let kind_source = match &self.metric_kind {
            Some(kind) => kind.as_str(),
            None => self.metric_id.split('.').next().unwrap_or_default(),
        };
        let metric_kind: MetricKind = parse_enum(
            || field("metricKind"),
            kind_source,
            &expected_values(MetricKind::ALL),
        )?;
        if !self.value.is_finite() {
            return Err(ValidationError::new(field("value"), "must be a finite number"));
        }
        if self.baseline.is_some_and(|b| !b.is_finite()) {
            return Err(ValidationError::new(field("baseline"), "must be a finite number"));
        }
        check_unit_interval(|| field("confidence"), self.confidence)?;

        Ok(NormalizedMetric {
            metric_id: self.metric_id,
            metric_kind,
            value: self.value,
            unit: self.unit,
            baseline: self.baseline,
            confidence: self.confidence,
            source_page: self.source_page,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRequest {
    pub document_id: String,
    pub normalized_metrics: Vec<MetricPayload>,
    pub extracted_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReasonInput {
    pub document_id: Uuid,
    pub metrics: Vec<NormalizedMetric>,
    pub extracted_text: String,
}

impl ReasonRequest {
    pub fn validate(self) -> Result<ReasonInput, ValidationError> {
        let document_id = parse_document_id(&self.document_id)?;
        let metrics = self
            .normalized_metrics
            .into_iter()
            .enumerate()
            .map(|(i, m)| m.validate(i))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = std::collections::BTreeSet::new();
        for (i, metric) in metrics.iter().enumerate() {
            if !seen.insert(metric.metric_id.as_str()) {
                return Err(ValidationError::new(
                    format!("normalizedMetrics[{i}].metricId"),
                    format!("duplicate metric id '{}'", metric.metric_id),
                ));
            }
        }

        Ok(ReasonInput {
            document_id,
            metrics,
            extracted_text: self.extracted_text,
        })
    }
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPayload {
    pub claim_text: String,
    pub claim_type: String,
    pub severity: f64,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub contradictions: Vec<String>,
    #[serde(default)]
    pub metric_id: Option<String>,
}

impl ClaimPayload {
    fn validate(self, index: usize) -> Result<Claim, ValidationError> {
        let field = |name: &str| format!("claims[{index}].{name}");
        if self.claim_text.trim().is_empty() {
            return Err(ValidationError::new(field("claimText"), "must not be empty"));
        }
        let claim_type: ClaimType = parse_enum(
            || field("claimType"),
            &self.claim_type,
            &expected_values(ClaimType::ALL),
        )?;
        check_unit_interval(|| field("severity"), self.severity)?;

        Ok(Claim {
            claim_text: self.claim_text,
            claim_type,
            severity: self.severity,
            explanation: self.explanation,
            contradictions: self.contradictions,
            metric_id: self.metric_id,
        })
    }
}

impl From<Claim> for ClaimPayload {
    fn from(claim: Claim) -> Self {
        Self {
            claim_text: claim.claim_text,
            claim_type: claim.claim_type.to_string(),
            severity: claim.severity,
            explanation: claim.explanation,
            contradictions: claim.contradictions,
            metric_id: claim.metric_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub document_id: String,
    pub claims: Vec<ClaimPayload>,
    #[serde(default)]
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInput {
    pub document_id: Uuid,
    pub claims: Vec<Claim>,
    pub confidence_scores: BTreeMap<ClaimType, f64>,
    pub options: super::scoring::ScoreOptions,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ScoreRequest {
    pub fn validate(self) -> Result<ScoreInput, ValidationError> {
        let document_id = parse_document_id(&self.document_id)?;
        let claims = self
            .claims
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.validate(i))
            .collect::<Result<Vec<_>, _>>()?;

        let mut confidence_scores = BTreeMap::new();
        for (key, value) in self.confidence_scores {
            let field = || format!("confidenceScores.{key}");
            let claim_type: ClaimType =
                parse_enum(field, &key, &expected_values(ClaimType::ALL))?;
            check_unit_interval(field, value)?;
            confidence_scores.insert(claim_type, value);
        }

        // Weight semantics are checked by the scorer; reject malformed
        // numbers here so the field path reaches the caller unchanged.
        let options = super::scoring::ScoreOptions {
            industry: non_blank(self.industry),
            jurisdiction: non_blank(self.jurisdiction),
            weights: self.weights,
        };
        if let Some(weights) = &options.weights {
            super::scoring::weights::parse_override(weights)
                .map_err(|e| ValidationError::new(e.field(), e.to_string()))?;
        }

        Ok(ScoreInput {
            document_id,
            claims,
            confidence_scores,
            options,
        })
    }
}

// ---------------------------------------------------------------------------
// Whole-document run
// ---------------------------------------------------------------------------

/// Body of `POST /api/documents/{id}/process`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

impl ProcessRequest {
    pub fn validate(self) -> Result<super::processor::RunOptions, ValidationError> {
        let strategy = self
            .strategy
            .as_deref()
            .map(|raw| parse_enum(|| "strategy".into(), raw, &expected_values(ExtractionStrategy::ALL)))
            .transpose()?;
        Ok(super::processor::RunOptions {
            strategy,
            scoring: super::scoring::ScoreOptions {
                industry: non_blank(self.industry),
                jurisdiction: non_blank(self.jurisdiction),
                weights: None,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub document_id: String,
    pub original_score: f64,
    #[serde(default)]
    pub corrected_score: Option<f64>,
    #[serde(default)]
    pub outcome_label: Option<String>,
    #[serde(default)]
    pub user_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackInput {
    pub document_id: Uuid,
    pub original_score: f64,
    pub corrected_score: Option<f64>,
    pub outcome_label: Option<OutcomeLabel>,
    pub user_notes: Option<String>,
}

fn check_score(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(field, "must be within 0-100"))
    }
}

impl FeedbackRequest {
    pub fn validate(self) -> Result<FeedbackInput, ValidationError> {
        let document_id = parse_document_id(&self.document_id)?;
        check_score("originalScore", self.original_score)?;
        if let Some(corrected) = self.corrected_score {
            check_score("correctedScore", corrected)?;
        }
        let outcome_label = self
            .outcome_label
            .as_deref()
            .map(|raw| parse_enum(|| "outcomeLabel".into(), raw, &expected_values(OutcomeLabel::ALL)))
            .transpose()?;
        if let Some(notes) = &self.user_notes {
            if notes.chars().count() > MAX_USER_NOTES_CHARS {
                return Err(ValidationError::new(
                    "userNotes",
                    format!("must be at most {MAX_USER_NOTES_CHARS} characters"),
                ));
            }
        }

        Ok(FeedbackInput {
            document_id,
            original_score: self.original_score,
            corrected_score: self.corrected_score,
            outcome_label,
            user_notes: self.user_notes,
        })
    }
}
