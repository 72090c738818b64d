use thiserror::Error;
use uuid::Uuid;

use super::extraction::ExtractionError;
use super::ingest::IngestError;
use super::reasoning::ReferenceError;
use super::scoring::ScoringError;
use super::validation::{IngestOrValidation, ValidationError};
use crate::db::DatabaseError;
use crate::models::ErrorKind;

/// Every failure a pipeline operation can surface. Stage errors fold in
/// unchanged so callers keep their detail.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Reference data unavailable: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Processing of document {0} was cancelled")]
    Cancelled(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<IngestOrValidation> for PipelineError {
    fn from(err: IngestOrValidation) -> Self {
        match err {
            IngestOrValidation::Validation(e) => Self::Validation(e),
            IngestOrValidation::Ingest(e) => Self::Ingest(e),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ingest(e) => e.kind(),
            Self::Extraction(e) => e.kind(),
            Self::Validation(_) | Self::Scoring(_) => ErrorKind::ValidationError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Reference(_) | Self::Database(_) | Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Offending request field, when the failure is attributable to one.
    pub fn field(&self) -> Option<String> {
        match self {
            Self::Validation(e) => Some(e.field.clone()),
            Self::Scoring(e) => Some(e.field().to_string()),
            Self::Ingest(e) => e.field().map(str::to_string),
            Self::Extraction(ExtractionError::StrategyDisabled(_)) => Some("strategy".into()),
            Self::NotFound(_) => Some("documentId".into()),
            _ => None,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, reason))
    }
}
