use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ErrorKind, PipelineStage, ProcessingStatus};
use super::fingerprint::DocumentFingerprint;

/// Public view of a document's lifecycle, returned by status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub document_id: Uuid,
    pub status: ProcessingStatus,
    pub fingerprint: DocumentFingerprint,
    pub progress: StageProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
    /// Earlier document with identical bytes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub reason: String,
}

/// Which stages have completed for the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub ingest: bool,
    pub extract: bool,
    pub normalize: bool,
    pub reason: bool,
    pub score: bool,
}

impl StageProgress {
    pub fn ingested() -> Self {
        Self {
            ingest: true,
            ..Self::default()
        }
    }

    pub fn complete() -> Self {
        Self {
            ingest: true,
            extract: true,
            normalize: true,
            reason: true,
            score: true,
        }
    }

    pub fn mark(&mut self, stage: PipelineStage) {
        match stage {
            PipelineStage::Ingest => self.ingest = true,
            PipelineStage::Extract => self.extract = true,
            PipelineStage::Normalize => self.normalize = true,
            PipelineStage::Reason => self.reason = true,
            PipelineStage::Score => self.score = true,
        }
    }
}
