//! In-process registry of ingested documents and their committed artifacts.
//!
//! All state transitions happen under the registry write lock, so a run's
//! commit and a cancel of the same document never interleave. Stage
//! operations hold a [`StageLease`] so they never overlap a run or each
//! other on the same document.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Claim, ClaimType, DocumentFingerprint, DocumentStatus, ErrorKind, FailureInfo, NormalizedMetric,
    PipelineStage, ProcessingStatus, StageProgress,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::extraction::ExtractionResult;

/// Handle on the run currently owning a document.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: u64,
    pub cancelled: Arc<AtomicBool>,
    task: Option<tokio::task::AbortHandle>,
}

impl RunHandle {
    fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Committed output of a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommittedArtifacts {
    pub extraction: Option<ExtractionResult>,
    pub metrics: Vec<NormalizedMetric>,
    pub claims: Vec<Claim>,
    pub confidence_scores: BTreeMap<ClaimType, f64>,
}

#[derive(Debug)]
pub struct DocumentEntry {
    pub document_id: Uuid,
    pub fingerprint: DocumentFingerprint,
    pub status: ProcessingStatus,
    pub progress: StageProgress,
    pub failure: Option<FailureInfo>,
    pub duplicate_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the document reached completed or failed.
    pub finished_at: Option<DateTime<Utc>>,
    /// Staged upload. Dropped on cancel and once retention runs out.
    bytes: Option<Arc<Vec<u8>>>,
    run: Option<RunHandle>,
    artifacts: CommittedArtifacts,
    stage_active: bool,
    /// Set by reset; the next run must not reuse cached artifacts.
    recompute: bool,
}

impl DocumentEntry {
    pub fn status_view(&self) -> DocumentStatus {
        DocumentStatus {
            document_id: self.document_id,
            status: self.status,
            fingerprint: self.fingerprint.clone(),
            progress: self.progress,
            failure: self.failure.clone(),
            duplicate_of: self.duplicate_of,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        self.bytes.clone()
    }

    pub fn artifacts(&self) -> &CommittedArtifacts {
        &self.artifacts
    }

    /// Whether `run_id` still owns this document.
    pub fn is_current_run(&self, run_id: u64) -> bool {
        self.status == ProcessingStatus::Processing
            && self
                .run
                .as_ref()
                .is_some_and(|r| r.run_id == run_id && !r.cancelled.load(Ordering::SeqCst))
    }

    fn transition(&mut self, next: ProcessingStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::validation(
                "documentId",
                format!("document is {}, cannot move to {next}", self.status),
            ));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// pending → processing, owned by a new run.
    pub fn begin_run(&mut self, run_id: u64) -> Result<Arc<AtomicBool>, PipelineError> {
        if self.stage_active {
            return Err(PipelineError::validation("documentId", "a stage operation is running on this document"));
        }
        match self.status {
            ProcessingStatus::Pending => {}
            ProcessingStatus::Processing => {
                return Err(PipelineError::validation("documentId", "document is already processing"))
            }
            ProcessingStatus::Completed | ProcessingStatus::Failed => {
                return Err(PipelineError::validation(
                    "documentId",
                    format!("document is {}; reprocess it to run again", self.status),
                ))
            }
        }
        if self.bytes.is_none() {
            return Err(PipelineError::validation("documentId", "staged content is no longer available"));
        }
        self.transition(ProcessingStatus::Processing)?;
        self.finished_at = None;
        let cancelled = Arc::new(AtomicBool::new(false));
        self.run = Some(RunHandle {
            run_id,
            cancelled: Arc::clone(&cancelled),
            task: None,
        });
        Ok(cancelled)
    }

    /// Claim the document for one stage operation.
    fn begin_stage(&mut self) -> Result<(), PipelineError> {
        if self.status == ProcessingStatus::Processing {
            return Err(PipelineError::validation(
                "documentId",
                "document is processing; wait for the run to finish",
            ));
        }
        if self.stage_active {
            return Err(PipelineError::validation("documentId", "another stage operation is running on this document"));
        }
        self.stage_active = true;
        Ok(())
    }

    /// Whether the next run has to bypass cached artifacts. Reading clears it.
    pub fn take_recompute(&mut self) -> bool {
        std::mem::take(&mut self.recompute)
    }

    pub fn attach_task(&mut self, run_id: u64, task: tokio::task::AbortHandle) {
        match &mut self.run {
            Some(run) if run.run_id == run_id => run.task = Some(task),
            // Cancelled before the task was attached
            _ => task.abort(),
        }
    }

    pub fn mark_stage(&mut self, run_id: u64, stage: PipelineStage) {
        if self.is_current_run(run_id) {
            self.progress.mark(stage);
            self.updated_at = Utc::now();
        }
    }

    pub fn complete(&mut self, artifacts: CommittedArtifacts) -> Result<(), PipelineError> {
        self.transition(ProcessingStatus::Completed)?;
        self.progress = StageProgress::complete();
        self.artifacts = artifacts;
        self.run = None;
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    pub fn fail(&mut self, kind: ErrorKind, reason: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(ProcessingStatus::Failed)?;
        self.failure = Some(FailureInfo {
            kind,
            reason: reason.into(),
        });
        self.run = None;
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    /// pending/processing → failed (Cancelled). Partial results are
    /// discarded along with the staged bytes.
    pub fn cancel(&mut self) -> Result<(), PipelineError> {
        if self.status.is_terminal() {
            return Err(PipelineError::validation(
                "documentId",
                format!("document is already {}", self.status),
            ));
        }
        if let Some(run) = self.run.take() {
            run.stop();
        }
        self.fail(ErrorKind::Cancelled, "cancelled by request")?;
        self.bytes = None;
        self.artifacts = CommittedArtifacts::default();
        Ok(())
    }

    /// completed/failed → pending for an explicit re-run.
    pub fn reset(&mut self) -> Result<(), PipelineError> {
        if !self.status.is_terminal() {
            return Err(PipelineError::validation(
                "documentId",
                format!("document is {}; only completed or failed documents can be reprocessed", self.status),
            ));
        }
        if self.bytes.is_none() {
            return Err(PipelineError::validation(
                "documentId",
                "staged content was dropped; ingest the file again",
            ));
        }
        self.status = ProcessingStatus::Pending;
        self.progress = StageProgress::ingested();
        self.failure = None;
        self.artifacts = CommittedArtifacts::default();
        self.finished_at = None;
        self.recompute = true;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// How long finished documents keep their staged bytes and their entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub staged_bytes: Duration,
    pub documents: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            staged_bytes: Duration::from_secs(crate::config::DEFAULT_STAGED_RETENTION_SECS),
            documents: Duration::from_secs(crate::config::DEFAULT_DOCUMENT_RETENTION_SECS),
        }
    }
}

/// What a sweep released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub bytes_dropped: usize,
    pub documents_evicted: usize,
}

#[derive(Debug, Default)]
pub struct RegistryInner {
    documents: HashMap<Uuid, DocumentEntry>,
    /// First document registered for each content hash.
    by_hash: HashMap<String, Uuid>,
    retention: RetentionPolicy,
}

impl RegistryInner {
    pub fn get(&self, id: &Uuid) -> Result<&DocumentEntry, PipelineError> {
        self.documents.get(id).ok_or(PipelineError::NotFound(*id))
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Result<&mut DocumentEntry, PipelineError> {
        self.documents.get_mut(id).ok_or(PipelineError::NotFound(*id))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Release staged bytes and entries of documents finished longer ago
    /// than the retention policy allows. Pending and processing documents
    /// are never touched.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> SweepReport {
        let elapsed = |finished: DateTime<Utc>| (now - finished).to_std().unwrap_or(Duration::ZERO);
        let RetentionPolicy { staged_bytes, documents } = self.retention;
        let mut report = SweepReport::default();

        let mut evicted = Vec::new();
        for entry in self.documents.values_mut() {
            let Some(finished) = entry.finished_at else {
                continue;
            };
            if entry.stage_active {
                continue;
            }
            let age = elapsed(finished);
            if age >= documents {
                evicted.push(entry.document_id);
            } else if age >= staged_bytes && entry.bytes.take().is_some() {
                report.bytes_dropped += 1;
            }
        }

        for id in evicted {
            if let Some(entry) = self.documents.remove(&id) {
                if self.by_hash.get(&entry.fingerprint.file_hash) == Some(&id) {
                    self.by_hash.remove(&entry.fingerprint.file_hash);
                }
                report.documents_evicted += 1;
            }
        }
        report
    }
}

#[derive(Debug, Default)]
pub struct DocumentRegistry {
    inner: RwLock<RegistryInner>,
    next_run: AtomicU64,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                retention,
                ..RegistryInner::default()
            }),
            next_run: AtomicU64::new(0),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, RegistryInner>, PipelineError> {
        self.inner
            .read()
            .map_err(|_| PipelineError::Internal("document registry lock poisoned".into()))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryInner>, PipelineError> {
        self.inner
            .write()
            .map_err(|_| PipelineError::Internal("document registry lock poisoned".into()))
    }

    pub fn next_run_id(&self) -> u64 {
        self.next_run.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register a freshly fingerprinted upload as a pending document.
    pub fn register(
        &self,
        fingerprint: DocumentFingerprint,
        bytes: Vec<u8>,
    ) -> Result<DocumentStatus, PipelineError> {
        let mut inner = self.write()?;
        let document_id = Uuid::new_v4();
        let duplicate_of = inner.by_hash.get(&fingerprint.file_hash).copied();
        if duplicate_of.is_none() {
            inner.by_hash.insert(fingerprint.file_hash.clone(), document_id);
        }

        let now = Utc::now();
        let entry = DocumentEntry {
            document_id,
            fingerprint,
            status: ProcessingStatus::Pending,
            progress: StageProgress::ingested(),
            failure: None,
            duplicate_of,
            created_at: now,
            updated_at: now,
            finished_at: None,
            bytes: Some(Arc::new(bytes)),
            run: None,
            artifacts: CommittedArtifacts::default(),
            stage_active: false,
            recompute: false,
        };
        let status = entry.status_view();
        inner.documents.insert(document_id, entry);
        inner.sweep(now);
        Ok(status)
    }

    pub fn status(&self, id: &Uuid) -> Result<DocumentStatus, PipelineError> {
        Ok(self.read()?.get(id)?.status_view())
    }

    pub fn mark_stage(&self, id: &Uuid, run_id: u64, stage: PipelineStage) -> Result<(), PipelineError> {
        self.write()?.get_mut(id)?.mark_stage(run_id, stage);
        Ok(())
    }

    /// Hold `id` for one stage operation. Refused while the document is
    /// processing or another stage holds it; released on drop.
    pub fn lease_stage(self: &Arc<Self>, id: &Uuid) -> Result<StageLease, PipelineError> {
        self.write()?.get_mut(id)?.begin_stage()?;
        Ok(StageLease {
            registry: Arc::clone(self),
            document_id: *id,
        })
    }

    pub fn sweep(&self) -> Result<SweepReport, PipelineError> {
        let report = self.write()?.sweep(Utc::now());
        if report != SweepReport::default() {
            tracing::info!(
                bytes_dropped = report.bytes_dropped,
                documents_evicted = report.documents_evicted,
                "Registry swept"
            );
        }
        Ok(report)
    }
}

/// Exclusive hold on a document for the duration of a stage operation.
#[derive(Debug)]
pub struct StageLease {
    registry: Arc<DocumentRegistry>,
    document_id: Uuid,
}

impl Drop for StageLease {
    fn drop(&mut self) {
        let Ok(mut inner) = self.registry.write() else {
            return;
        };
        if let Ok(entry) = inner.get_mut(&self.document_id) {
            entry.stage_active = false;
        }
    }
}
