//! Transport-agnostic application state.
//!
//! `CoreState` owns the document registry, the run cache and the score
//! ledger. The HTTP layer holds it behind an `Arc` and calls one method per
//! operation; nothing here knows about axum.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact_cache::{ArtifactCache, CacheKey};
use crate::config::{self, Settings};
use crate::db;
use crate::document_registry::{CommittedArtifacts, DocumentRegistry, RetentionPolicy, SweepReport};
use crate::models::{
    Claim, ClaimType, DocumentFingerprint, DocumentStatus, ErrorKind, FeedbackRecord, NormalizedMetric,
    ProcessingStatus, RiskScore,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::extraction::{DocumentExtractor, ExtractionResult, ExtractorSettings, NativeTextLayer, MIN_CHARS_PER_PAGE};
use crate::pipeline::feedback::FeedbackAdvisor;
use crate::pipeline::ingest::Fingerprinter;
use crate::pipeline::processor::{DocumentProcessor, PipelineArtifacts, RunOptions};
use crate::pipeline::reasoning::{BenchmarkData, Reasoner};
use crate::pipeline::scoring::ScoreComputation;
use crate::pipeline::validation::{
    ExtractRequest, FeedbackRequest, IngestInput, IngestRequest, NormalizeRequest, ProcessRequest, ReasonRequest,
    ScoreRequest,
};

/// Stored scores within this distance of `originalScore` are considered
/// the score the analyst saw.
pub const SCORE_MATCH_TOLERANCE: f64 = 0.01;

/// A run sharing another document's cached computation retries this many
/// times when that owner is cancelled underneath it.
const MAX_SHARED_RUN_ATTEMPTS: usize = 3;

/// How often the background sweeper applies the retention policy.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub document_id: Uuid,
    pub fingerprint: DocumentFingerprint,
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeResponse {
    pub document_id: Uuid,
    pub metrics: Vec<NormalizedMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonResponse {
    pub document_id: Uuid,
    pub claims: Vec<Claim>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub feedback_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment_suggestions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub documents: usize,
    pub cached_runs: u64,
    pub ocr_available: bool,
    pub feedback_learning: bool,
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    settings: Settings,
    fingerprinter: Fingerprinter,
    processor: Arc<DocumentProcessor>,
    registry: Arc<DocumentRegistry>,
    cache: ArtifactCache,
    /// Append-only score and feedback ledger.
    ledger: Mutex<Connection>,
    advisor: FeedbackAdvisor,
    ocr_available: bool,
}

pub fn extractor_settings(settings: &Settings) -> ExtractorSettings {
    ExtractorSettings {
        primary_language: settings.primary_language.clone(),
        enable_ocr: settings.enable_ocr,
        enable_multilingual: settings.enable_multilingual,
        min_chars_per_page: MIN_CHARS_PER_PAGE,
    }
}

impl CoreState {
    /// Production wiring: file-backed ledger, native text layer, bundled or
    /// configured reference data.
    pub fn new(settings: Settings) -> Result<Self, PipelineError> {
        let reference = match &settings.benchmarks_path {
            Some(path) => BenchmarkData::load(path)?,
            None => BenchmarkData::builtin()?,
        };
        let conn = db::open_database(&settings.database_path)?;
        let extractor = DocumentExtractor::new(Box::new(NativeTextLayer), extractor_settings(&settings));
        tracing::info!(
            database = %settings.database_path.display(),
            benchmarks = ?settings.benchmarks_path,
            "Core state initialised"
        );
        Ok(Self::from_parts(settings, extractor, reference, conn))
    }

    /// In-memory ledger with the bundled reference data.
    pub fn in_memory(settings: Settings) -> Result<Self, PipelineError> {
        let conn = db::open_memory_database()?;
        let extractor = DocumentExtractor::new(Box::new(NativeTextLayer), extractor_settings(&settings));
        Ok(Self::from_parts(settings, extractor, BenchmarkData::builtin()?, conn))
    }

    /// Assemble from prebuilt components. `conn` must already be migrated.
    pub fn from_parts(
        settings: Settings,
        extractor: DocumentExtractor,
        reference: BenchmarkData,
        conn: Connection,
    ) -> Self {
        let ocr_available = extractor.ocr_available();
        Self {
            fingerprinter: Fingerprinter::new(settings.max_file_size),
            processor: Arc::new(DocumentProcessor::new(extractor, Reasoner::new(reference))),
            registry: Arc::new(DocumentRegistry::with_retention(RetentionPolicy {
                staged_bytes: settings.staged_retention,
                documents: settings.document_retention,
            })),
            cache: ArtifactCache::with_ttl(settings.cache_capacity, settings.cache_ttl),
            ledger: Mutex::new(conn),
            advisor: FeedbackAdvisor::new(settings.enable_feedback_learning),
            ocr_available,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Connection>, PipelineError> {
        self.ledger
            .lock()
            .map_err(|_| PipelineError::Internal("score ledger lock poisoned".into()))
    }

    pub fn health(&self) -> Result<HealthReport, PipelineError> {
        Ok(HealthReport {
            status: "ok".into(),
            version: config::APP_VERSION.into(),
            documents: self.registry.read()?.len(),
            cached_runs: self.cache.entry_count(),
            ocr_available: self.ocr_available,
            feedback_learning: self.advisor.enabled(),
        })
    }

    /// Apply the retention policy now. Also runs on every ingest and after
    /// every finished run.
    pub fn sweep(&self) -> Result<SweepReport, PipelineError> {
        self.registry.sweep()
    }

    /// Sweep every `period` until the state is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let state = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(state) = state.upgrade() else {
                    break;
                };
                if let Err(e) = state.sweep() {
                    tracing::warn!(error = %e, "Registry sweep failed");
                }
            }
        })
    }

    // ── Stage operations ────────────────────────────────────
    //
    // Each stage call holds the document's stage lease, so it is refused
    // while a run owns the document and never overlaps another stage call.

    /// Fingerprint an upload and register it as a pending document.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse, PipelineError> {
        let IngestInput {
            filename,
            mime_type,
            bytes,
        } = request.validate()?;
        let fingerprinter = self.fingerprinter.clone();
        let (fingerprint, bytes) = blocking(move || {
            let fingerprint = fingerprinter.fingerprint(&bytes, &mime_type, &filename)?;
            Ok((fingerprint, bytes))
        })
        .await?;

        let status = self.registry.register(fingerprint, bytes)?;
        tracing::info!(
            document_id = %status.document_id,
            file_hash = %status.fingerprint.file_hash,
            format = %status.fingerprint.metadata.detected_format,
            duplicate_of = ?status.duplicate_of,
            "Document ingested"
        );
        Ok(IngestResponse {
            document_id: status.document_id,
            fingerprint: status.fingerprint,
            status: status.status,
            duplicate_of: status.duplicate_of,
        })
    }

    pub async fn extract(&self, request: ExtractRequest) -> Result<ExtractionResult, PipelineError> {
        let input = request.validate()?;
        let lease = self.registry.lease_stage(&input.document_id)?;
        let (fingerprint, bytes) = self.staged(&input.document_id)?;
        let processor = Arc::clone(&self.processor);
        blocking(move || {
            let _lease = lease;
            processor.extract(input.document_id, &fingerprint, &bytes, input.strategy)
        })
        .await
    }

    pub async fn normalize(&self, request: NormalizeRequest) -> Result<NormalizeResponse, PipelineError> {
        let input = request.validate()?;
        let lease = self.registry.lease_stage(&input.document_id)?;
        let processor = Arc::clone(&self.processor);
        let metrics = blocking(move || {
            let _lease = lease;
            Ok(processor.normalize(input.document_id, &input.extracted_text))
        })
        .await?;
        Ok(NormalizeResponse {
            document_id: input.document_id,
            metrics,
        })
    }

    pub async fn reason(&self, request: ReasonRequest) -> Result<ReasonResponse, PipelineError> {
        let input = request.validate()?;
        let lease = self.registry.lease_stage(&input.document_id)?;
        let processor = Arc::clone(&self.processor);
        let claims = blocking(move || {
            let _lease = lease;
            Ok(processor.reason(input.document_id, &input.metrics, &input.extracted_text))
        })
        .await?;
        Ok(ReasonResponse {
            document_id: input.document_id,
            claims,
        })
    }

    /// Score caller-supplied claims and append the result as a new version.
    pub fn score(&self, request: ScoreRequest) -> Result<RiskScore, PipelineError> {
        let input = request.validate()?;
        let _lease = self.registry.lease_stage(&input.document_id)?;
        let computation = self
            .processor
            .score(&input.claims, &input.confidence_scores, &input.options)?;
        self.append_score(input.document_id, computation)
    }

    /// Record an analyst outcome against a stored score of a completed
    /// document.
    pub fn submit_feedback(&self, request: FeedbackRequest) -> Result<FeedbackResponse, PipelineError> {
        let input = request.validate()?;
        let status = self.registry.status(&input.document_id)?;
        if status.status != ProcessingStatus::Completed {
            return Err(PipelineError::validation(
                "documentId",
                format!("feedback requires a completed document, this one is {}", status.status),
            ));
        }

        let conn = self.ledger()?;
        let matched = db::list_risk_scores(&conn, &input.document_id)?
            .into_iter()
            .rev()
            .find(|s| (s.score - input.original_score).abs() <= SCORE_MATCH_TOLERANCE)
            .ok_or_else(|| {
                PipelineError::validation(
                    "originalScore",
                    format!("no stored score matches {:.2}", input.original_score),
                )
            })?;

        let adjustment_suggestions =
            self.advisor
                .suggest(&matched, input.corrected_score, input.outcome_label);
        let record = FeedbackRecord {
            feedback_id: Uuid::new_v4(),
            document_id: input.document_id,
            score_id: matched.score_id,
            original_score: input.original_score,
            corrected_score: input.corrected_score,
            outcome_label: input.outcome_label,
            user_notes: input.user_notes,
            adjustment_suggestions: adjustment_suggestions.clone(),
            created_at: Utc::now(),
        };
        db::insert_feedback(&conn, &record)?;

        tracing::info!(
            document_id = %record.document_id,
            score_id = %record.score_id,
            feedback_id = %record.feedback_id,
            outcome = ?record.outcome_label,
            "Feedback recorded"
        );
        Ok(FeedbackResponse {
            feedback_id: record.feedback_id,
            adjustment_suggestions,
        })
    }

    // ── Document lifecycle ──────────────────────────────────

    /// Start a background run for a pending document and return its
    /// processing status straight away.
    pub async fn process(self: &Arc<Self>, document_id: Uuid, request: ProcessRequest) -> Result<DocumentStatus, PipelineError> {
        let (status, _task) = self.start_run(document_id, request.validate()?)?;
        Ok(status)
    }

    /// Like [`process`](Self::process), but waits for the run to finish and
    /// returns the final status.
    pub async fn process_and_wait(
        self: &Arc<Self>,
        document_id: Uuid,
        request: ProcessRequest,
    ) -> Result<DocumentStatus, PipelineError> {
        let (_, task) = self.start_run(document_id, request.validate()?)?;
        // An aborted task means the run was cancelled; the registry already
        // says so.
        let _ = task.await;
        self.status(&document_id)
    }

    fn start_run(
        self: &Arc<Self>,
        document_id: Uuid,
        options: RunOptions,
    ) -> Result<(DocumentStatus, tokio::task::JoinHandle<()>), PipelineError> {
        let run_id = self.registry.next_run_id();
        let (status, cancelled, recompute) = {
            let mut inner = self.registry.write()?;
            let entry = inner.get_mut(&document_id)?;
            let cancelled = entry.begin_run(run_id)?;
            (entry.status_view(), cancelled, entry.take_recompute())
        };
        tracing::info!(document_id = %document_id, run_id, recompute, "Processing started");

        let state = Arc::clone(self);
        let task = tokio::spawn(async move {
            state
                .run_document(document_id, run_id, options, cancelled, recompute)
                .await;
        });
        self.registry
            .write()?
            .get_mut(&document_id)?
            .attach_task(run_id, task.abort_handle());
        Ok((status, task))
    }

    async fn run_document(
        &self,
        document_id: Uuid,
        run_id: u64,
        options: RunOptions,
        cancelled: Arc<AtomicBool>,
        recompute: bool,
    ) {
        let outcome = match self.compute(document_id, run_id, &options, &cancelled, recompute).await {
            Ok(artifacts) => self.commit(document_id, run_id, &artifacts),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            self.record_failure(document_id, run_id, e.kind(), e.to_string());
        }
    }

    /// Artifacts for this run, shared with any concurrent run over the same
    /// bytes and options. A reprocessed document recomputes instead of
    /// reading the previous run back from the cache.
    async fn compute(
        &self,
        document_id: Uuid,
        run_id: u64,
        options: &RunOptions,
        cancelled: &Arc<AtomicBool>,
        recompute: bool,
    ) -> Result<Arc<PipelineArtifacts>, Arc<PipelineError>> {
        let (fingerprint, bytes) = self.staged(&document_id)?;
        let key = CacheKey::new(
            &fingerprint.file_hash,
            options.strategy,
            options.scoring.industry.as_deref(),
            options.scoring.jurisdiction.as_deref(),
        );
        if recompute {
            self.cache.invalidate(&key).await;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let processor = Arc::clone(&self.processor);
            let registry = Arc::clone(&self.registry);
            let fingerprint = fingerprint.clone();
            let bytes = Arc::clone(&bytes);
            let options = options.clone();
            let flag = Arc::clone(cancelled);

            let result = self
                .cache
                .get_or_compute(key.clone(), move || {
                    blocking(move || {
                        processor.run(document_id, &fingerprint, &bytes, &options, &flag, |stage| {
                            let _ = registry.mark_stage(&document_id, run_id, stage);
                        })
                    })
                })
                .await;

            match result {
                Err(e)
                    if matches!(*e, PipelineError::Cancelled(owner) if owner != document_id)
                        && !cancelled.load(Ordering::SeqCst)
                        && attempt < MAX_SHARED_RUN_ATTEMPTS =>
                {
                    tracing::debug!(document_id = %document_id, attempt, "Shared run was cancelled, retrying");
                }
                other => return other,
            }
        }
    }

    fn commit(&self, document_id: Uuid, run_id: u64, artifacts: &PipelineArtifacts) -> Result<(), Arc<PipelineError>> {
        let mut inner = self.registry.write()?;
        let entry = inner.get_mut(&document_id)?;
        if !entry.is_current_run(run_id) {
            tracing::info!(document_id = %document_id, run_id, "Run no longer current, results discarded");
            return Ok(());
        }

        let stored = self.append_score(document_id, artifacts.score.clone())?;
        let mut extraction = artifacts.extraction.clone();
        extraction.document_id = document_id;
        entry.complete(CommittedArtifacts {
            extraction: Some(extraction),
            metrics: artifacts.metrics.clone(),
            claims: artifacts.claims.clone(),
            confidence_scores: artifacts.confidence_scores.clone(),
        })?;

        tracing::info!(
            document_id = %document_id,
            run_id,
            score = stored.score,
            version = stored.version,
            risk_level = %stored.risk_level,
            "Processing committed"
        );
        inner.sweep(Utc::now());
        Ok(())
    }

    fn record_failure(&self, document_id: Uuid, run_id: u64, kind: ErrorKind, reason: String) {
        let Ok(mut inner) = self.registry.write() else {
            tracing::error!(document_id = %document_id, "Registry unavailable, failure not recorded");
            return;
        };
        let Ok(entry) = inner.get_mut(&document_id) else {
            return;
        };
        if !entry.is_current_run(run_id) {
            return;
        }
        tracing::warn!(document_id = %document_id, run_id, kind = %kind, reason = %reason, "Processing failed");
        if let Err(e) = entry.fail(kind, reason) {
            tracing::error!(document_id = %document_id, error = %e, "Could not mark document failed");
        }
        inner.sweep(Utc::now());
    }

    pub fn status(&self, document_id: &Uuid) -> Result<DocumentStatus, PipelineError> {
        self.registry.status(document_id)
    }

    /// Cancel a pending or processing document. Partial results are
    /// discarded and nothing is written to the ledger.
    pub fn cancel(&self, document_id: &Uuid) -> Result<DocumentStatus, PipelineError> {
        let mut inner = self.registry.write()?;
        let entry = inner.get_mut(document_id)?;
        entry.cancel()?;
        tracing::info!(document_id = %document_id, "Processing cancelled");
        Ok(entry.status_view())
    }

    /// Return a completed or failed document to pending so it can be
    /// processed again. Stored score versions are kept.
    pub fn reprocess(&self, document_id: &Uuid) -> Result<DocumentStatus, PipelineError> {
        let mut inner = self.registry.write()?;
        let entry = inner.get_mut(document_id)?;
        entry.reset()?;
        tracing::info!(document_id = %document_id, "Document reset for reprocessing");
        Ok(entry.status_view())
    }

    // ── Reads ───────────────────────────────────────────────

    pub fn metrics(&self, document_id: &Uuid) -> Result<Vec<NormalizedMetric>, PipelineError> {
        Ok(self.registry.read()?.get(document_id)?.artifacts().metrics.clone())
    }

    pub fn claims(&self, document_id: &Uuid) -> Result<Vec<Claim>, PipelineError> {
        Ok(self.registry.read()?.get(document_id)?.artifacts().claims.clone())
    }

    pub fn extraction(&self, document_id: &Uuid) -> Result<Option<ExtractionResult>, PipelineError> {
        Ok(self.registry.read()?.get(document_id)?.artifacts().extraction.clone())
    }

    pub fn confidence_scores(&self, document_id: &Uuid) -> Result<BTreeMap<ClaimType, f64>, PipelineError> {
        Ok(self
            .registry
            .read()?
            .get(document_id)?
            .artifacts()
            .confidence_scores
            .clone())
    }

    /// All stored score versions, oldest first. The ledger outlives the
    /// registry, so a document unknown in memory still resolves if it has
    /// stored scores.
    pub fn scores(&self, document_id: &Uuid) -> Result<Vec<RiskScore>, PipelineError> {
        let scores = db::list_risk_scores(&*self.ledger()?, document_id)?;
        if scores.is_empty() {
            self.ensure_known(document_id)?;
        }
        Ok(scores)
    }

    pub fn feedback(&self, document_id: &Uuid) -> Result<Vec<FeedbackRecord>, PipelineError> {
        let records = db::list_feedback(&*self.ledger()?, document_id)?;
        if records.is_empty() {
            self.ensure_known(document_id)?;
        }
        Ok(records)
    }

    // ── Helpers ─────────────────────────────────────────────

    fn ensure_known(&self, document_id: &Uuid) -> Result<(), PipelineError> {
        self.registry.read()?.get(document_id).map(|_| ())
    }

    fn staged(&self, document_id: &Uuid) -> Result<(DocumentFingerprint, Arc<Vec<u8>>), PipelineError> {
        let inner = self.registry.read()?;
        let entry = inner.get(document_id)?;
        let bytes = entry
            .bytes()
            .ok_or_else(|| PipelineError::validation("documentId", "staged content is no longer available"))?;
        Ok((entry.fingerprint.clone(), bytes))
    }

    fn append_score(&self, document_id: Uuid, computation: ScoreComputation) -> Result<RiskScore, PipelineError> {
        let conn = self.ledger()?;
        let version = db::next_score_version(&conn, &document_id)?;
        let score = computation.into_risk_score(document_id, version);
        db::insert_risk_score(&conn, &score)?;
        tracing::info!(
            document_id = %document_id,
            score_id = %score.score_id,
            version,
            score = score.score,
            "Risk score stored"
        );
        Ok(score)
    }
}

/// Run CPU-bound stage work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::Internal(format!("stage worker failed: {e}")))?
}
