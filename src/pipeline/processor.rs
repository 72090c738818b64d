//! Document processing orchestrator.
//!
//! Drives one document through extract → normalize → reason → score.
//! Stages are plain synchronous calls; the service layer decides where they
//! run and owns all document state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use super::error::PipelineError;
use super::extraction::{DocumentExtractor, ExtractionResult};
use super::normalize::Normalizer;
use super::reasoning::Reasoner;
use super::scoring::{ScoreComputation, ScoreOptions, Scorer};
use crate::models::{Claim, ClaimType, DocumentFingerprint, ExtractionStrategy, NormalizedMetric, PipelineStage};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Options for a whole-document run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub strategy: Option<ExtractionStrategy>,
    pub scoring: ScoreOptions,
}

/// Everything one run produces. Nothing here is visible to readers until
/// the service commits it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineArtifacts {
    pub extraction: ExtractionResult,
    pub metrics: Vec<NormalizedMetric>,
    pub claims: Vec<Claim>,
    pub confidence_scores: BTreeMap<ClaimType, f64>,
    pub score: ScoreComputation,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    extractor: DocumentExtractor,
    normalizer: Normalizer,
    reasoner: Reasoner,
    scorer: Scorer,
}

impl DocumentProcessor {
    pub fn new(extractor: DocumentExtractor, reasoner: Reasoner) -> Self {
        Self {
            extractor,
            normalizer: Normalizer::new(),
            reasoner,
            scorer: Scorer::new(),
        }
    }

    pub fn extract(
        &self,
        document_id: Uuid,
        fingerprint: &DocumentFingerprint,
        bytes: &[u8],
        strategy: Option<ExtractionStrategy>,
    ) -> Result<ExtractionResult, PipelineError> {
        Ok(self.extractor.extract(document_id, fingerprint, bytes, strategy)?)
    }

    pub fn normalize(&self, document_id: Uuid, extracted_text: &str) -> Vec<NormalizedMetric> {
        self.normalizer.normalize(document_id, extracted_text)
    }

    pub fn reason(&self, document_id: Uuid, metrics: &[NormalizedMetric], extracted_text: &str) -> Vec<Claim> {
        self.reasoner.reason(document_id, metrics, extracted_text)
    }

    pub fn score(
        &self,
        claims: &[Claim],
        confidence_scores: &BTreeMap<ClaimType, f64>,
        options: &ScoreOptions,
    ) -> Result<ScoreComputation, PipelineError> {
        Ok(self.scorer.score(claims, confidence_scores, options)?)
    }

    /// Full pipeline over staged bytes.
    ///
    /// `cancelled` is checked before every stage; `on_stage` fires after
    /// each stage completes.
    pub fn run(
        &self,
        document_id: Uuid,
        fingerprint: &DocumentFingerprint,
        bytes: &[u8],
        options: &RunOptions,
        cancelled: &AtomicBool,
        mut on_stage: impl FnMut(PipelineStage),
    ) -> Result<PipelineArtifacts, PipelineError> {
        let checkpoint = || {
            if cancelled.load(Ordering::SeqCst) {
                Err(PipelineError::Cancelled(document_id))
            } else {
                Ok(())
            }
        };

        checkpoint()?;
        let extraction = self.extract(document_id, fingerprint, bytes, options.strategy)?;
        on_stage(PipelineStage::Extract);

        checkpoint()?;
        let metrics = self.normalize(document_id, &extraction.extracted_text);
        on_stage(PipelineStage::Normalize);

        checkpoint()?;
        let claims = self.reason(document_id, &metrics, &extraction.extracted_text);
        on_stage(PipelineStage::Reason);

        checkpoint()?;
        let confidence_scores = confidence_map(extraction.confidence, &metrics, &claims);
        let score = self.score(&claims, &confidence_scores, &options.scoring)?;
        on_stage(PipelineStage::Score);

        tracing::info!(
            document_id = %document_id,
            strategy = %extraction.strategy,
            confidence = extraction.confidence,
            metrics = metrics.len(),
            claims = claims.len(),
            score = score.score,
            risk_level = %score.risk_level,
            "Processing complete"
        );

        Ok(PipelineArtifacts {
            extraction,
            metrics,
            claims,
            confidence_scores,
            score,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Confidence per claim type: the extraction confidence, lowered to the
/// mean confidence of the metrics its claims were derived from.
pub fn confidence_map(
    extraction_confidence: f64,
    metrics: &[NormalizedMetric],
    claims: &[Claim],
) -> BTreeMap<ClaimType, f64> {
    let mut linked: BTreeMap<ClaimType, Vec<f64>> = BTreeMap::new();
    for claim in claims {
        let entry = linked.entry(claim.claim_type).or_default();
        let metric = claim
            .metric_id
            .as_deref()
            .and_then(|id| metrics.iter().find(|m| m.metric_id == id));
        if let Some(metric) = metric {
            entry.push(metric.confidence);
        }
    }

    linked
        .into_iter()
        .map(|(claim_type, confidences)| {
            let confidence = if confidences.is_empty() {
                extraction_confidence
            } else {
                let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
                extraction_confidence.min(mean)
            };
            (claim_type, confidence.clamp(0.0, 1.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;
    use crate::pipeline::extraction::{ExtractorSettings, NativeTextLayer};
    use crate::pipeline::ingest::Fingerprinter;
    use crate::pipeline::reasoning::BenchmarkData;
    use crate::test_support::{pdf_document, GREENWASHING_REPORT};

    fn processor() -> DocumentProcessor {
        DocumentProcessor::new(
            DocumentExtractor::new(Box::new(NativeTextLayer), ExtractorSettings::default()),
            Reasoner::new(BenchmarkData::builtin().unwrap()),
        )
    }

    fn run(pages: &[&str], cancelled: bool) -> (Result<PipelineArtifacts, PipelineError>, Vec<PipelineStage>) {
        let pdf = pdf_document(pages);
        let fp = Fingerprinter::new(1024 * 1024)
            .fingerprint(&pdf, "application/pdf", "report.pdf")
            .unwrap();
        let flag = AtomicBool::new(cancelled);
        let mut stages = Vec::new();
        let result = processor().run(
            Uuid::new_v4(),
            &fp,
            &pdf,
            &RunOptions::default(),
            &flag,
            |stage| stages.push(stage),
        );
        (result, stages)
    }

    #[test]
    fn greenwashing_report_scores_high() {
        let (result, stages) = run(&[GREENWASHING_REPORT], false);
        let artifacts = result.unwrap();

        assert_eq!(artifacts.extraction.strategy, ExtractionStrategy::Fast);
        let carbon = artifacts
            .metrics
            .iter()
            .find(|m| m.metric_id == "carbon_reduction")
            .unwrap();
        assert_eq!(carbon.value, -40.0);
        assert_eq!(carbon.baseline, Some(5.0));

        let baseline_claim = artifacts
            .claims
            .iter()
            .find(|c| c.claim_type == ClaimType::BaselineDeviation)
            .unwrap();
        assert!(baseline_claim.severity >= 0.70);

        assert_eq!(artifacts.score.risk_level, RiskLevel::High);
        assert!(artifacts.score.score >= 60.0);
        assert_eq!(
            stages,
            [
                PipelineStage::Extract,
                PipelineStage::Normalize,
                PipelineStage::Reason,
                PipelineStage::Score
            ]
        );
    }

    #[test]
    fn baseline_gap_alone_scores_high() {
        let report = "Sustainability Report 2024\n\
Our carbon emissions fell by 40% compared with last year.\n\
Verified data shows carbon emissions increased by 5%.\n\
Scope 1 emissions were 12,000 tCO2e.\n\
Scope 2 emissions were 8,500 tCO2e.\n\
Scope 3 emissions were 41,000 tCO2e.";
        let (result, _) = run(&[report], false);
        let artifacts = result.unwrap();

        assert!(!artifacts
            .claims
            .iter()
            .any(|c| c.claim_type == ClaimType::ExpiredCertification));
        let baseline_claim = artifacts
            .claims
            .iter()
            .find(|c| c.claim_type == ClaimType::BaselineDeviation)
            .unwrap();
        assert!(baseline_claim.severity >= 0.70);

        assert_eq!(artifacts.score.risk_level, RiskLevel::High);
        assert!(artifacts.score.score >= 60.0, "got {}", artifacts.score.score);
        let tree = &artifacts.score.explanation_tree;
        if let Some(floor) = &tree.severity_floor {
            assert_eq!(floor.claim_type, ClaimType::BaselineDeviation);
            assert!(floor.weighted_total < 60.0);
        }
    }

    #[test]
    fn runs_are_deterministic() {
        let (a, _) = run(&[GREENWASHING_REPORT], false);
        let (b, _) = run(&[GREENWASHING_REPORT], false);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.claims, b.claims);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn cancelled_run_stops_before_extraction() {
        let (result, stages) = run(&[GREENWASHING_REPORT], true);
        assert!(matches!(result, Err(PipelineError::Cancelled(_))));
        assert!(stages.is_empty());
    }

    #[test]
    fn extraction_failure_propagates() {
        // Too little text per page for the density check
        let (result, stages) = run(&["Hi"], false);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), crate::models::ErrorKind::ExtractionFailed);
        assert!(stages.is_empty());
    }

    #[test]
    fn confidence_map_uses_linked_metrics() {
        let metric = |id: &str, confidence: f64| NormalizedMetric {
            metric_id: id.into(),
            metric_kind: crate::models::MetricKind::RenewableEnergy,
            value: 99.0,
            unit: "pct".into(),
            baseline: None,
            confidence,
            source_page: Some(1),
        };
        let metrics = [metric("renewable_energy", 0.6), metric("renewable_energy.2", 0.8)];
        let claims = [
            Claim::new(ClaimType::PeerOutlier, "a", 0.8).for_metric("renewable_energy"),
            Claim::new(ClaimType::PeerOutlier, "b", 0.8).for_metric("renewable_energy.2"),
            Claim::new(ClaimType::UnverifiedData, "c", 0.7),
        ];
        let map = confidence_map(0.95, &metrics, &claims);
        assert!((map[&ClaimType::PeerOutlier] - 0.7).abs() < 1e-9);
        assert_eq!(map[&ClaimType::UnverifiedData], 0.95);
        assert!(!map.contains_key(&ClaimType::MissingDisclosure));

        // Extraction confidence caps the metric mean
        let map = confidence_map(0.5, &metrics, &claims);
        assert_eq!(map[&ClaimType::PeerOutlier], 0.5);
    }
}
