use uuid::Uuid;

use super::confidence::{analyze_pages, compute_overall_confidence, text_density};
use super::language_detect::detect_language;
use super::locale::normalize_locale_numbers;
use super::reconcile::{reconcile, AGREEMENT_THRESHOLD};
use super::sanitize::sanitize_extracted_text;
use super::types::{
    ExtractionMethod, ExtractionResult, ExtractionWarning, OcrEngine, PageExtraction,
    TextLayerEngine, PAGE_BREAK,
};
use super::{thresholds, ExtractionError};
use crate::models::{DocumentFingerprint, ExtractionStrategy};
use crate::pipeline::strategy::{
    select_strategy, SelectionReason, StrategyCapabilities, StrategyDecision,
};

/// Minimum average non-whitespace characters per page.
pub const MIN_CHARS_PER_PAGE: usize = 25;

/// Confidence given up by the multilingual pass for rewriting numbers
/// without translating the surrounding text.
const MULTILINGUAL_CONFIDENCE_PENALTY: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorSettings {
    pub primary_language: String,
    pub enable_ocr: bool,
    pub enable_multilingual: bool,
    pub min_chars_per_page: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            primary_language: crate::config::DEFAULT_PRIMARY_LANGUAGE.to_string(),
            enable_ocr: false,
            enable_multilingual: false,
            min_chars_per_page: MIN_CHARS_PER_PAGE,
        }
    }
}

/// Output of a single extraction pass before sanitising.
struct PassOutput {
    pages: Vec<PageExtraction>,
    confidence: f64,
    warnings: Vec<ExtractionWarning>,
}

/// Stage 2: turns a fingerprinted document into text.
/// Uses trait objects for the text layer and OCR, enabling dependency injection.
pub struct DocumentExtractor {
    text_layer: Box<dyn TextLayerEngine + Send + Sync>,
    ocr_engine: Option<Box<dyn OcrEngine + Send + Sync>>,
    settings: ExtractorSettings,
}

impl DocumentExtractor {
    pub fn new(text_layer: Box<dyn TextLayerEngine + Send + Sync>, settings: ExtractorSettings) -> Self {
        Self {
            text_layer,
            ocr_engine: None,
            settings,
        }
    }

    /// Plug in an OCR engine. It is used only when `enable_ocr` is set.
    pub fn with_ocr_engine(mut self, engine: Box<dyn OcrEngine + Send + Sync>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    pub fn ocr_available(&self) -> bool {
        self.settings.enable_ocr && self.ocr_engine.is_some()
    }

    pub fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            ocr_available: self.ocr_available(),
            multilingual_enabled: self.settings.enable_multilingual,
            primary_language: self.settings.primary_language.clone(),
        }
    }

    pub fn extract(
        &self,
        document_id: Uuid,
        fingerprint: &DocumentFingerprint,
        bytes: &[u8],
        requested: Option<ExtractionStrategy>,
    ) -> Result<ExtractionResult, ExtractionError> {
        let decision = match requested {
            Some(strategy) => {
                self.check_enabled(strategy)?;
                StrategyDecision {
                    strategy,
                    reason: SelectionReason::Requested,
                }
            }
            None => select_strategy(fingerprint, &self.capabilities()),
        };

        tracing::info!(
            document_id = %document_id,
            strategy = %decision.strategy,
            reason = %decision.reason,
            "Starting text extraction"
        );

        let mut strategy = decision.strategy;
        let mut output = self.run_strategy(strategy, fingerprint, bytes)?;

        // Weak fast pass: retry with OCR when it can actually run
        if requested.is_none()
            && strategy == ExtractionStrategy::Fast
            && output.confidence < thresholds::LOW
            && self.ocr_available()
        {
            match self.run_pass(ExtractionStrategy::Ocr, fingerprint, bytes) {
                Ok(mut ocr) if ocr.confidence > output.confidence => {
                    ocr.warnings.push(ExtractionWarning::StrategyFallback {
                        from: ExtractionStrategy::Fast,
                        to: ExtractionStrategy::Ocr,
                        reason: format!("fast pass confidence {:.2}", output.confidence),
                    });
                    strategy = ExtractionStrategy::Ocr;
                    output = ocr;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(document_id = %document_id, error = %e, "OCR retry failed, keeping fast result");
                }
            }
        }

        for page in &mut output.pages {
            page.text = sanitize_extracted_text(&page.text);
        }

        let density = text_density(&output.pages);
        if density < self.settings.min_chars_per_page as f64 {
            tracing::warn!(
                document_id = %document_id,
                strategy = %strategy,
                chars_per_page = density,
                "Extraction below density threshold"
            );
            return Err(ExtractionError::InsufficientText {
                chars_per_page: density,
                minimum: self.settings.min_chars_per_page,
            });
        }

        let mut warnings = output.warnings;
        warnings.extend(analyze_pages(&output.pages));

        let extracted_text = output
            .pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_BREAK);
        let language = detect_language(&extracted_text)
            .map(str::to_string)
            .or_else(|| fingerprint.language.clone());

        tracing::info!(
            document_id = %document_id,
            strategy = %strategy,
            confidence = output.confidence,
            pages = output.pages.len(),
            warnings = warnings.len(),
            "Text extraction complete"
        );

        Ok(ExtractionResult {
            document_id,
            extracted_text,
            confidence: output.confidence,
            strategy,
            page_count: output.pages.len() as u32,
            pages: output.pages,
            language,
            warnings,
        })
    }

    fn check_enabled(&self, strategy: ExtractionStrategy) -> Result<(), ExtractionError> {
        match strategy {
            ExtractionStrategy::Multilingual if !self.settings.enable_multilingual => {
                Err(ExtractionError::StrategyDisabled(strategy))
            }
            ExtractionStrategy::Dual if self.dual_secondary().is_none() => {
                Err(ExtractionError::StrategyDisabled(strategy))
            }
            _ => Ok(()),
        }
    }

    /// Second pass paired with the text layer in dual mode.
    fn dual_secondary(&self) -> Option<ExtractionStrategy> {
        if self.ocr_available() {
            Some(ExtractionStrategy::Ocr)
        } else if self.settings.enable_multilingual {
            Some(ExtractionStrategy::Multilingual)
        } else {
            None
        }
    }

    fn run_strategy(
        &self,
        strategy: ExtractionStrategy,
        fingerprint: &DocumentFingerprint,
        bytes: &[u8],
    ) -> Result<PassOutput, ExtractionError> {
        match strategy {
            ExtractionStrategy::Dual => match self.dual_secondary() {
                Some(secondary) => self.run_dual(secondary, fingerprint, bytes),
                // Selection already checked; reachable only through a
                // disabled configuration, so run the primary pass alone.
                None => self.run_pass(ExtractionStrategy::Fast, fingerprint, bytes),
            },
            single => self.run_pass(single, fingerprint, bytes),
        }
    }

    fn run_pass(
        &self,
        strategy: ExtractionStrategy,
        fingerprint: &DocumentFingerprint,
        bytes: &[u8],
    ) -> Result<PassOutput, ExtractionError> {
        let format = fingerprint.format();
        match strategy {
            ExtractionStrategy::Fast | ExtractionStrategy::Dual => {
                let pages = self.text_layer.extract_pages(format, bytes)?;
                let confidence = compute_overall_confidence(&pages, ExtractionMethod::TextLayer);
                Ok(PassOutput {
                    pages,
                    confidence,
                    warnings: Vec::new(),
                })
            }
            ExtractionStrategy::Ocr => {
                let engine = self
                    .ocr_engine
                    .as_ref()
                    .filter(|_| self.settings.enable_ocr)
                    .ok_or(ExtractionError::OcrUnavailable)?;
                tracing::debug!(engine = engine.name(), "Running OCR pass");
                let pages = engine.recognize(format, bytes, fingerprint.language.as_deref())?;
                let confidence = compute_overall_confidence(&pages, ExtractionMethod::Ocr);
                Ok(PassOutput {
                    pages,
                    confidence,
                    warnings: Vec::new(),
                })
            }
            ExtractionStrategy::Multilingual => {
                let mut pages = self.text_layer.extract_pages(format, bytes)?;
                let mut replacements = 0;
                for page in &mut pages {
                    let language = fingerprint
                        .language
                        .as_deref()
                        .or_else(|| detect_language(&page.text));
                    let normalized = normalize_locale_numbers(&page.text, language);
                    replacements += normalized.replacements;
                    page.text = normalized.text;
                }
                let confidence = (compute_overall_confidence(&pages, ExtractionMethod::TextLayer)
                    - MULTILINGUAL_CONFIDENCE_PENALTY)
                    .max(0.0);
                let warnings = if replacements > 0 {
                    vec![ExtractionWarning::LocaleNormalized { replacements }]
                } else {
                    Vec::new()
                };
                Ok(PassOutput {
                    pages,
                    confidence,
                    warnings,
                })
            }
        }
    }

    /// Run the text layer and `secondary` in parallel, then reconcile.
    fn run_dual(
        &self,
        secondary: ExtractionStrategy,
        fingerprint: &DocumentFingerprint,
        bytes: &[u8],
    ) -> Result<PassOutput, ExtractionError> {
        let (primary, other) = std::thread::scope(|scope| {
            let primary = scope.spawn(|| self.run_pass(ExtractionStrategy::Fast, fingerprint, bytes));
            let other = scope.spawn(|| self.run_pass(secondary, fingerprint, bytes));
            (join_pass(primary.join()), join_pass(other.join()))
        });

        let primary = primary?;
        let other = match other {
            Ok(other) => other,
            Err(e) => {
                tracing::warn!(secondary = %secondary, error = %e, "Secondary dual pass failed");
                let mut primary = primary;
                primary.warnings.push(ExtractionWarning::StrategyFallback {
                    from: ExtractionStrategy::Dual,
                    to: ExtractionStrategy::Fast,
                    reason: e.to_string(),
                });
                return Ok(primary);
            }
        };

        let reconciled = reconcile(&primary.pages, primary.confidence, &other.pages, other.confidence);
        let mut warnings = primary.warnings;
        warnings.extend(other.warnings);
        if reconciled.agreement < AGREEMENT_THRESHOLD {
            warnings.push(ExtractionWarning::StrategyDisagreement {
                agreement: reconciled.agreement,
            });
        }

        Ok(PassOutput {
            pages: reconciled.pages,
            confidence: reconciled.confidence,
            warnings,
        })
    }
}

fn join_pass(
    joined: std::thread::Result<Result<PassOutput, ExtractionError>>,
) -> Result<PassOutput, ExtractionError> {
    joined.unwrap_or_else(|_| Err(ExtractionError::Worker("extraction pass panicked".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentFormat;
    use crate::pipeline::extraction::NativeTextLayer;
    use crate::pipeline::ingest::Fingerprinter;
    use crate::test_support::{image_only_pdf, pdf_document, GREENWASHING_REPORT};

    struct MockOcr {
        pages: Vec<(&'static str, f64)>,
    }

    impl OcrEngine for MockOcr {
        fn name(&self) -> &str {
            "mock"
        }

        fn recognize(
            &self,
            _format: DocumentFormat,
            _bytes: &[u8],
            _language: Option<&str>,
        ) -> Result<Vec<PageExtraction>, ExtractionError> {
            Ok(self
                .pages
                .iter()
                .enumerate()
                .map(|(i, (text, conf))| PageExtraction::new(i as u32 + 1, *text, *conf))
                .collect())
        }
    }

    struct FailingOcr;

    impl OcrEngine for FailingOcr {
        fn name(&self) -> &str {
            "failing"
        }

        fn recognize(
            &self,
            _format: DocumentFormat,
            _bytes: &[u8],
            _language: Option<&str>,
        ) -> Result<Vec<PageExtraction>, ExtractionError> {
            Err(ExtractionError::OcrProcessing("engine crashed".into()))
        }
    }

    fn settings(enable_ocr: bool, enable_multilingual: bool) -> ExtractorSettings {
        ExtractorSettings {
            enable_ocr,
            enable_multilingual,
            ..ExtractorSettings::default()
        }
    }

    fn extractor(enable_ocr: bool) -> DocumentExtractor {
        DocumentExtractor::new(Box::new(NativeTextLayer), settings(enable_ocr, true))
    }

    fn fingerprint_of(bytes: &[u8]) -> DocumentFingerprint {
        Fingerprinter::new(10 * 1024 * 1024)
            .fingerprint(bytes, "application/pdf", "report.pdf")
            .unwrap()
    }

    #[test]
    fn fast_extraction_of_digital_pdf() {
        let pdf = pdf_document(&[GREENWASHING_REPORT, "Appendix: methodology and boundaries of the report"]);
        let fp = fingerprint_of(&pdf);
        let result = extractor(false).extract(Uuid::new_v4(), &fp, &pdf, None).unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::Fast);
        assert_eq!(result.page_count, 2);
        assert!(result.extracted_text.contains(PAGE_BREAK));
        assert!(result.extracted_text.contains("carbon neutral"));
        assert!((result.confidence - thresholds::VERY_HIGH).abs() < 1e-9);
        assert_eq!(result.language.as_deref(), Some("eng"));
    }

    #[test]
    fn scanned_pdf_without_ocr_fails() {
        let pdf = image_only_pdf(1);
        let fp = fingerprint_of(&pdf);
        assert!(!fp.has_text_layer());
        let err = extractor(false).extract(Uuid::new_v4(), &fp, &pdf, None).unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable));
        assert_eq!(err.kind(), crate::models::ErrorKind::ExtractionFailed);
    }

    #[test]
    fn scanned_pdf_with_ocr_engine() {
        let pdf = image_only_pdf(1);
        let fp = fingerprint_of(&pdf);
        let ocr = MockOcr {
            pages: vec![("Scope 1 emissions were 12,000 tCO2e in the reporting year", 0.82)],
        };
        let result = extractor(true)
            .with_ocr_engine(Box::new(ocr))
            .extract(Uuid::new_v4(), &fp, &pdf, None)
            .unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::Ocr);
        assert!((result.confidence - 0.82).abs() < 1e-9);
    }

    #[test]
    fn ocr_engine_ignored_when_disabled() {
        let pdf = image_only_pdf(1);
        let fp = fingerprint_of(&pdf);
        let ocr = MockOcr {
            pages: vec![("Scope 1 emissions were 12,000 tCO2e in the reporting year", 0.82)],
        };
        let err = extractor(false)
            .with_ocr_engine(Box::new(ocr))
            .extract(Uuid::new_v4(), &fp, &pdf, None)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable));
    }

    #[test]
    fn sparse_text_fails_density_check() {
        let pdf = pdf_document(&["Net zero"]);
        let fp = fingerprint_of(&pdf);
        let err = extractor(false)
            .extract(Uuid::new_v4(), &fp, &pdf, Some(ExtractionStrategy::Fast))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::InsufficientText { .. }));
    }

    #[test]
    fn weak_fast_pass_retries_with_ocr() {
        // One page with text, one without: fast confidence 0.475
        let pdf = pdf_document(&[GREENWASHING_REPORT, ""]);
        let fp = fingerprint_of(&pdf);
        let ocr = MockOcr {
            pages: vec![(GREENWASHING_REPORT, 0.80), ("Appendix page recovered by OCR engine", 0.80)],
        };
        let result = extractor(true)
            .with_ocr_engine(Box::new(ocr))
            .extract(Uuid::new_v4(), &fp, &pdf, None)
            .unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::Ocr);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::StrategyFallback { .. })));
    }

    #[test]
    fn weak_fast_pass_kept_without_ocr() {
        let pdf = pdf_document(&[GREENWASHING_REPORT, ""]);
        let fp = fingerprint_of(&pdf);
        let result = extractor(false).extract(Uuid::new_v4(), &fp, &pdf, None).unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::Fast);
        assert!(result.confidence < thresholds::LOW);
        assert!(result
            .warnings
            .contains(&ExtractionWarning::EmptyPage { page: 2 }));
    }

    #[test]
    fn dual_disagreement_lowers_confidence_below_both_passes() {
        let pdf = pdf_document(&[GREENWASHING_REPORT]);
        let fp = fingerprint_of(&pdf);
        let ocr = MockOcr {
            pages: vec![(
                "Sustainability Report 2024 emissions rose sharply and no renewable energy was purchased this year",
                0.90,
            )],
        };
        let result = extractor(true)
            .with_ocr_engine(Box::new(ocr))
            .extract(Uuid::new_v4(), &fp, &pdf, Some(ExtractionStrategy::Dual))
            .unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::Dual);
        assert!(result.confidence < 0.90, "got {}", result.confidence);
        assert!(result.confidence < thresholds::VERY_HIGH);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::StrategyDisagreement { .. })));
        // The text layer page was more confident and is kept
        assert!(result.extracted_text.contains("carbon neutral"));
    }

    #[test]
    fn dual_without_ocr_pairs_with_multilingual() {
        let pdf = pdf_document(&[GREENWASHING_REPORT]);
        let fp = fingerprint_of(&pdf);
        let result = extractor(false)
            .extract(Uuid::new_v4(), &fp, &pdf, Some(ExtractionStrategy::Dual))
            .unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::Dual);
        assert!(result.confidence > thresholds::HIGH);
    }

    #[test]
    fn dual_survives_failing_secondary() {
        let pdf = pdf_document(&[GREENWASHING_REPORT]);
        let fp = fingerprint_of(&pdf);
        let result = extractor(true)
            .with_ocr_engine(Box::new(FailingOcr))
            .extract(Uuid::new_v4(), &fp, &pdf, Some(ExtractionStrategy::Dual))
            .unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::StrategyFallback { .. })));
    }

    #[test]
    fn multilingual_normalizes_numbers() {
        let text = "Rapport annuel : les émissions de carbone ont baissé de 12,5 % par rapport à l'exercice précédent.";
        let pdf = pdf_document(&[text]);
        let fp = fingerprint_of(&pdf);
        assert_eq!(fp.language.as_deref(), Some("fra"));
        let result = extractor(false).extract(Uuid::new_v4(), &fp, &pdf, None).unwrap();
        assert_eq!(result.strategy, ExtractionStrategy::Multilingual);
        assert!(result.extracted_text.contains("12.5 %"));
        assert!((result.confidence - 0.90).abs() < 1e-9);
    }

    #[test]
    fn requesting_disabled_multilingual_is_validation_error() {
        let pdf = pdf_document(&[GREENWASHING_REPORT]);
        let fp = fingerprint_of(&pdf);
        let err = DocumentExtractor::new(Box::new(NativeTextLayer), settings(false, false))
            .extract(Uuid::new_v4(), &fp, &pdf, Some(ExtractionStrategy::Multilingual))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::StrategyDisabled(_)));
        assert_eq!(err.kind(), crate::models::ErrorKind::ValidationError);
    }
}
