//! Extraction strategy resolution.
//!
//! Maps a document fingerprint and the extractor's capabilities onto one of
//! the four extraction strategies. Pure function, no I/O.

use serde::Serialize;
use std::fmt;

use crate::models::{DocumentFingerprint, ExtractionStrategy};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Complexity at or above which both a primary and a secondary pass run.
pub const DUAL_COMPLEXITY_THRESHOLD: f64 = 0.70;

/// What the extractor can currently do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyCapabilities {
    pub ocr_available: bool,
    pub multilingual_enabled: bool,
    /// ISO 639-3 code processed by the fast path.
    pub primary_language: String,
}

/// Why a strategy was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    Requested,
    NoTextLayer,
    HighComplexity,
    NonPrimaryLanguage,
    Default,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::NoTextLayer => write!(f, "no_text_layer"),
            Self::HighComplexity => write!(f, "high_complexity"),
            Self::NonPrimaryLanguage => write!(f, "non_primary_language"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyDecision {
    pub strategy: ExtractionStrategy,
    pub reason: SelectionReason,
}

// ═══════════════════════════════════════════════════════════
// Strategy resolution
// ═══════════════════════════════════════════════════════════

/// Select the extraction strategy for a document.
///
/// Precedence: missing text layer, then complexity, then language. A
/// scanned document always goes to OCR even when no engine is available;
/// the extractor reports that failure.
pub fn select_strategy(
    fingerprint: &DocumentFingerprint,
    capabilities: &StrategyCapabilities,
) -> StrategyDecision {
    let decide = |strategy, reason| StrategyDecision { strategy, reason };

    if !fingerprint.has_text_layer() {
        return decide(ExtractionStrategy::Ocr, SelectionReason::NoTextLayer);
    }

    if fingerprint
        .complexity_score
        .is_some_and(|c| c >= DUAL_COMPLEXITY_THRESHOLD)
    {
        return decide(ExtractionStrategy::Dual, SelectionReason::HighComplexity);
    }

    let foreign = fingerprint
        .language
        .as_deref()
        .is_some_and(|lang| lang != capabilities.primary_language);
    if foreign && capabilities.multilingual_enabled {
        return decide(
            ExtractionStrategy::Multilingual,
            SelectionReason::NonPrimaryLanguage,
        );
    }

    decide(ExtractionStrategy::Fast, SelectionReason::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentFormat, FingerprintMetadata};

    fn fingerprint(has_text: bool, complexity: f64, language: Option<&str>) -> DocumentFingerprint {
        DocumentFingerprint {
            file_hash: "sha256:00".into(),
            filename: "report.pdf".into(),
            file_size: 100,
            mime_type: "application/pdf".into(),
            page_count: Some(3),
            language: language.map(str::to_string),
            table_density: Some(0.1),
            entropy: Some(5.0),
            complexity_score: Some(complexity),
            metadata: FingerprintMetadata {
                detected_format: DocumentFormat::Pdf,
                has_text_layer: has_text,
                text_sample_chars: 100,
                sheet_count: None,
            },
        }
    }

    fn caps(ocr: bool, multilingual: bool) -> StrategyCapabilities {
        StrategyCapabilities {
            ocr_available: ocr,
            multilingual_enabled: multilingual,
            primary_language: "eng".into(),
        }
    }

    #[test]
    fn scanned_documents_go_to_ocr() {
        let d = select_strategy(&fingerprint(false, 0.9, None), &caps(true, true));
        assert_eq!(d.strategy, ExtractionStrategy::Ocr);
        assert_eq!(d.reason, SelectionReason::NoTextLayer);
    }

    #[test]
    fn scanned_documents_go_to_ocr_even_without_engine() {
        let d = select_strategy(&fingerprint(false, 0.1, None), &caps(false, true));
        assert_eq!(d.strategy, ExtractionStrategy::Ocr);
    }

    #[test]
    fn complex_documents_go_to_dual() {
        let d = select_strategy(&fingerprint(true, 0.70, Some("fra")), &caps(false, true));
        assert_eq!(d.strategy, ExtractionStrategy::Dual);
        assert_eq!(d.reason, SelectionReason::HighComplexity);
    }

    #[test]
    fn foreign_language_goes_to_multilingual() {
        let d = select_strategy(&fingerprint(true, 0.2, Some("deu")), &caps(false, true));
        assert_eq!(d.strategy, ExtractionStrategy::Multilingual);
    }

    #[test]
    fn multilingual_disabled_falls_back_to_fast() {
        let d = select_strategy(&fingerprint(true, 0.2, Some("deu")), &caps(false, false));
        assert_eq!(d.strategy, ExtractionStrategy::Fast);
    }

    #[test]
    fn primary_language_goes_to_fast() {
        let d = select_strategy(&fingerprint(true, 0.69, Some("eng")), &caps(true, true));
        assert_eq!(d.strategy, ExtractionStrategy::Fast);
        assert_eq!(d.reason, SelectionReason::Default);
        let d = select_strategy(&fingerprint(true, 0.2, None), &caps(true, true));
        assert_eq!(d.strategy, ExtractionStrategy::Fast);
    }

    #[test]
    fn reason_display() {
        assert_eq!(SelectionReason::HighComplexity.to_string(), "high_complexity");
    }
}
