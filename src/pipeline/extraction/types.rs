use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ExtractionError;
use crate::models::{DocumentFormat, ExtractionStrategy};

/// Separator between pages in `ExtractionResult::extracted_text`.
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

/// Result of text extraction from a single document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub document_id: Uuid,
    pub extracted_text: String,
    pub confidence: f64,
    pub strategy: ExtractionStrategy,
    pub page_count: u32,
    pub pages: Vec<PageExtraction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ExtractionWarning>,
}

/// Per-page extraction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExtraction {
    pub page_number: u32,
    pub text: String,
    pub confidence: f64,
}

impl PageExtraction {
    pub fn new(page_number: u32, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            page_number,
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Warnings about extraction quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    LowConfidencePage {
        page: u32,
        confidence: f64,
    },
    EmptyPage {
        page: u32,
    },
    StrategyDisagreement {
        agreement: f64,
    },
    StrategyFallback {
        from: ExtractionStrategy,
        to: ExtractionStrategy,
        reason: String,
    },
    LocaleNormalized {
        replacements: usize,
    },
}

/// How a pass obtained its text; drives overall confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    TextLayer,
    Ocr,
}

/// Embedded text layer reader (allows mocking for tests)
pub trait TextLayerEngine {
    fn extract_pages(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<Vec<PageExtraction>, ExtractionError>;
}

/// OCR engine abstraction. No engine ships with the crate; deployments
/// plug one in through `DocumentExtractor::with_ocr_engine`.
pub trait OcrEngine {
    fn name(&self) -> &str;

    fn recognize(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
        language: Option<&str>,
    ) -> Result<Vec<PageExtraction>, ExtractionError>;
}
