use super::confidence::thresholds;
use super::types::{PageExtraction, TextLayerEngine};
use super::ExtractionError;
use crate::models::DocumentFormat;
use crate::pipeline::decode;

/// XLS string runs lose cell structure and binary numbers.
const XLS_STRING_RUN_CONFIDENCE: f64 = 0.60;

/// Reads the embedded text of PDF and spreadsheet containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTextLayer;

impl NativeTextLayer {
    fn base_confidence(format: DocumentFormat) -> f64 {
        match format {
            DocumentFormat::Pdf | DocumentFormat::Xlsx => thresholds::VERY_HIGH,
            DocumentFormat::Xls => XLS_STRING_RUN_CONFIDENCE,
        }
    }
}

impl TextLayerEngine for NativeTextLayer {
    fn extract_pages(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<Vec<PageExtraction>, ExtractionError> {
        let doc = decode::decode(format, bytes)?;
        let base = Self::base_confidence(format);
        Ok(doc
            .pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| {
                let confidence = if page.text.chars().any(|c| c.is_alphanumeric()) {
                    base
                } else {
                    0.0
                };
                PageExtraction::new(i as u32 + 1, page.text, confidence)
            })
            .collect())
    }
}
