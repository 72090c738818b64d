//! Container decoding shared by fingerprinting and text-layer extraction.
//!
//! Each decoder turns raw bytes into a list of pages (PDF pages, workbook
//! sheets) carrying the recovered text and the drawing-operator counts the
//! fingerprinter uses for table density.

pub mod pdf;
pub mod spreadsheet;

use thiserror::Error;

use crate::models::DocumentFormat;

/// Upper bound on any single inflated stream or archive entry.
pub const MAX_INFLATED_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Corrupt {format} container: {reason}")]
    Corrupt {
        format: DocumentFormat,
        reason: String,
    },

    #[error("PDF is password-protected")]
    EncryptedPdf,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub(crate) fn corrupt(format: DocumentFormat, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            format,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPage {
    pub text: String,
    /// Rectangle / path-fill operators (table rules, cell shading).
    pub rect_ops: usize,
    /// Text-showing operators.
    pub text_ops: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDocument {
    pub format: DocumentFormat,
    pub pages: Vec<DecodedPage>,
    pub sheet_count: Option<u32>,
}

impl DecodedDocument {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// True when at least one page yields letters.
    pub fn has_text_layer(&self) -> bool {
        self.pages
            .iter()
            .any(|p| p.text.chars().any(|c| c.is_alphabetic()))
    }

    /// First `max_chars` characters across pages, for language detection.
    pub fn text_sample(&self, max_chars: usize) -> String {
        let mut sample = String::new();
        for page in &self.pages {
            if sample.chars().count() >= max_chars {
                break;
            }
            if !sample.is_empty() {
                sample.push('\n');
            }
            sample.push_str(&page.text);
        }
        sample.chars().take(max_chars).collect()
    }

    /// Share of rectangle operators among all drawing and text operators.
    /// Spreadsheets are tabular by construction.
    pub fn table_density(&self) -> f64 {
        if self.format.is_spreadsheet() {
            return 1.0;
        }
        let rects: usize = self.pages.iter().map(|p| p.rect_ops).sum();
        let texts: usize = self.pages.iter().map(|p| p.text_ops).sum();
        if rects + texts == 0 {
            return 0.0;
        }
        rects as f64 / (rects + texts) as f64
    }
}

/// Decode a document of a known format.
pub fn decode(format: DocumentFormat, bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
    match format {
        DocumentFormat::Pdf => pdf::decode_pdf(bytes),
        DocumentFormat::Xlsx => spreadsheet::decode_xlsx(bytes),
        DocumentFormat::Xls => spreadsheet::decode_xls(bytes),
    }
}
