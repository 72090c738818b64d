use serde::{Deserialize, Serialize};

use super::enums::DocumentFormat;

/// Immutable identity of an ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFingerprint {
    /// `sha256:` followed by the lowercase hex digest of the raw bytes.
    pub file_hash: String,
    pub filename: String,
    pub file_size: u64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// ISO 639-3 code of the sampled text, when detectable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_density: Option<f64>,
    /// Shannon entropy of the raw bytes in bits per byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_score: Option<f64>,
    pub metadata: FingerprintMetadata,
}

impl DocumentFingerprint {
    pub fn has_text_layer(&self) -> bool {
        self.metadata.has_text_layer
    }

    pub fn format(&self) -> DocumentFormat {
        self.metadata.detected_format
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintMetadata {
    pub detected_format: DocumentFormat,
    pub has_text_layer: bool,
    /// Number of characters sampled for language detection.
    pub text_sample_chars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_count: Option<u32>,
}
