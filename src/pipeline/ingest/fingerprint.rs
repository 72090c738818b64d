use super::format::{detect_format, sanitize_filename};
use super::hash::{compute_content_hash, shannon_entropy};
use super::IngestError;
use crate::models::{DocumentFingerprint, FingerprintMetadata};
use crate::pipeline::decode::{self, DecodeError};
use crate::pipeline::extraction::language_detect::detect_language;

/// Characters of text sampled for language detection.
pub const LANGUAGE_SAMPLE_CHARS: usize = 4000;

/// Page count at which the size term of the complexity score saturates.
const COMPLEXITY_PAGE_SATURATION: f64 = 50.0;

/// complexity = 0.5·tableDensity + 0.3·entropy/8 + 0.2·min(pages/50, 1)
pub fn complexity_score(table_density: f64, entropy: f64, page_count: u32) -> f64 {
    let size = (f64::from(page_count) / COMPLEXITY_PAGE_SATURATION).min(1.0);
    (0.5 * table_density + 0.3 * (entropy / 8.0) + 0.2 * size).clamp(0.0, 1.0)
}

/// Stage 1: validates an upload against the allow-list and derives its
/// immutable fingerprint.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    max_file_size: u64,
}

impl Fingerprinter {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn fingerprint(
        &self,
        bytes: &[u8],
        declared_mime: &str,
        filename: &str,
    ) -> Result<DocumentFingerprint, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyContent);
        }
        let file_size = bytes.len() as u64;
        if file_size > self.max_file_size {
            return Err(IngestError::FileTooLarge {
                size_mb: file_size as f64 / (1024.0 * 1024.0),
                max_mb: self.max_file_size as f64 / (1024.0 * 1024.0),
            });
        }

        let format = detect_format(bytes, declared_mime, filename)?;
        let file_hash = compute_content_hash(bytes);
        let entropy = shannon_entropy(bytes);

        // A container we cannot parse still gets a fingerprint; extraction
        // reports the failure.
        let decoded = match decode::decode(format, bytes) {
            Ok(doc) => Some(doc),
            Err(DecodeError::EncryptedPdf) => return Err(IngestError::EncryptedPdf),
            Err(e) => {
                tracing::warn!(file_hash = %file_hash, error = %e, "Container could not be decoded");
                None
            }
        };

        let sample = decoded
            .as_ref()
            .map(|d| d.text_sample(LANGUAGE_SAMPLE_CHARS))
            .unwrap_or_default();
        let page_count = decoded.as_ref().map(|d| d.page_count());
        let table_density = decoded.as_ref().map(|d| d.table_density());
        let complexity = match (table_density, page_count) {
            (Some(td), Some(pages)) => Some(complexity_score(td, entropy, pages)),
            _ => None,
        };

        let fingerprint = DocumentFingerprint {
            file_hash,
            filename: sanitize_filename(filename),
            file_size,
            mime_type: format.mime_type().to_string(),
            page_count,
            language: detect_language(&sample).map(str::to_string),
            table_density,
            entropy: Some(entropy),
            complexity_score: complexity,
            metadata: FingerprintMetadata {
                detected_format: format,
                has_text_layer: decoded.as_ref().is_some_and(|d| d.has_text_layer()),
                text_sample_chars: sample.chars().count(),
                sheet_count: decoded.as_ref().and_then(|d| d.sheet_count),
            },
        };

        tracing::info!(
            file_hash = %fingerprint.file_hash,
            format = %format,
            file_size,
            page_count = ?fingerprint.page_count,
            language = ?fingerprint.language,
            complexity = ?fingerprint.complexity_score,
            "Document fingerprinted"
        );

        Ok(fingerprint)
    }
}
