//! Stage 1: document fingerprinting.

pub mod fingerprint;
pub mod format;
pub mod hash;

pub use fingerprint::*;
pub use format::*;
pub use hash::*;

use thiserror::Error;

use crate::models::{DocumentFormat, ErrorKind};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Declared type {declared} does not match file contents ({detected})")]
    FormatMismatch {
        declared: DocumentFormat,
        detected: String,
    },

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb:.1}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: f64 },

    #[error("PDF is password-protected; decrypt it first")]
    EncryptedPdf,

    #[error("Document content is empty")]
    EmptyContent,

    #[error("Content is not valid base64: {0}")]
    InvalidEncoding(String),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) | Self::FormatMismatch { .. } | Self::EncryptedPdf => {
                ErrorKind::UnsupportedFormat
            }
            Self::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            Self::EmptyContent | Self::InvalidEncoding(_) => ErrorKind::ValidationError,
        }
    }

    /// Request field the failure is attributed to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedFormat(_) => Some("mimeType"),
            Self::EmptyContent | Self::InvalidEncoding(_) | Self::FileTooLarge { .. } => {
                Some("content")
            }
            Self::FormatMismatch { .. } | Self::EncryptedPdf => Some("content"),
        }
    }
}
