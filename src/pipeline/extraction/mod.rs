pub mod confidence;
pub mod language_detect;
pub mod locale;
pub mod orchestrator;
pub mod reconcile;
pub mod sanitize;
pub mod text_layer;
pub mod types;

pub use confidence::*;
pub use orchestrator::*;
pub use sanitize::*;
pub use text_layer::*;
pub use types::*;

use thiserror::Error;

use crate::models::{ErrorKind, ExtractionStrategy};
use crate::pipeline::decode::DecodeError;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Text layer decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("OCR is required but no OCR engine is available")]
    OcrUnavailable,

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Extraction strategy {0} is disabled")]
    StrategyDisabled(ExtractionStrategy),

    #[error("Extracted text below density threshold: {chars_per_page:.1} chars/page (minimum {minimum})")]
    InsufficientText { chars_per_page: f64, minimum: usize },

    #[error("Extraction worker failed: {0}")]
    Worker(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StrategyDisabled(_) => ErrorKind::ValidationError,
            _ => ErrorKind::ExtractionFailed,
        }
    }
}
