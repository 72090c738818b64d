use super::types::{ExtractionMethod, ExtractionWarning, PageExtraction};

/// Confidence thresholds used across the pipeline
pub mod thresholds {
    /// Below this: extraction likely failed.
    pub const VERY_LOW: f64 = 0.30;

    /// Below this: significant uncertainty. Fast results are retried with OCR.
    pub const LOW: f64 = 0.50;

    /// Below this: some uncertainty.
    pub const MODERATE: f64 = 0.70;

    /// Above this: high confidence. No special flagging.
    pub const HIGH: f64 = 0.85;

    /// Above this: very high confidence. Extracted from a digital source.
    pub const VERY_HIGH: f64 = 0.95;
}

/// Compute overall document confidence from per-page results
pub fn compute_overall_confidence(pages: &[PageExtraction], method: ExtractionMethod) -> f64 {
    if pages.is_empty() {
        return 0.0;
    }

    match method {
        // Text layer: mean page confidence, scaled by ratio of pages with text
        ExtractionMethod::TextLayer => {
            let with_text: Vec<&PageExtraction> = pages.iter().filter(|p| p.has_text()).collect();
            if with_text.is_empty() {
                return 0.0;
            }
            let mean = with_text.iter().map(|p| p.confidence).sum::<f64>() / with_text.len() as f64;
            let ratio = with_text.len() as f64 / pages.len() as f64;
            (mean * ratio).clamp(0.0, 1.0)
        }
        // OCR: weighted average by text length
        ExtractionMethod::Ocr => length_weighted_confidence(pages),
    }
}

pub(crate) fn length_weighted_confidence(pages: &[PageExtraction]) -> f64 {
    let total_chars: usize = pages.iter().map(|p| p.text.len()).sum();
    if total_chars == 0 {
        return 0.0;
    }
    let weighted_sum: f64 = pages
        .iter()
        .map(|p| p.confidence * p.text.len() as f64)
        .sum();
    (weighted_sum / total_chars as f64).clamp(0.0, 1.0)
}

/// Average non-whitespace characters per page.
pub fn text_density(pages: &[PageExtraction]) -> f64 {
    if pages.is_empty() {
        return 0.0;
    }
    let chars: usize = pages
        .iter()
        .map(|p| p.text.chars().filter(|c| !c.is_whitespace()).count())
        .sum();
    chars as f64 / pages.len() as f64
}

/// Flag empty and low-confidence pages
pub fn analyze_pages(pages: &[PageExtraction]) -> Vec<ExtractionWarning> {
    pages
        .iter()
        .filter_map(|p| {
            if !p.has_text() {
                Some(ExtractionWarning::EmptyPage {
                    page: p.page_number,
                })
            } else if p.confidence < thresholds::LOW {
                Some(ExtractionWarning::LowConfidencePage {
                    page: p.page_number,
                    confidence: p.confidence,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, text: &str, confidence: f64) -> PageExtraction {
        PageExtraction::new(n, text, confidence)
    }

    #[test]
    fn digital_pdf_high_confidence() {
        let pages = vec![
            page(1, "Page one with text.", 0.95),
            page(2, "Page two with more text.", 0.95),
        ];
        let conf = compute_overall_confidence(&pages, ExtractionMethod::TextLayer);
        assert!(conf > 0.90, "Expected > 0.90, got {conf}");
    }

    #[test]
    fn digital_pdf_empty_page_lowers_confidence() {
        let pages = vec![page(1, "Page with text.", 0.95), page(2, "", 0.0)];
        let conf = compute_overall_confidence(&pages, ExtractionMethod::TextLayer);
        // One of two pages has text → 0.95 * 0.5 = 0.475
        assert!((conf - 0.475).abs() < 0.01, "Expected ~0.475, got {conf}");
        assert!(conf < thresholds::LOW);
    }

    #[test]
    fn ocr_weighted_by_text_length() {
        let pages = vec![
            page(1, &"Clear text on page one ".repeat(10), 0.85),
            page(2, "Blurry", 0.30),
        ];
        let conf = compute_overall_confidence(&pages, ExtractionMethod::Ocr);
        assert!(conf > 0.80, "Expected > 0.80, got {conf}");
        assert!(conf < 0.85);
    }

    #[test]
    fn empty_input_has_zero_confidence() {
        assert_eq!(compute_overall_confidence(&[], ExtractionMethod::TextLayer), 0.0);
        assert_eq!(compute_overall_confidence(&[page(1, "", 0.9)], ExtractionMethod::Ocr), 0.0);
    }

    #[test]
    fn density_ignores_whitespace() {
        let pages = vec![page(1, "ab cd", 0.9), page(2, "   ", 0.0)];
        assert!((text_density(&pages) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn analyze_flags_empty_and_weak_pages() {
        let pages = vec![page(1, "fine", 0.95), page(2, "", 0.0), page(3, "weak", 0.2)];
        let warnings = analyze_pages(&pages);
        assert_eq!(
            warnings,
            vec![
                ExtractionWarning::EmptyPage { page: 2 },
                ExtractionWarning::LowConfidencePage {
                    page: 3,
                    confidence: 0.2
                },
            ]
        );
    }
}
