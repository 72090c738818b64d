//! Page-level reconciliation of two extraction passes (dual strategy).

use std::collections::BTreeSet;

use super::confidence::length_weighted_confidence;
use super::types::PageExtraction;

/// Agreement below this marks the passes as disagreeing.
pub const AGREEMENT_THRESHOLD: f64 = 0.80;

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub pages: Vec<PageExtraction>,
    /// Mean per-page token Jaccard similarity, 0-1.
    pub agreement: f64,
    pub confidence: f64,
}

/// Keep the more confident text per page and score how well the passes agree.
///
/// When they disagree the result is `min(a, b) · agreement`, which is
/// strictly below both inputs whenever both are positive.
pub fn reconcile(
    primary: &[PageExtraction],
    primary_confidence: f64,
    secondary: &[PageExtraction],
    secondary_confidence: f64,
) -> Reconciliation {
    let page_total = primary.len().max(secondary.len());
    if page_total == 0 {
        return Reconciliation {
            pages: Vec::new(),
            agreement: 1.0,
            confidence: 0.0,
        };
    }

    let mut pages = Vec::with_capacity(page_total);
    let mut similarity_sum = 0.0;

    for i in 0..page_total {
        let a = primary.get(i);
        let b = secondary.get(i);
        let a_text = a.map_or("", |p| p.text.as_str());
        let b_text = b.map_or("", |p| p.text.as_str());
        similarity_sum += token_jaccard(a_text, b_text);

        let chosen = match (a, b) {
            (Some(a), Some(b)) if b.confidence > a.confidence => b.clone(),
            (Some(a), _) => a.clone(),
            (None, Some(b)) => b.clone(),
            (None, None) => PageExtraction::new(i as u32 + 1, "", 0.0),
        };
        pages.push(PageExtraction {
            page_number: i as u32 + 1,
            ..chosen
        });
    }

    let agreement = similarity_sum / page_total as f64;
    let confidence = if agreement < AGREEMENT_THRESHOLD {
        primary_confidence.min(secondary_confidence) * agreement
    } else {
        length_weighted_confidence(&pages)
    };

    Reconciliation {
        pages,
        agreement,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Jaccard similarity of lowercase alphanumeric token sets. Two empty
/// texts agree fully.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> BTreeSet<String> {
        s.split(|c: char| !c.is_alphanumeric() && c != '.')
            .map(|t| t.trim_matches('.').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    };
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}
