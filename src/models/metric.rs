use serde::{Deserialize, Serialize};

use super::enums::MetricKind;

/// A quantitative fact pulled out of document text, in canonical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMetric {
    /// Unique per document: the metric kind, suffixed `.2`, `.3`, ... for
    /// further differing mentions.
    pub metric_id: String,
    pub metric_kind: MetricKind,
    pub value: f64,
    pub unit: String,
    /// Verified or base-year value for the same kind, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    pub confidence: f64,
    /// 1-based page the value was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
}
