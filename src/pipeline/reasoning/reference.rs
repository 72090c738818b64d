use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MetricKind;

/// Reference data bundled with the crate.
const BUILTIN_BENCHMARKS: &str = include_str!("../../../resources/benchmarks.json");

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to read reference data {0}: {1}")]
    Load(String, String),

    #[error("Failed to parse reference data: {0}")]
    Parse(String),

    #[error("Invalid reference data: {0}")]
    Invalid(String),
}

/// Peer distribution of a metric across comparable borrowers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerBenchmark {
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub year: i32,
    pub value: f64,
}

/// A metric every report is expected to disclose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredDisclosure {
    pub metric_kind: MetricKind,
    pub label: String,
    pub severity: f64,
}

/// Peer, history and disclosure reference for the reasoner (loaded from
/// benchmarks.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkData {
    pub version: String,
    #[serde(default)]
    pub peers: BTreeMap<MetricKind, PeerBenchmark>,
    #[serde(default)]
    pub history: BTreeMap<MetricKind, Vec<HistoryPoint>>,
    #[serde(default)]
    pub required_disclosures: Vec<RequiredDisclosure>,
}

impl BenchmarkData {
    pub fn builtin() -> Result<Self, ReferenceError> {
        Self::from_json(BUILTIN_BENCHMARKS)
    }

    /// Load reference data from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ReferenceError::Load(path.display().to_string(), e.to_string()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ReferenceError> {
        let mut data: Self =
            serde_json::from_str(json).map_err(|e| ReferenceError::Parse(e.to_string()))?;
        data.validate()?;
        for series in data.history.values_mut() {
            series.sort_by_key(|p| p.year);
        }
        Ok(data)
    }

    fn validate(&self) -> Result<(), ReferenceError> {
        for (kind, peer) in &self.peers {
            if !(peer.std_dev.is_finite() && peer.std_dev > 0.0) || !peer.mean.is_finite() {
                return Err(ReferenceError::Invalid(format!(
                    "peer benchmark for {kind} needs a finite mean and a positive stdDev"
                )));
            }
        }
        for disclosure in &self.required_disclosures {
            if !(0.0..=1.0).contains(&disclosure.severity) {
                return Err(ReferenceError::Invalid(format!(
                    "severity of required disclosure {} must be within 0-1",
                    disclosure.metric_kind
                )));
            }
        }
        Ok(())
    }

    pub fn peer(&self, kind: MetricKind) -> Option<&PeerBenchmark> {
        self.peers.get(&kind)
    }

    pub fn history(&self, kind: MetricKind) -> &[HistoryPoint] {
        self.history.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Least-squares trend of the series, extrapolated one year past its
    /// last point. Returns `(expected, slope)`.
    pub fn expected_next(&self, kind: MetricKind) -> Option<(f64, f64)> {
        let series = self.history(kind);
        let last = series.last()?;
        if series.len() == 1 {
            return Some((last.value, 0.0));
        }

        let n = series.len() as f64;
        let mean_x = series.iter().map(|p| f64::from(p.year)).sum::<f64>() / n;
        let mean_y = series.iter().map(|p| p.value).sum::<f64>() / n;
        let (mut cov, mut var) = (0.0, 0.0);
        for point in series {
            let dx = f64::from(point.year) - mean_x;
            cov += dx * (point.value - mean_y);
            var += dx * dx;
        }
        if var == 0.0 {
            return Some((mean_y, 0.0));
        }
        let slope = cov / var;
        let next_year = f64::from(last.year + 1);
        Some((mean_y + slope * (next_year - mean_x), slope))
    }
}
