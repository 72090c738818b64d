//! Fixed metric catalog: keyword patterns and expected dimension per kind.

use std::sync::LazyLock;

use regex::Regex;

use super::units::Dimension;
use crate::models::MetricKind;

pub struct CatalogEntry {
    pub kind: MetricKind,
    pub keyword: Regex,
}

/// Keyword occurrence inside a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mention {
    pub kind: MetricKind,
    pub start: usize,
    pub end: usize,
}

static CATALOG: LazyLock<Vec<CatalogEntry>> = LazyLock::new(|| {
    let entry = |kind, pattern: &str| CatalogEntry {
        kind,
        keyword: Regex::new(&format!("(?i){pattern}")).expect("static regex"),
    };
    vec![
        entry(
            MetricKind::CarbonReduction,
            r"\b(?:carbon|co2e?|ghg|greenhouse[- ]gas)\s+(?:emissions?|footprint|intensity)\b|\bdecarboni[sz]ation\b",
        ),
        entry(
            MetricKind::RenewableEnergy,
            r"\brenewables?(?:\s+(?:energy|electricity|power|sources))?(?:\s+share)?\b",
        ),
        entry(
            MetricKind::WaterReduction,
            r"\bwater\s+(?:use|usage|consumption|intensity)\b",
        ),
        entry(
            MetricKind::WasteRecycling,
            r"\b(?:waste\s+(?:recycling|recycled|diverted|diversion)|recycling\s+rate)\b",
        ),
        entry(
            MetricKind::Scope1Emissions,
            r"\bscope\s*1\b(?:\s+(?:ghg\s+)?emissions?)?",
        ),
        entry(
            MetricKind::Scope2Emissions,
            r"\bscope\s*2\b(?:\s+(?:ghg\s+)?emissions?)?",
        ),
        entry(
            MetricKind::Scope3Emissions,
            r"\bscope\s*3\b(?:\s+(?:ghg\s+)?emissions?)?",
        ),
        entry(
            MetricKind::EnergyConsumption,
            r"\b(?:energy|electricity)\s+(?:consumption|consumed|use|usage)\b",
        ),
        entry(
            MetricKind::WaterWithdrawal,
            r"\bwater\s+(?:withdrawal|withdrawn|abstraction)\b",
        ),
        entry(
            MetricKind::GreenCapex,
            r"\bgreen\s+(?:capex|capital\s+expenditure|investments?)\b",
        ),
        entry(
            MetricKind::LeverageRatio,
            r"\b(?:leverage(?:\s+ratio)?|net\s+debt\s*(?:/|to)\s*ebitda)\b",
        ),
        entry(
            MetricKind::InterestCover,
            r"\binterest\s+(?:cover(?:age)?)(?:\s+ratio)?\b",
        ),
    ]
});

pub fn catalog() -> &'static [CatalogEntry] {
    &CATALOG
}

/// Dimension a metric kind must be reported in.
pub fn dimension_of(kind: MetricKind) -> Dimension {
    match kind {
        MetricKind::CarbonReduction
        | MetricKind::RenewableEnergy
        | MetricKind::WaterReduction
        | MetricKind::WasteRecycling => Dimension::Percent,
        MetricKind::Scope1Emissions | MetricKind::Scope2Emissions | MetricKind::Scope3Emissions => {
            Dimension::Emissions
        }
        MetricKind::EnergyConsumption => Dimension::Energy,
        MetricKind::WaterWithdrawal => Dimension::Water,
        MetricKind::GreenCapex => Dimension::Currency,
        MetricKind::LeverageRatio | MetricKind::InterestCover => Dimension::Ratio,
    }
}

/// Keyword mentions in order of appearance. Where two keywords overlap the
/// earlier, then longer, one wins.
pub fn find_mentions(sentence: &str) -> Vec<Mention> {
    let mut mentions: Vec<Mention> = catalog()
        .iter()
        .flat_map(|entry| {
            entry.keyword.find_iter(sentence).map(|m| Mention {
                kind: entry.kind,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect();
    mentions.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut kept: Vec<Mention> = Vec::with_capacity(mentions.len());
    for mention in mentions {
        if kept.last().map_or(true, |last| mention.start >= last.end) {
            kept.push(mention);
        }
    }
    kept
}
