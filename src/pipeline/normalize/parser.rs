//! Sentence segmentation and quantity scanning.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::units::{canonical_unit, currency_code, multiplier, Unit};

/// Bare integers in this range are read as years, not quantities.
const YEAR_RANGE: std::ops::RangeInclusive<f64> = 1900.0..=2100.0;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;](?:\s+|$)").expect("static regex"));

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        (?P<sign>[-+])?
        (?P<cur>[€$£]|\b(?:eur|usd|gbp)\s?)?
        (?P<num>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)
        (?:\s?(?P<mult>bn|billion|mn|million|thousand|m|k)\b)?
        (?:\s?(?P<unit>
            %
          | per\s?cent\b
          | x\b | × | times\b
          | [kmg]wh\b | gj\b | tj\b
          | (?:kg|kt|mt|t)\s?co2e?\b
          | tonnes?\s+(?:of\s+)?co2e?\b
          | m3\b | m³ | cubic\s+met(?:re|er)s\b
          | megalit(?:re|er)s\b | (?-i:ML)\b
          | eur\b | usd\b | gbp\b
        ))?",
    )
    .expect("static regex")
});

/// A number read from a sentence, converted to its canonical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    /// Byte span within the sentence.
    pub start: usize,
    pub end: usize,
    pub value: f64,
    pub unit: Option<Unit>,
    /// An explicit `+`/`-` was written.
    pub signed: bool,
}

impl Quantity {
    /// Characters between this quantity and the span `start..end`.
    pub fn distance_to(&self, start: usize, end: usize) -> usize {
        if self.start >= end {
            self.start - end
        } else if self.end <= start {
            start - self.end
        } else {
            0
        }
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Split text into sentences: line breaks, then `.`, `!`, `?` or `;`
/// followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        for end in SENTENCE_END.find_iter(line) {
            sentences.push(line[start..end.start() + 1].trim());
            start = end.end();
        }
        sentences.push(line[start..].trim());
    }
    sentences.retain(|s| !s.is_empty());
    sentences
}

/// All quantities of `sentence` in order. Bare years and digits glued to
/// words (`CO2`, `v1`) are skipped.
pub fn scan_quantities(sentence: &str) -> Vec<Quantity> {
    QUANTITY
        .captures_iter(sentence)
        .filter_map(|caps| read_quantity(sentence, &caps))
        .collect()
}

fn read_quantity(sentence: &str, caps: &Captures<'_>) -> Option<Quantity> {
    let whole = caps.get(0)?;
    let num = caps.name("num")?;
    let prefix_start = caps
        .name("sign")
        .or_else(|| caps.name("cur"))
        .map_or(num.start(), |m| m.start());
    let glued = |at: usize| {
        sentence[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '.')
    };

    if caps.name("cur").is_none() && glued(num.start()) {
        return None;
    }

    let raw: f64 = num.as_str().replace(',', "").parse().ok()?;
    let currency = caps.name("cur").and_then(|m| currency_code(m.as_str()));
    let mult = caps.name("mult").map_or(1.0, |m| multiplier(m.as_str()));
    let unit = match caps.name("unit") {
        Some(u) => Some(canonical_unit(u.as_str())?),
        None => currency.map(|code| (Unit::Currency(code), 1.0)),
    };

    let is_integer = !num.as_str().contains(['.', ',']);
    if unit.is_none() && caps.name("mult").is_none() && is_integer && YEAR_RANGE.contains(&raw) {
        return None;
    }

    let sign = caps.name("sign").filter(|_| !glued(prefix_start));
    let negative = sign.is_some_and(|s| s.as_str() == "-");
    let mut value = raw * mult * unit.map_or(1.0, |(_, factor)| factor);
    if negative {
        value = -value;
    }

    Some(Quantity {
        start: match (sign, caps.name("cur")) {
            (Some(s), _) => s.start(),
            (None, Some(c)) => c.start(),
            (None, None) => num.start(),
        },
        end: whole.end(),
        value,
        unit: unit.map(|(u, _)| u),
        signed: sign.is_some(),
    })
}
