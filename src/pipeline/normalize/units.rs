//! Canonical units and conversion factors for recognised quantities.

/// Physical or financial dimension of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Percent,
    Ratio,
    Energy,
    Emissions,
    Water,
    Currency,
}

/// Unit after conversion. Energy is held in MWh, emissions in tCO2e,
/// water in cubic metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    Ratio,
    MegawattHours,
    TonnesCo2e,
    CubicMetres,
    Currency(&'static str),
}

impl Unit {
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Percent => Dimension::Percent,
            Self::Ratio => Dimension::Ratio,
            Self::MegawattHours => Dimension::Energy,
            Self::TonnesCo2e => Dimension::Emissions,
            Self::CubicMetres => Dimension::Water,
            Self::Currency(_) => Dimension::Currency,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Percent => "pct",
            Self::Ratio => "x",
            Self::MegawattHours => "MWh",
            Self::TonnesCo2e => "tCO2e",
            Self::CubicMetres => "m3",
            Self::Currency(code) => code,
        }
    }
}

impl Dimension {
    /// Label used when a value is read without any unit.
    pub fn canonical_label(&self) -> &'static str {
        match self {
            Self::Percent => "pct",
            Self::Ratio => "x",
            Self::Energy => "MWh",
            Self::Emissions => "tCO2e",
            Self::Water => "m3",
            Self::Currency => "currency",
        }
    }
}

/// Scale factor of a magnitude suffix (`k`, `m`, `bn`, ...).
pub fn multiplier(token: &str) -> f64 {
    match token.to_ascii_lowercase().as_str() {
        "k" | "thousand" => 1e3,
        "m" | "mn" | "million" => 1e6,
        "bn" | "billion" => 1e9,
        _ => 1.0,
    }
}

/// Currency code for a symbol or ISO code.
pub fn currency_code(token: &str) -> Option<&'static str> {
    match token.trim().to_ascii_uppercase().as_str() {
        "€" | "EUR" => Some("EUR"),
        "$" | "USD" => Some("USD"),
        "£" | "GBP" => Some("GBP"),
        _ => None,
    }
}

/// Canonical unit and conversion factor for a unit token as written.
pub fn canonical_unit(token: &str) -> Option<(Unit, f64)> {
    let lower = token.to_lowercase();
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();

    if compact == "%" || compact == "percent" {
        return Some((Unit::Percent, 1.0));
    }
    if compact == "x" || compact == "×" || compact == "times" {
        return Some((Unit::Ratio, 1.0));
    }
    let energy = match compact.as_str() {
        "kwh" => Some(1e-3),
        "mwh" => Some(1.0),
        "gwh" => Some(1e3),
        "gj" => Some(1.0 / 3.6),
        "tj" => Some(1e3 / 3.6),
        _ => None,
    };
    if let Some(factor) = energy {
        return Some((Unit::MegawattHours, factor));
    }
    if compact.contains("co2") {
        let factor = if compact.starts_with("kg") {
            1e-3
        } else if compact.starts_with("kt") {
            1e3
        } else if compact.starts_with("mt") {
            1e6
        } else {
            1.0
        };
        return Some((Unit::TonnesCo2e, factor));
    }
    if compact == "m3" || compact == "m³" || compact.starts_with("cubicmet") {
        return Some((Unit::CubicMetres, 1.0));
    }
    if compact.starts_with("megalit") || token.trim() == "ML" {
        return Some((Unit::CubicMetres, 1e3));
    }
    currency_code(&compact).map(|code| (Unit::Currency(code), 1.0))
}
