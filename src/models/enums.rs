use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The wire form (serde) is the `as_str` value, so JSON, SQLite columns
/// and map keys all agree.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(
    /// Lifecycle of a document run.
    ProcessingStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
);

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Allowed forward transitions. Terminal states only leave through
    /// an explicit reprocess, which is checked separately.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

str_enum!(
    /// Container format detected from magic bytes.
    DocumentFormat {
        Pdf => "pdf",
        Xlsx => "xlsx",
        Xls => "xls",
    }
);

impl DocumentFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Xls => "application/vnd.ms-excel",
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, Self::Xlsx | Self::Xls)
    }
}

str_enum!(ExtractionStrategy {
    Fast => "fast",
    Ocr => "ocr",
    Multilingual => "multilingual",
    Dual => "dual",
});

str_enum!(
    /// Pipeline stages in execution order.
    PipelineStage {
        Ingest => "ingest",
        Extract => "extract",
        Normalize => "normalize",
        Reason => "reason",
        Score => "score",
    }
);

str_enum!(RiskLevel {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

impl RiskLevel {
    pub const MEDIUM_FROM: f64 = 30.0;
    pub const HIGH_FROM: f64 = 60.0;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_FROM {
            Self::High
        } else if score >= Self::MEDIUM_FROM {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

str_enum!(MetricKind {
    CarbonReduction => "carbon_reduction",
    RenewableEnergy => "renewable_energy",
    WaterReduction => "water_reduction",
    WasteRecycling => "waste_recycling",
    Scope1Emissions => "scope1_emissions",
    Scope2Emissions => "scope2_emissions",
    Scope3Emissions => "scope3_emissions",
    EnergyConsumption => "energy_consumption",
    WaterWithdrawal => "water_withdrawal",
    GreenCapex => "green_capex",
    LeverageRatio => "leverage_ratio",
    InterestCover => "interest_cover",
});

impl MetricKind {
    /// Human label used in claim texts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CarbonReduction => "carbon reduction",
            Self::RenewableEnergy => "renewable energy share",
            Self::WaterReduction => "water reduction",
            Self::WasteRecycling => "waste recycling rate",
            Self::Scope1Emissions => "Scope 1 emissions",
            Self::Scope2Emissions => "Scope 2 emissions",
            Self::Scope3Emissions => "Scope 3 emissions",
            Self::EnergyConsumption => "energy consumption",
            Self::WaterWithdrawal => "water withdrawal",
            Self::GreenCapex => "green capex",
            Self::LeverageRatio => "leverage ratio",
            Self::InterestCover => "interest cover",
        }
    }
}

str_enum!(ClaimType {
    BaselineDeviation => "baseline_deviation",
    PeerOutlier => "peer_outlier",
    HistoricalInconsistency => "historical_inconsistency",
    MissingDisclosure => "missing_disclosure",
    UnsupportedAssertion => "unsupported_assertion",
    InternalContradiction => "internal_contradiction",
    ExpiredCertification => "expired_certification",
    UnverifiedData => "unverified_data",
    LowConfidenceMetric => "low_confidence_metric",
});

impl ClaimType {
    /// Score component a claim of this type feeds.
    pub fn component(&self) -> ScoreComponent {
        match self {
            Self::BaselineDeviation
            | Self::PeerOutlier
            | Self::UnsupportedAssertion
            | Self::InternalContradiction => ScoreComponent::ClaimSeverity,
            Self::MissingDisclosure | Self::LowConfidenceMetric => ScoreComponent::DataQuality,
            Self::UnverifiedData | Self::ExpiredCertification => {
                ScoreComponent::ThirdPartyVerification
            }
            Self::HistoricalInconsistency => ScoreComponent::HistoricalConsistency,
        }
    }
}

str_enum!(ScoreComponent {
    ClaimSeverity => "claim_severity",
    DataQuality => "data_quality",
    HistoricalConsistency => "historical_consistency",
    ThirdPartyVerification => "third_party_verification",
});

str_enum!(OutcomeLabel {
    ConfirmedRisk => "confirmed_risk",
    FalsePositive => "false_positive",
    FalseNegative => "false_negative",
    Inconclusive => "inconclusive",
});

str_enum!(
    /// Error taxonomy shared by every stage and the HTTP boundary.
    ErrorKind {
        UnsupportedFormat => "UnsupportedFormat",
        FileTooLarge => "FileTooLarge",
        ExtractionFailed => "ExtractionFailed",
        ValidationError => "ValidationError",
        NotFound => "NotFound",
        Cancelled => "Cancelled",
        InternalError => "InternalError",
    }
);
