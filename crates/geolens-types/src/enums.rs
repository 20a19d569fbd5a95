//! Enumeration types for the geolens service.
//!
//! Both enums here are allowlists: caller input is parsed into one of a
//! fixed set of variants before it can reach a query, and each variant
//! maps to a static identifier. Nothing a caller sends is ever
//! interpolated into a query string.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Layer types
// ---------------------------------------------------------------------------

/// Category of geographic entity.
///
/// Determines which rows of the spatial store a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum LayerType {
    /// Incorporated city boundary.
    City,
    /// County boundary.
    County,
    /// State boundary.
    State,
    /// Census designated place.
    Place,
    /// Metropolitan Statistical Area.
    Msa,
}

impl LayerType {
    /// Every layer, in declaration order.
    pub const ALL: [Self; 5] = [Self::City, Self::County, Self::State, Self::Place, Self::Msa];

    /// The wire name of this layer (`city`, `county`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::County => "county",
            Self::State => "state",
            Self::Place => "place",
            Self::Msa => "msa",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// What was being parsed (`layer type`, `field`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl FromStr for LayerType {
    type Err = UnknownVariant;

    /// Parse a layer name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|layer| layer.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownVariant {
                kind: "layer type",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Demographic trend fields
// ---------------------------------------------------------------------------

/// A demographic attribute that can be charted across years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TrendField {
    /// Total population.
    Population,
    /// Median household income in dollars.
    MedianHouseholdIncome,
    /// Population 25 and over counted for educational attainment.
    EducationTotal,
    /// Holders of a bachelor's degree.
    BachelorDegree,
    /// Holders of a master's degree.
    MastersDegree,
    /// Workers counted for means of transportation to work.
    MeansOfTransportationToWork,
    /// Population below the poverty level.
    PopulationBelowPovertyLevel,
}

impl TrendField {
    /// Every allowed field.
    pub const ALL: [Self; 7] = [
        Self::Population,
        Self::MedianHouseholdIncome,
        Self::EducationTotal,
        Self::BachelorDegree,
        Self::MastersDegree,
        Self::MeansOfTransportationToWork,
        Self::PopulationBelowPovertyLevel,
    ];

    /// The column / property name of this field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::MedianHouseholdIncome => "median_household_income",
            Self::EducationTotal => "education_total",
            Self::BachelorDegree => "bachelor_degree",
            Self::MastersDegree => "masters_degree",
            Self::MeansOfTransportationToWork => "means_of_transportation_to_work",
            Self::PopulationBelowPovertyLevel => "population_below_poverty_level",
        }
    }
}

impl fmt::Display for TrendField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendField {
    type Err = UnknownVariant;

    /// Field names are matched exactly; they are identifiers, not prose.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "field",
                value: s.to_owned(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn layer_parse_is_case_insensitive() {
        assert_eq!("City".parse::<LayerType>().unwrap(), LayerType::City);
        assert_eq!(" MSA ".parse::<LayerType>().unwrap(), LayerType::Msa);
        assert!("planet".parse::<LayerType>().is_err());
    }

    #[test]
    fn layer_serializes_lowercase() {
        let json = serde_json::to_string(&LayerType::County).unwrap();
        assert_eq!(json, "\"county\"");
    }

    #[test]
    fn trend_field_allowlist() {
        for field in TrendField::ALL {
            assert_eq!(field.as_str().parse::<TrendField>().unwrap(), field);
        }
        let err = "population; DROP TABLE demographics".parse::<TrendField>();
        assert!(err.is_err());
        assert!("Population".parse::<TrendField>().is_err());
    }
}
